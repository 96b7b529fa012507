//! Symbol and name heuristics for derivative instruments (warrants, units,
//! rights, preferreds). Pure predicate over caller-supplied metadata.

use crate::types::TickerMeta;

/// Suffixes after an explicit class separator (`ABC.WS`, `ABC-U`, `ABC/RT`).
const SEPARATED_SUFFIXES: &[&str] = &["W", "WS", "WT", "U", "UN", "R", "RT", "RTS"];

/// Fifth-letter codes on five-letter NASDAQ symbols: warrant, unit, right,
/// first preferred, mutual fund.
const FIFTH_LETTER_CODES: &[char] = &['W', 'U', 'R', 'P', 'X'];

const NAME_WORDS: &[&str] = &["warrant", "warrants", "unit", "units", "right", "rights", "preferred"];

const SEPARATORS: &[char] = &['.', '-', '/', '+', '^', '='];

pub fn is_derivative(meta: &TickerMeta) -> bool {
    symbol_is_derivative(&meta.ticker) || meta.name.as_deref().is_some_and(name_is_derivative)
}

pub fn symbol_is_derivative(symbol: &str) -> bool {
    let symbol = symbol.trim().to_ascii_uppercase();

    if let Some((_, suffix)) = symbol.split_once(SEPARATORS) {
        // Preferred series are written ABC-PA, ABC.PRB, ABC+ for warrants.
        return suffix.is_empty() || suffix.starts_with('P') || SEPARATED_SUFFIXES.contains(&suffix);
    }

    match symbol.len() {
        5 => symbol.chars().last().is_some_and(|c| FIFTH_LETTER_CODES.contains(&c)),
        n if n > 5 => symbol.ends_with("WS") || symbol.ends_with("PR"),
        _ => false,
    }
}

fn name_is_derivative(name: &str) -> bool {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .map(str::to_ascii_lowercase)
        .any(|word| NAME_WORDS.contains(&word.as_str()))
}
