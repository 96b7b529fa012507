use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::Result;
use crate::types::TickerSeries;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadStats {
    pub files_seen: usize,
    pub loaded: usize,
    pub skipped_non_json: usize,
    pub rejected_unreadable: usize,
    pub rejected_parse: usize,
    pub rejected_empty: usize,
    pub rejected_duplicate: usize,
}

/// Reads every `*.json` file in `dir` as one ticker's series.
/// Files that cannot be read or parsed are logged and skipped; only a missing
/// or unreadable directory is an error. Output is sorted by ticker.
pub async fn load_series_dir(dir: &Path) -> Result<(Vec<TickerSeries>, LoadStats)> {
    let mut stats = LoadStats::default();
    let mut series = Vec::new();
    let mut seen = HashSet::new();

    // Duplicate tickers keep the first file by path, whatever order the OS lists them in.
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    for path in paths {
        stats.files_seen += 1;

        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            stats.skipped_non_json += 1;
            continue;
        }

        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), "[LOADER] unreadable file: {e}");
                stats.rejected_unreadable += 1;
                continue;
            }
        };

        let mut parsed: TickerSeries = match serde_json::from_slice(&raw) {
            Ok(s) => s,
            Err(e) => {
                warn!(path = %path.display(), "[LOADER] parse error: {e}");
                stats.rejected_parse += 1;
                continue;
            }
        };

        parsed.ticker = parsed.ticker.trim().to_ascii_uppercase();
        if parsed.ticker.is_empty() || parsed.bars.is_empty() {
            debug!(path = %path.display(), "[LOADER] empty ticker or series");
            stats.rejected_empty += 1;
            continue;
        }
        if !seen.insert(parsed.ticker.clone()) {
            warn!(ticker = %parsed.ticker, path = %path.display(), "[LOADER] duplicate ticker, keeping first file");
            stats.rejected_duplicate += 1;
            continue;
        }

        series.push(parsed);
    }

    series.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    stats.loaded = series.len();
    Ok((series, stats))
}
