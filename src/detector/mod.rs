pub mod derivative;
pub mod shark;

pub use shark::scan_series;
