pub mod aggregator;
pub mod scheduler;

pub use aggregator::ScanReport;
