//! Shared health state for the /health endpoint.
//! Updated by the scan scheduler and DbWriter.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared health metrics. Updated by scanner components, read by API.
#[derive(Default)]
pub struct HealthState {
    /// True while a scan is in progress.
    pub scan_running: AtomicBool,
    /// Nanosecond timestamp of the last completed scan (0 = none).
    pub last_scan_at_ns: AtomicU64,
    pub scans_completed: AtomicU64,
    /// Tickers loaded by the last completed scan.
    pub tickers_last_scan: AtomicU64,
    /// Scan reports queued for DB write.
    pub write_queue_pending: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_scan_running(&self, v: bool) {
        self.scan_running.store(v, Ordering::Relaxed);
    }

    pub fn record_scan(&self, at_ns: u64, tickers: u64) {
        self.last_scan_at_ns.store(at_ns, Ordering::Relaxed);
        self.tickers_last_scan.store(tickers, Ordering::Relaxed);
        self.scans_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_write_queue_pending(&self) {
        self.write_queue_pending.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_write_queue_pending(&self) {
        let _ = self
            .write_queue_pending
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn scan_running(&self) -> bool {
        self.scan_running.load(Ordering::Relaxed)
    }

    pub fn last_scan_at_ns(&self) -> u64 {
        self.last_scan_at_ns.load(Ordering::Relaxed)
    }

    pub fn scans_completed(&self) -> u64 {
        self.scans_completed.load(Ordering::Relaxed)
    }

    pub fn tickers_last_scan(&self) -> u64 {
        self.tickers_last_scan.load(Ordering::Relaxed)
    }

    pub fn write_queue_pending(&self) -> u64 {
        self.write_queue_pending.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_scan_bumps_counters() {
        let h = HealthState::new();
        h.record_scan(42, 7);
        h.record_scan(43, 9);
        assert_eq!(h.last_scan_at_ns(), 43);
        assert_eq!(h.tickers_last_scan(), 9);
        assert_eq!(h.scans_completed(), 2);
    }

    #[test]
    fn write_queue_never_underflows() {
        let h = HealthState::new();
        h.dec_write_queue_pending();
        assert_eq!(h.write_queue_pending(), 0);
        h.inc_write_queue_pending();
        h.dec_write_queue_pending();
        assert_eq!(h.write_queue_pending(), 0);
    }
}
