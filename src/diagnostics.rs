//! Operator-facing diagnostics for events the hook could not ship.
//!
//! Under overload or a store outage every event can fail, so reports
//! are rate limited: at most one line per interval, carrying the count
//! of events since the previous line.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default interval between two diagnostic lines.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

pub struct RateLimitedReporter {
    min_interval: Duration,
    last_report: Mutex<Option<Instant>>,
    pending: AtomicU64,
    total: AtomicU64,
}

impl RateLimitedReporter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_report: Mutex::new(None),
            pending: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// Count a dropped event without reporting it.
    ///
    /// Producers may run inside a subscriber callback, where anything
    /// they log is discarded. The drain task reports later with
    /// [`report_drops`](Self::report_drops).
    pub fn count_drop(&self) {
        self.count();
    }

    /// Warn about drops counted since the last line, if any and if the
    /// interval has elapsed.
    ///
    /// Returns true if a line was emitted.
    pub fn report_drops(&self, reason: &str) -> bool {
        self.flush(|dropped, total| {
            tracing::warn!(
                reason = %reason,
                dropped_count = dropped,
                total_dropped = total,
                "buffer of redis hook is full, log entry discarded"
            );
        })
    }

    /// Count a dropped event and report it right away, rate limited.
    pub fn dropped(&self, reason: &str) -> bool {
        self.count();
        self.report_drops(reason)
    }

    /// Count a failed delivery and warn if the interval has elapsed.
    pub fn failed(&self, error: &dyn std::fmt::Display) -> bool {
        self.count();
        self.flush(|failed, total| {
            tracing::warn!(
                error = %error,
                failed_count = failed,
                total_failed = total,
                "failed to ship log entry to redis"
            );
        })
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Counted but not yet reported.
    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }

    fn count(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    fn flush(&self, emit: impl FnOnce(u64, u64)) -> bool {
        if self.pending.load(Ordering::Relaxed) == 0 {
            return false;
        }

        let should_report = {
            let mut last = self.last_report.lock();
            let now = Instant::now();
            match *last {
                Some(prev) if now.duration_since(prev) < self.min_interval => false,
                _ => {
                    *last = Some(now);
                    true
                }
            }
        };

        if should_report {
            let count = self.pending.swap(0, Ordering::Relaxed);
            emit(count, self.total.load(Ordering::Relaxed));
        }
        should_report
    }
}

impl Default for RateLimitedReporter {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_INTERVAL)
    }
}
