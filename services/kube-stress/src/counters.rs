//! Request tallies shared between worker tasks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lock-free `total` / `failed` counters.
///
/// Workers only ever increment. The values are read once, after every worker
/// has been joined, so relaxed ordering is sufficient: the join itself orders
/// the final read after all increments.
#[derive(Debug, Default)]
pub struct Counters {
    total: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished request in one step.
    pub fn add(&self, success: bool) {
        self.record_issued();
        if !success {
            self.record_failure();
        }
    }

    /// Count a request before it is sent, so stalled requests still show up.
    pub fn record_issued(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the totals. Only meaningful once all producers have finished.
    pub fn snapshot(&self) -> Summary {
        Summary {
            total: self.total.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Final tallies of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: u64,
    pub failed: u64,
}

impl Summary {
    pub fn succeeded(&self) -> u64 {
        self.total.saturating_sub(self.failed)
    }

    /// Failed requests as a percentage of all requests.
    ///
    /// `None` when no request was issued: 0 out of 0 is not a 0% failure rate.
    pub fn failure_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.failed as f64 / self.total as f64 * 100.0)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} out of {} requests failed, failure rate: ",
            self.failed, self.total
        )?;
        match self.failure_rate() {
            Some(rate) => write!(f, "{}%", rate),
            None => write!(f, "undefined"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use test_utils::assert_approx_eq;

    #[test]
    fn test_add_counts_failures() {
        let counters = Counters::new();
        counters.add(true);
        counters.add(false);
        counters.add(true);

        let summary = counters.snapshot();
        assert_eq!(summary, Summary { total: 3, failed: 1 });
        assert_eq!(summary.succeeded(), 2);
        assert_approx_eq!(summary.failure_rate().unwrap(), 100.0 / 3.0, 1e-9);
    }

    #[test]
    fn test_zero_requests_has_undefined_rate() {
        let summary = Counters::new().snapshot();
        assert_eq!(summary.failure_rate(), None);
        assert_eq!(
            summary.to_string(),
            "0 out of 0 requests failed, failure rate: undefined"
        );
    }

    #[test]
    fn test_display_matches_log_format() {
        let summary = Summary { total: 8, failed: 2 };
        assert_eq!(
            summary.to_string(),
            "2 out of 8 requests failed, failure rate: 25%"
        );
        let all_failed = Summary { total: 4, failed: 4 };
        assert_eq!(all_failed.failure_rate(), Some(100.0));
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let counters = Arc::new(Counters::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let counters = counters.clone();
                std::thread::spawn(move || {
                    for i in 0..1000 {
                        counters.add((i + t) % 4 != 0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let summary = counters.snapshot();
        assert_eq!(summary.total, 8000);
        assert_eq!(summary.failed, 2000);
        assert_eq!(summary.succeeded(), 6000);
    }
}
