use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hdrhistogram::Histogram;

// Track up to one hour in microseconds (with 3 sigfigs); slower samples saturate.
const HISTOGRAM_MAX_US: u64 = 3_600_000_000;

/// Run-wide counters fed concurrently by every worker of one run.
///
/// Each field is updated atomically on its own; the fields are not updated as one
/// transaction. Readers that need exact totals read after all writers have finished.
#[derive(Debug)]
pub struct Aggregator {
    successful: AtomicU64,
    failed: AtomicU64,
    total_us: AtomicU64,
    min_us: AtomicU64,
    max_us: AtomicU64,
    timed: AtomicU64,
    latency_us: Mutex<Histogram<u64>>,
}

/// Point-in-time copy of an [`Aggregator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateSnapshot {
    pub successful: u64,
    pub failed: u64,
    pub total_us: u64,
    /// `None` until at least one timed request was recorded.
    pub min_us: Option<u64>,
    pub max_us: Option<u64>,
    pub p50_us: u64,
    pub p90_us: u64,
    pub p99_us: u64,
}

impl AggregateSnapshot {
    pub fn attempted(&self) -> u64 {
        self.successful.saturating_add(self.failed)
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        let hist = Histogram::<u64>::new_with_bounds(1, HISTOGRAM_MAX_US, 3)
            .unwrap_or_else(|err| panic!("failed to init histogram: {err}"));

        Self {
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total_us: AtomicU64::new(0),
            min_us: AtomicU64::new(u64::MAX),
            max_us: AtomicU64::new(0),
            timed: AtomicU64::new(0),
            latency_us: Mutex::new(hist),
        }
    }
}

impl Aggregator {
    pub fn record(&self, success: bool, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);

        if success {
            self.successful.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.total_us.fetch_add(us, Ordering::Relaxed);

        // fetch_min/fetch_max are single read-modify-write operations, so a concurrent
        // smaller minimum (or larger maximum) can never be overwritten.
        self.min_us.fetch_min(us, Ordering::Relaxed);
        self.max_us.fetch_max(us, Ordering::Relaxed);
        self.timed.fetch_add(1, Ordering::Relaxed);

        let mut hist = self
            .latency_us
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        hist.saturating_record(us.clamp(1, HISTOGRAM_MAX_US));
    }

    /// Counts a failure that has no meaningful response time.
    pub fn record_internal_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        let timed = self.timed.load(Ordering::Relaxed);
        let (min_us, max_us) = if timed == 0 {
            (None, None)
        } else {
            (
                Some(self.min_us.load(Ordering::Relaxed)),
                Some(self.max_us.load(Ordering::Relaxed)),
            )
        };

        let (p50_us, p90_us, p99_us) = {
            let hist = self
                .latency_us
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if hist.is_empty() {
                (0, 0, 0)
            } else {
                (
                    hist.value_at_quantile(0.50),
                    hist.value_at_quantile(0.90),
                    hist.value_at_quantile(0.99),
                )
            }
        };

        AggregateSnapshot {
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            total_us: self.total_us.load(Ordering::Relaxed),
            min_us,
            max_us,
            p50_us,
            p90_us,
            p99_us,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn empty_aggregator_has_no_extremes() {
        let snap = Aggregator::default().snapshot();
        assert_eq!(snap.attempted(), 0);
        assert_eq!(snap.min_us, None);
        assert_eq!(snap.max_us, None);
        assert_eq!(snap.p50_us, 0);
    }

    #[test]
    fn records_counts_sum_and_extremes() {
        let agg = Aggregator::default();
        agg.record(true, Duration::from_millis(10));
        agg.record(false, Duration::from_millis(30));
        agg.record(true, Duration::from_millis(20));

        let snap = agg.snapshot();
        assert_eq!(snap.successful, 2);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.total_us, 60_000);
        assert_eq!(snap.min_us, Some(10_000));
        assert_eq!(snap.max_us, Some(30_000));
        assert!(snap.p50_us >= 19_000 && snap.p50_us <= 21_000, "{snap:?}");
    }

    #[test]
    fn internal_failures_count_without_timing() {
        let agg = Aggregator::default();
        agg.record_internal_failure();

        let snap = agg.snapshot();
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.total_us, 0);
        assert_eq!(snap.min_us, None);
    }

    #[test]
    fn concurrent_records_are_never_lost() {
        const WORKERS: u64 = 64;
        const PER_WORKER: u64 = 2_000;

        let agg = Arc::new(Aggregator::default());
        let handles: Vec<_> = (0..WORKERS)
            .map(|w| {
                let agg = agg.clone();
                std::thread::spawn(move || {
                    for i in 0..PER_WORKER {
                        // Each thread contributes a unique extreme: thread 0 the smallest
                        // value, the last thread the largest.
                        let us = 100 + w * PER_WORKER + i;
                        agg.record(i % 2 == 0, Duration::from_micros(us));
                    }
                })
            })
            .collect();

        for h in handles {
            if h.join().is_err() {
                panic!("recording thread panicked");
            }
        }

        let snap = agg.snapshot();
        assert_eq!(snap.attempted(), WORKERS * PER_WORKER);
        assert_eq!(snap.successful, WORKERS * PER_WORKER / 2);
        assert_eq!(snap.min_us, Some(100));
        assert_eq!(snap.max_us, Some(100 + WORKERS * PER_WORKER - 1));

        let expected_total: u64 = (0..WORKERS * PER_WORKER).map(|v| 100 + v).sum();
        assert_eq!(snap.total_us, expected_total);
    }
}
