use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::aggregator::Aggregator;
use crate::definition::TestDefinition;
use crate::report::{TestReport, TestStatus};

/// Process-wide map of runs keyed by id.
///
/// Entries are never evicted: memory grows with the number of runs for the life of the
/// process.
#[derive(Debug, Default)]
pub struct Registry {
    runs: DashMap<String, Arc<RunEntry>>,
}

impl Registry {
    /// Registers a RUNNING report for `definition` under a fresh random id.
    pub(crate) fn create(&self, definition: TestDefinition) -> Arc<RunEntry> {
        loop {
            let id = uuid::Uuid::new_v4().to_string();
            if let Entry::Vacant(slot) = self.runs.entry(id.clone()) {
                let entry = Arc::new(RunEntry::new(TestReport::running(id, definition)));
                slot.insert(entry.clone());
                return entry;
            }
        }
    }

    pub(crate) fn entry(&self, id: &str) -> Option<Arc<RunEntry>> {
        self.runs.get(id).map(|e| e.value().clone())
    }

    pub fn get(&self, id: &str) -> Option<TestReport> {
        self.entry(id).map(|e| e.report())
    }

    /// Every report held, oldest first.
    pub fn list(&self) -> Vec<TestReport> {
        let entries: Vec<Arc<RunEntry>> = self.runs.iter().map(|e| e.value().clone()).collect();
        let mut reports: Vec<TestReport> = entries.iter().map(|e| e.report()).collect();
        reports.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        reports
    }

    /// Signals a live run to stop. Returns `false` for unknown ids, finished runs, and runs
    /// that were already asked to stop.
    pub fn cancel(&self, id: &str) -> bool {
        self.entry(id).is_some_and(|e| e.cancel())
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[derive(Debug)]
pub(crate) struct RunEntry {
    report: Mutex<TestReport>,
    live: Mutex<Option<Arc<Aggregator>>>,
    cancel: CancellationToken,
    started: Instant,
    status_tx: watch::Sender<TestStatus>,
}

impl RunEntry {
    fn new(report: TestReport) -> Self {
        let (status_tx, _rx) = watch::channel(report.status);
        Self {
            report: Mutex::new(report),
            live: Mutex::new(None),
            cancel: CancellationToken::new(),
            started: Instant::now(),
            status_tx,
        }
    }

    fn lock_report(&self) -> std::sync::MutexGuard<'_, TestReport> {
        self.report
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_live(&self) -> std::sync::MutexGuard<'_, Option<Arc<Aggregator>>> {
        self.live
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn id(&self) -> String {
        self.lock_report().id.clone()
    }

    pub fn definition(&self) -> TestDefinition {
        self.lock_report().configuration.clone()
    }

    /// Current report; while RUNNING the counters are read live from the aggregator.
    pub fn report(&self) -> TestReport {
        let mut report = self.lock_report().clone();
        if report.status == TestStatus::Running
            && let Some(aggregator) = self.lock_live().as_ref()
        {
            report.apply_stats(&aggregator.snapshot(), self.started.elapsed());
        }
        report
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn attach_live(&self, aggregator: Arc<Aggregator>) {
        *self.lock_live() = Some(aggregator);
    }

    pub fn cancel(&self) -> bool {
        // Checked under the report lock so it cannot interleave with `complete`.
        let report = self.lock_report();
        if report.status.is_terminal() || self.cancel.is_cancelled() {
            return false;
        }
        self.cancel.cancel();
        true
    }

    /// Freezes the report as COMPLETED, or CANCELLED when a cancel was accepted.
    pub fn complete(&self, finalize: impl FnOnce(&mut TestReport)) -> TestReport {
        let mut report = self.lock_report();
        if report.status.is_terminal() {
            return report.clone();
        }

        finalize(&mut report);
        report.status = if self.cancel.is_cancelled() {
            TestStatus::Cancelled
        } else {
            TestStatus::Completed
        };
        report.end_time.get_or_insert_with(Utc::now);

        *self.lock_live() = None;
        self.status_tx.send_replace(report.status);
        report.clone()
    }

    /// Marks a run that could not start.
    pub fn fail(&self, reason: String) -> TestReport {
        let mut report = self.lock_report();
        if report.status.is_terminal() {
            return report.clone();
        }

        report.status = TestStatus::Failed;
        report.error = Some(reason);
        report.end_time = Some(Utc::now());

        *self.lock_live() = None;
        self.status_tx.send_replace(report.status);
        report.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TestStatus> {
        self.status_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    fn definition() -> TestDefinition {
        TestDefinition {
            chat_id: "1".to_string(),
            message_text: "m".to_string(),
            thread_count: 1,
            requests_per_worker: 1,
            delay: Duration::ZERO,
            base_url: "http://127.0.0.1:9".to_string(),
            api_method: "sendMessage".to_string(),
        }
    }

    #[test]
    fn create_assigns_unique_ids() {
        let registry = Registry::default();
        let ids: HashSet<String> = (0..500)
            .map(|_| registry.create(definition()).id())
            .collect();
        assert_eq!(ids.len(), 500);
        assert_eq!(registry.len(), 500);
    }

    #[test]
    fn unknown_ids_are_not_found_and_not_cancelled() {
        let registry = Registry::default();
        assert!(registry.get("does-not-exist").is_none());
        assert!(!registry.cancel("does-not-exist"));
        assert!(registry.is_empty());
    }

    #[test]
    fn cancel_is_accepted_once_for_a_running_entry() {
        let registry = Registry::default();
        let entry = registry.create(definition());
        let id = entry.id();

        assert!(registry.cancel(&id));
        assert!(!registry.cancel(&id));
        assert!(entry.cancel_token().is_cancelled());

        let report = entry.complete(|_| {});
        assert_eq!(report.status, TestStatus::Cancelled);
    }

    #[test]
    fn terminal_states_are_final() {
        let registry = Registry::default();
        let entry = registry.create(definition());
        let id = entry.id();

        let report = entry.complete(|r| r.successful_requests = 1);
        assert_eq!(report.status, TestStatus::Completed);
        assert!(report.end_time.is_some());

        assert!(!registry.cancel(&id));
        assert_eq!(entry.fail("late".to_string()).status, TestStatus::Completed);
        assert_eq!(
            registry.get(&id).map(|r| r.status),
            Some(TestStatus::Completed)
        );
    }

    #[test]
    fn running_reports_read_live_counters() {
        let registry = Registry::default();
        let entry = registry.create(definition());
        let aggregator = Arc::new(Aggregator::default());
        entry.attach_live(aggregator.clone());

        aggregator.record(true, Duration::from_millis(3));
        aggregator.record(false, Duration::from_millis(5));

        let report = registry
            .get(&entry.id())
            .unwrap_or_else(|| panic!("expected report"));
        assert_eq!(report.status, TestStatus::Running);
        assert_eq!(report.successful_requests, 1);
        assert_eq!(report.failed_requests, 1);
    }

    #[test]
    fn list_returns_every_report() {
        let registry = Registry::default();
        let a = registry.create(definition()).id();
        let b = registry.create(definition()).id();

        let ids: HashSet<String> = registry.list().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, HashSet::from([a, b]));
    }
}
