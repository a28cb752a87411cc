use std::sync::Mutex;

use crate::report::FailureRecord;

/// Unbounded, concurrently appendable list of failures for one run. Order is not meaningful.
#[derive(Debug, Default)]
pub struct FailureLog {
    records: Mutex<Vec<FailureRecord>>,
}

impl FailureLog {
    pub fn push(&self, record: FailureRecord) {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record);
    }

    pub fn snapshot(&self) -> Vec<FailureRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
