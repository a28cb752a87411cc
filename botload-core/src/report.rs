use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::definition::TestDefinition;
use crate::runner::AggregateSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Running,
    Completed,
    /// The run could not start; no statistics were collected.
    Failed,
    Cancelled,
}

impl TestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// The send itself failed (connect error, timeout, broken body...).
    Transport,
    /// The target answered with a non-2xx status.
    HttpStatus,
    /// Something other than the request went wrong inside a worker.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub timestamp: DateTime<Utc>,
    pub worker_id: u32,
    pub kind: FailureKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// 1-based request number within the worker; 0 when not tied to a request.
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSummary {
    pub worker_id: u32,
    pub name: String,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub average_response_time_ms: f64,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub id: String,
    pub status: TestStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub configuration: TestDefinition,

    /// The budget (`threadCount * requestsPerThread`), kept even when a run stops early.
    pub total_requests: u64,
    /// Requests that actually completed (`successful + failed`).
    pub attempted_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,

    pub total_response_time_ms: f64,
    pub average_response_time_ms: f64,
    pub min_response_time_ms: f64,
    pub max_response_time_ms: f64,
    pub p50_response_time_ms: f64,
    pub p90_response_time_ms: f64,
    pub p99_response_time_ms: f64,

    pub requests_per_second: f64,
    pub success_rate: f64,

    /// Set when the run hit the execution time ceiling and was cut short.
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub worker_statistics: Vec<WorkerSummary>,
    pub failures: Vec<FailureRecord>,
}

impl TestReport {
    pub(crate) fn running(id: String, configuration: TestDefinition) -> Self {
        Self {
            id,
            status: TestStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            duration_ms: 0,
            total_requests: configuration.total_requests(),
            configuration,
            attempted_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            total_response_time_ms: 0.0,
            average_response_time_ms: 0.0,
            min_response_time_ms: 0.0,
            max_response_time_ms: 0.0,
            p50_response_time_ms: 0.0,
            p90_response_time_ms: 0.0,
            p99_response_time_ms: 0.0,
            requests_per_second: 0.0,
            success_rate: 0.0,
            timed_out: false,
            error: None,
            worker_statistics: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Recomputes every derived figure from the aggregate counters.
    pub(crate) fn apply_stats(&mut self, stats: &AggregateSnapshot, elapsed: Duration) {
        self.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        let attempted = stats.attempted();
        self.successful_requests = stats.successful;
        self.failed_requests = stats.failed;
        self.attempted_requests = attempted;

        self.total_response_time_ms = micros_to_ms(stats.total_us);
        if attempted > 0 {
            self.average_response_time_ms = self.total_response_time_ms / attempted as f64;
            self.success_rate = stats.successful as f64 / attempted as f64 * 100.0;
        } else {
            self.average_response_time_ms = 0.0;
            self.success_rate = 0.0;
        }

        self.min_response_time_ms = stats.min_us.map_or(0.0, micros_to_ms);
        self.max_response_time_ms = stats.max_us.map_or(0.0, micros_to_ms);
        self.p50_response_time_ms = micros_to_ms(stats.p50_us);
        self.p90_response_time_ms = micros_to_ms(stats.p90_us);
        self.p99_response_time_ms = micros_to_ms(stats.p99_us);

        // Floor the duration at 1ms so very short runs still report a finite rate.
        let secs = self.duration_ms.max(1) as f64 / 1000.0;
        self.requests_per_second = attempted as f64 / secs;
    }
}

fn micros_to_ms(us: u64) -> f64 {
    us as f64 / 1000.0
}
