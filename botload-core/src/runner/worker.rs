use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use botload_http::HttpResponse;
use chrono::Utc;
use futures_util::FutureExt as _;
use tokio_util::sync::CancellationToken;

use super::aggregator::Aggregator;
use super::failures::FailureLog;
use super::target::Target;
use crate::report::{FailureKind, FailureRecord, WorkerSummary};
use crate::transport::Transport;

pub fn worker_name(worker_id: u32) -> String {
    format!("worker-{worker_id}")
}

/// Classified result of one send. Lives only until it is folded into the aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    pub worker_id: u32,
    pub sequence: u64,
    pub success: bool,
    pub elapsed: Duration,
    /// HTTP status, or 0 when the send itself failed.
    pub status_code: u16,
    pub error: Option<String>,
    kind: Option<FailureKind>,
}

impl RequestOutcome {
    pub fn classify(
        worker_id: u32,
        sequence: u64,
        elapsed: Duration,
        result: botload_http::Result<HttpResponse>,
    ) -> Self {
        let (success, status_code, error, kind) = match result {
            Ok(res) if res.is_success() => (true, res.status, None, None),
            Ok(res) => {
                let body = res.body_lossy();
                let message = if body.trim().is_empty() {
                    format!("HTTP {}", res.status)
                } else {
                    body
                };
                (
                    false,
                    res.status,
                    Some(message),
                    Some(FailureKind::HttpStatus),
                )
            }
            Err(err) => (
                false,
                0,
                Some(format!("{}: {err}", err.transport_error_kind())),
                Some(FailureKind::Transport),
            ),
        };

        Self {
            worker_id,
            sequence,
            success,
            elapsed,
            status_code,
            error,
            kind,
        }
    }

    pub fn failure_record(&self) -> Option<FailureRecord> {
        let kind = self.kind?;
        Some(FailureRecord {
            timestamp: Utc::now(),
            worker_id: self.worker_id,
            kind,
            message: self.error.clone().unwrap_or_default(),
            status_code: (self.status_code != 0).then_some(self.status_code),
            sequence: self.sequence,
        })
    }
}

/// One concurrent unit of a run: `requests` sequential sends with an optional pause between
/// them, stopping early once `stop` is cancelled.
pub(crate) struct Worker {
    pub id: u32,
    pub requests: u32,
    pub delay: Duration,
    pub target: Arc<Target>,
    pub transport: Arc<dyn Transport>,
    pub aggregator: Arc<Aggregator>,
    pub failures: Arc<FailureLog>,
    pub stop: CancellationToken,
}

#[derive(Debug, Default)]
struct Tally {
    successful: u64,
    failed: u64,
    elapsed: Duration,
}

impl Worker {
    pub async fn run(self) -> WorkerSummary {
        let started = Instant::now();
        let mut tally = Tally::default();
        let requests = u64::from(self.requests);

        tracing::debug!(worker = self.id, requests, "worker started");

        for sequence in 1..=requests {
            if self.stop.is_cancelled() {
                tracing::debug!(worker = self.id, sequence, "worker stopped before sending");
                break;
            }

            let step = AssertUnwindSafe(self.iteration(sequence, &mut tally))
                .catch_unwind()
                .await;
            match step {
                Ok(true) => {}
                Ok(false) => break,
                Err(panic) => self.crashed(sequence, panic.as_ref(), &mut tally),
            }

            if !self.delay.is_zero() && sequence < requests {
                tokio::select! {
                    biased;
                    () = self.stop.cancelled() => {
                        tracing::debug!(worker = self.id, sequence, "worker stopped during delay");
                        break;
                    }
                    () = tokio::time::sleep(self.delay) => {}
                }
            }
        }

        let attempted = tally.successful.saturating_add(tally.failed);
        let average_response_time_ms = if attempted == 0 {
            0.0
        } else {
            tally.elapsed.as_secs_f64() * 1000.0 / attempted as f64
        };

        let summary = WorkerSummary {
            worker_id: self.id,
            name: worker_name(self.id),
            successful_requests: tally.successful,
            failed_requests: tally.failed,
            average_response_time_ms,
            execution_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        tracing::debug!(
            worker = self.id,
            successful = summary.successful_requests,
            failed = summary.failed_requests,
            "worker finished"
        );
        summary
    }

    /// A panic inside one iteration counts as a failed request; the loop carries on.
    fn crashed(&self, sequence: u64, panic: &(dyn Any + Send), tally: &mut Tally) {
        let message = panic_message(panic);
        tracing::error!(worker = self.id, sequence, error = %message, "request crashed");
        self.record_internal(sequence, format!("request crashed: {message}"), tally);
    }

    fn record_internal(&self, sequence: u64, message: String, tally: &mut Tally) {
        self.aggregator.record_internal_failure();
        self.failures.push(FailureRecord {
            timestamp: Utc::now(),
            worker_id: self.id,
            kind: FailureKind::Internal,
            message,
            status_code: None,
            sequence,
        });
        tally.failed += 1;
    }

    /// Sends one request and records it. Returns `false` when the stop signal interrupted
    /// the send; the abandoned request is not counted.
    async fn iteration(&self, sequence: u64, tally: &mut Tally) -> bool {
        let req = match self.target.request(sequence) {
            Ok(req) => req,
            Err(err) => {
                tracing::error!(worker = self.id, sequence, error = %err, "failed to build request");
                self.record_internal(sequence, err.to_string(), tally);
                return true;
            }
        };

        let sent = Instant::now();
        let result = tokio::select! {
            biased;
            () = self.stop.cancelled() => {
                tracing::debug!(worker = self.id, sequence, "abandoning in-flight request");
                return false;
            }
            res = self.transport.send(req) => res,
        };
        let elapsed = sent.elapsed();

        let outcome = RequestOutcome::classify(self.id, sequence, elapsed, result);
        self.aggregator.record(outcome.success, outcome.elapsed);
        tally.elapsed += outcome.elapsed;

        if outcome.success {
            tally.successful += 1;
        } else {
            tally.failed += 1;
            tracing::debug!(
                worker = self.id,
                sequence,
                status = outcome.status_code,
                error = outcome.error.as_deref().unwrap_or_default(),
                "request failed"
            );
            if let Some(record) = outcome.failure_record() {
                self.failures.push(record);
            }
        }

        true
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
