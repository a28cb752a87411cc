use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::{JoinError, JoinSet};

use super::aggregator::Aggregator;
use super::failures::FailureLog;
use super::registry::{Registry, RunEntry};
use super::target::Target;
use super::worker::Worker;
use crate::definition::TestDefinition;
use crate::error::{Error, Result};
use crate::report::{FailureKind, FailureRecord, TestReport, WorkerSummary};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    /// Ceiling on one run's wall-clock time; reaching it stops the workers.
    pub max_execution_time: Duration,
    /// How long stopped workers get to hand in their summaries before being aborted.
    pub stop_grace_period: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_execution_time: Duration::from_secs(30 * 60),
            stop_grace_period: Duration::from_secs(1),
        }
    }
}

/// Starts runs in the background and answers queries about them.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    transport: Arc<dyn Transport>,
    settings: RunSettings,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("runs", &self.inner.registry.len())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    pub fn new(transport: Arc<dyn Transport>, settings: RunSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Registry::default(),
                transport,
                settings,
            }),
        }
    }

    /// Validates `definition`, registers it as RUNNING and executes it in the background.
    ///
    /// Returns the freshly registered report without waiting for the run. Must be called
    /// from within a tokio runtime; without one the run is registered as FAILED.
    pub fn start(&self, definition: TestDefinition) -> Result<TestReport> {
        definition.validate()?;

        let entry = self.inner.registry.create(definition);
        let report = entry.report();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::info!(
                    run = %report.id,
                    threads = report.configuration.thread_count,
                    requests_per_worker = report.configuration.requests_per_worker,
                    total_requests = report.total_requests,
                    "load test started"
                );
                handle.spawn(self.inner.clone().execute(entry));
                Ok(report)
            }
            Err(err) => {
                let reason = Error::NoRuntime(err.to_string()).to_string();
                tracing::error!(run = %report.id, error = %reason, "load test could not start");
                Ok(entry.fail(reason))
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<TestReport> {
        self.inner.registry.get(id)
    }

    pub fn list(&self) -> Vec<TestReport> {
        self.inner.registry.list()
    }

    /// Asks a live run to stop. `false` when the id is unknown or the run already ended.
    pub fn cancel(&self, id: &str) -> bool {
        let cancelled = self.inner.registry.cancel(id);
        if cancelled {
            tracing::info!(run = %id, "load test stop requested");
        }
        cancelled
    }

    /// Resolves once the run reaches a terminal status.
    pub async fn wait(&self, id: &str) -> Option<TestReport> {
        let entry = self.inner.registry.entry(id)?;
        let mut status = entry.subscribe();
        status.wait_for(|s| s.is_terminal()).await.ok()?;
        Some(entry.report())
    }
}

struct Collector {
    ids: HashMap<tokio::task::Id, u32>,
    summaries: Vec<WorkerSummary>,
    aggregator: Arc<Aggregator>,
    failures: Arc<FailureLog>,
}

impl Collector {
    fn collect(&mut self, joined: std::result::Result<(tokio::task::Id, WorkerSummary), JoinError>) {
        match joined {
            Ok((_, summary)) => self.summaries.push(summary),
            Err(err) => self.lost(&err),
        }
    }

    fn lost(&mut self, err: &JoinError) {
        let worker_id = self.ids.get(&err.id()).copied().unwrap_or_default();

        if err.is_cancelled() {
            tracing::warn!(worker = worker_id, "worker aborted before reporting");
            return;
        }

        tracing::error!(worker = worker_id, error = %err, "worker crashed");
        self.aggregator.record_internal_failure();
        self.failures.push(FailureRecord {
            timestamp: Utc::now(),
            worker_id,
            kind: FailureKind::Internal,
            message: format!("worker crashed: {err}"),
            status_code: None,
            sequence: 0,
        });
    }
}

impl Inner {
    async fn execute(self: Arc<Self>, entry: Arc<RunEntry>) {
        let id = entry.id();
        let definition = entry.definition();

        let target = match Target::from_definition(&definition) {
            Ok(target) => Arc::new(target),
            Err(err) => {
                tracing::error!(run = %id, error = %err, "load test could not start");
                entry.fail(err.to_string());
                return;
            }
        };

        let aggregator = Arc::new(Aggregator::default());
        let failures = Arc::new(FailureLog::default());
        entry.attach_live(aggregator.clone());

        let started = Instant::now();
        let stop = entry.cancel_token().child_token();

        let mut workers = JoinSet::new();
        let mut collector = Collector {
            ids: HashMap::new(),
            summaries: Vec::new(),
            aggregator: aggregator.clone(),
            failures: failures.clone(),
        };

        for worker_id in 0..definition.thread_count {
            let worker = Worker {
                id: worker_id,
                requests: definition.requests_per_worker,
                delay: definition.delay,
                target: target.clone(),
                transport: self.transport.clone(),
                aggregator: aggregator.clone(),
                failures: failures.clone(),
                stop: stop.clone(),
            };
            let handle = workers.spawn(worker.run());
            collector.ids.insert(handle.id(), worker_id);
        }

        let mut timed_out = false;
        let ceiling = tokio::time::sleep(self.settings.max_execution_time);
        tokio::pin!(ceiling);

        let mut stopping = false;
        loop {
            tokio::select! {
                biased;
                joined = workers.join_next_with_id() => match joined {
                    Some(joined) => collector.collect(joined),
                    None => break,
                },
                () = stop.cancelled() => {
                    stopping = true;
                    break;
                }
                () = &mut ceiling => {
                    tracing::warn!(
                        run = %id,
                        ceiling = ?self.settings.max_execution_time,
                        "load test hit the execution time ceiling, stopping workers"
                    );
                    timed_out = true;
                    stop.cancel();
                    stopping = true;
                    break;
                }
            }
        }

        if stopping && !workers.is_empty() {
            let grace = tokio::time::sleep(self.settings.stop_grace_period);
            tokio::pin!(grace);

            loop {
                tokio::select! {
                    biased;
                    joined = workers.join_next_with_id() => match joined {
                        Some(joined) => collector.collect(joined),
                        None => break,
                    },
                    () = &mut grace => {
                        tracing::warn!(
                            run = %id,
                            outstanding = workers.len(),
                            "workers did not stop within the grace period, aborting"
                        );
                        workers.abort_all();
                        while let Some(joined) = workers.join_next_with_id().await {
                            collector.collect(joined);
                        }
                        break;
                    }
                }
            }
        }

        let elapsed = started.elapsed();
        let snapshot = aggregator.snapshot();
        let mut summaries = collector.summaries;
        summaries.sort_by_key(|s| s.worker_id);

        let report = entry.complete(|report| {
            report.apply_stats(&snapshot, elapsed);
            report.timed_out = timed_out;
            report.worker_statistics = summaries;
            report.failures = failures.snapshot();
        });

        tracing::info!(
            run = %id,
            status = %report.status,
            successful = report.successful_requests,
            failed = report.failed_requests,
            duration_ms = report.duration_ms,
            rps = report.requests_per_second,
            "load test finished"
        );
    }
}
