use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use botload_core::runner::Coordinator;
use botload_core::{HttpTransport, TestRequest};
use tokio::time::MissedTickBehavior;

use crate::cli::RunArgs;
use crate::config::AppConfig;
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::RunError;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

pub(crate) async fn run(args: RunArgs, cfg: AppConfig) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.output);

    let request = TestRequest {
        chat_id: args.chat_id,
        message_text: args.message,
        thread_count: args.threads,
        requests_per_thread: args.requests,
        delay_between_requests: args
            .delay
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        bot_url: None,
        api_method: args.api_method,
    };
    let definition = request
        .resolve(&cfg.defaults)
        .context("invalid load test")
        .map_err(RunError::InvalidInput)?;

    let transport = HttpTransport::new(Some(cfg.connect_timeout), Some(cfg.read_timeout));
    let coordinator = Coordinator::new(Arc::new(transport), cfg.run);

    let started = coordinator
        .start(definition)
        .context("failed to start load test")
        .map_err(RunError::RuntimeError)?;
    out.print_header(&started);

    let id = started.id;
    let done = coordinator.wait(&id);
    tokio::pin!(done);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut interrupted = false;

    let finished = loop {
        tokio::select! {
            report = &mut done => break report,
            res = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                match res {
                    Ok(()) => {
                        tracing::warn!(run = %id, "interrupted, stopping the load test");
                        coordinator.cancel(&id);
                    }
                    Err(err) => tracing::warn!(error = %err, "failed to listen for ctrl-c"),
                }
            }
            _ = ticker.tick() => {
                if let Some(live) = coordinator.get(&id) {
                    out.progress(&live);
                }
            }
        }
    };

    let report = finished
        .with_context(|| format!("load test `{id}` disappeared"))
        .map_err(RunError::RuntimeError)?;
    out.print_summary(&report).map_err(RunError::RuntimeError)?;

    Ok(ExitCode::from_report(&report))
}
