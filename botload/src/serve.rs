use std::sync::Arc;

use anyhow::Context as _;
use botload_core::runner::Coordinator;
use botload_core::{HttpTransport, TestStatus};
use tokio::net::TcpListener;

use crate::api;
use crate::config::AppConfig;
use crate::exit_codes::ExitCode;
use crate::run_error::RunError;

pub(crate) async fn serve(cfg: AppConfig) -> Result<ExitCode, RunError> {
    let transport = HttpTransport::new(Some(cfg.connect_timeout), Some(cfg.read_timeout));
    let coordinator = Coordinator::new(Arc::new(transport), cfg.run);

    let listener = TcpListener::bind(cfg.bind)
        .await
        .with_context(|| format!("failed to bind api: {}", cfg.bind))
        .map_err(RunError::RuntimeError)?;
    let addr = listener
        .local_addr()
        .context("failed to resolve api address")
        .map_err(RunError::RuntimeError)?;

    tracing::info!(
        %addr,
        bot_url = cfg.defaults.base_url.as_deref().unwrap_or("<per request>"),
        max_execution_time = ?cfg.run.max_execution_time,
        "load test API listening"
    );
    println!("API_URL=http://{addr}{}", api::API_PREFIX);

    let app = api::router(coordinator.clone(), cfg.defaults);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("api server failed")
        .map_err(RunError::RuntimeError)?;

    stop_running(&coordinator);
    Ok(ExitCode::Success)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c, serving until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

fn stop_running(coordinator: &Coordinator) {
    for report in coordinator.list() {
        if report.status == TestStatus::Running {
            coordinator.cancel(&report.id);
        }
    }
}
