use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use botload_core::runner::Coordinator;
use botload_core::{Defaults, TestReport, TestRequest};
use serde::Serialize;

pub(crate) const API_PREFIX: &str = "/api/load-test";
const SERVICE_NAME: &str = "botload";

#[derive(Debug, Clone)]
struct ApiState {
    coordinator: Coordinator,
    defaults: Arc<Defaults>,
}

pub(crate) fn router(coordinator: Coordinator, defaults: Defaults) -> Router {
    let state = ApiState {
        coordinator,
        defaults: Arc::new(defaults),
    };

    Router::new()
        .route(&format!("{API_PREFIX}/start"), post(start))
        .route(&format!("{API_PREFIX}/all"), get(list))
        .route(&format!("{API_PREFIX}/health"), get(health))
        .route(&format!("{API_PREFIX}/{{id}}"), get(fetch))
        .route(&format!("{API_PREFIX}/{{id}}/stop"), post(stop))
        .with_state(state)
}

#[derive(Debug)]
enum ApiError {
    /// The test definition was rejected.
    Validation(String),
    /// The body could not be read as JSON at all.
    Rejected(StatusCode, String),
    NotFound(String),
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    message: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            Self::Validation(m) => (StatusCode::BAD_REQUEST, "validation", m),
            Self::Rejected(status, m) => (*status, "bad_request", m),
            Self::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m),
            Self::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", m),
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

impl From<botload_core::Error> for ApiError {
    fn from(err: botload_core::Error) -> Self {
        if err.is_validation() {
            Self::Validation(err.to_string())
        } else {
            tracing::error!(error = %err, "load test request failed");
            Self::Internal(err.to_string())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // Well-formed JSON with the wrong shape (e.g. a negative delay).
            JsonRejection::JsonDataError(err) => Self::Validation(err.body_text()),
            other => Self::Rejected(other.status(), other.body_text()),
        }
    }
}

async fn start(
    State(state): State<ApiState>,
    payload: Result<Json<TestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TestReport>), ApiError> {
    let Json(request) = payload?;
    let definition = request.resolve(&state.defaults)?;
    let report = state.coordinator.start(definition)?;
    Ok((StatusCode::CREATED, Json(report)))
}

async fn fetch(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<TestReport>, ApiError> {
    state
        .coordinator
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("load test `{id}` not found")))
}

async fn list(State(state): State<ApiState>) -> Json<Vec<TestReport>> {
    Json(state.coordinator.list())
}

#[derive(Debug, Serialize)]
struct StopResponse {
    success: bool,
    message: String,
}

async fn stop(State(state): State<ApiState>, Path(id): Path<String>) -> Json<StopResponse> {
    let success = state.coordinator.cancel(&id);
    let message = if success {
        format!("load test `{id}` is stopping")
    } else {
        format!("load test `{id}` not found or already finished")
    };
    Json(StopResponse { success, message })
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "UP",
        service: SERVICE_NAME,
    })
}
