use crate::config::PongConfig;
use crate::gate::ReceiverGate;
use crate::metrics::PongMetrics;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub const TRACE_HEADER: &str = "x-trace-id";
pub const RESPONSE_BODY: &str = "World";

#[derive(Clone)]
pub struct AppState {
    pub gate: ReceiverGate,
    pub metrics: Arc<PongMetrics>,
    pub work_delay: Duration,
}

impl AppState {
    pub fn new(work_delay: Duration) -> Self {
        Self {
            gate: ReceiverGate::new(),
            metrics: Arc::new(PongMetrics::new()),
            work_delay,
        }
    }
}

pub fn build_app(config: &PongConfig) -> Router {
    build_app_with_state(AppState::new(config.work_delay))
}

pub fn build_app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn ping(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let trace_id = headers
        .get(TRACE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    info!(
        trace_id = %trace_id,
        at = %Utc::now().to_rfc3339(),
        "Pong received the request"
    );

    let permit = match state.gate.admit() {
        Ok(permit) => permit,
        Err(_) => {
            state.metrics.rejected();
            info!(trace_id = %trace_id, "Busy, rejecting with 429");
            return StatusCode::TOO_MANY_REQUESTS.into_response();
        }
    };

    state.metrics.admitted();
    let _in_flight = state.metrics.track_in_flight();
    permit.hold_for(state.work_delay).await;

    info!(trace_id = %trace_id, "Responding: {}", RESPONSE_BODY);
    (StatusCode::OK, RESPONSE_BODY).into_response()
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "UP"}))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
