//! Health check endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use super::ApiState;
use crate::monitor::MonitorHealth;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// `max(cpu, memory) / 100` from the latest host sample
    pub load: f64,
}

/// Detailed readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
    pub monitor: MonitorHealth,
}

/// Individual readiness checks
#[derive(Serialize)]
pub struct ReadinessChecks {
    pub personas: CheckResult,
    pub replay: CheckResult,
}

/// Result of a single health check
#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    const fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            status: "fail",
            message: Some(message.into()),
        }
    }
}

/// Liveness probe - is the service running and able to take sessions?
async fn health(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<HealthResponse>) {
    let load = state.monitor.load();
    let (status, http_status) = if state.monitor.is_overloaded() {
        tracing::warn!(load, "reporting busy");
        ("busy", StatusCode::SERVICE_UNAVAILABLE)
    } else {
        ("ok", StatusCode::OK)
    };

    (
        http_status,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            load,
        }),
    )
}

/// Readiness probe - can sessions be served?
async fn ready(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let personas = check_personas(&state);
    let replay = check_replay(&state).await;

    let all_ok = personas.status == "ok" && replay.status == "ok";
    let (status, http_status) = if all_ok {
        ("ok", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        http_status,
        Json(ReadinessResponse {
            status,
            checks: ReadinessChecks { personas, replay },
            monitor: state.monitor.health(),
        }),
    )
}

/// At least one valid persona must be loadable
fn check_personas(state: &ApiState) -> CheckResult {
    if state.personas.available().is_empty() {
        CheckResult::fail(format!(
            "no valid personas in {}",
            state.personas.dir().display()
        ))
    } else {
        CheckResult::ok()
    }
}

async fn check_replay(state: &ApiState) -> CheckResult {
    let metrics = state.replay.metrics().await;
    let attempts = metrics.total_replays + metrics.failed_replays;
    if attempts > 0 && metrics.total_replays == 0 {
        CheckResult::fail(format!("all {attempts} replays failed"))
    } else {
        CheckResult::ok()
    }
}

/// Build health router (liveness and host load)
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Build readiness router (needs state for checks)
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ready", get(ready)).with_state(state)
}
