//! Replay buffer inspection over HTTP

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};

use super::ApiState;
use crate::replay::ReplayStatusSnapshot;

async fn status(State(state): State<Arc<ApiState>>) -> Json<ReplayStatusSnapshot> {
    Json(state.replay.status_snapshot().await)
}

/// The last captured utterance as a WAV file
async fn last_wav(State(state): State<Arc<ApiState>>) -> Response {
    let asset = state.replay.current_asset().await;
    if !asset.is_valid() {
        return (StatusCode::NOT_FOUND, "no audio captured").into_response();
    }

    match asset.to_wav() {
        Ok(wav) => ([(header::CONTENT_TYPE, "audio/wav")], wav).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode replay asset");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn clear(State(state): State<Arc<ApiState>>) -> StatusCode {
    state.replay.clear().await;
    StatusCode::NO_CONTENT
}

/// Replay routes, nested under `/api/replay`
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/last.wav", get(last_wav).delete(clear))
        .with_state(state)
}
