//! Driving the frontend UI over RPC

use std::time::Duration;

use serde_json::json;

use super::ToolContext;
use super::validate::validate_string_param;
use crate::{Error, Result};

/// RPC method the frontend exposes for UI state changes
pub const UPDATE_UI_METHOD: &str = "update_ui";

const UI_RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Push a UI state (and optional data) to the first remote participant
///
/// # Errors
///
/// Returns [`Error::Rpc`] when no frontend is connected or the call fails
pub async fn update_frontend_ui(
    ctx: &ToolContext,
    ui_state: &str,
    data: Option<serde_json::Value>,
) -> Result<String> {
    let state = validate_string_param(ui_state, "ui_state", 1, 50, None)?;

    let peer = ctx
        .peer
        .as_ref()
        .ok_or_else(|| Error::Rpc("no hay conexión con el frontend".to_string()))?;
    let destination = peer
        .first_remote_identity()
        .ok_or_else(|| Error::Rpc("no hay participantes remotos".to_string()))?;

    let summary = ctx.userdata.lock().await.summary();
    let payload = json!({
        "state": state,
        "data": data.unwrap_or_else(|| json!({})),
        "timestamp": summary,
    });

    peer.perform_rpc(&destination, UPDATE_UI_METHOD, payload.to_string(), UI_RPC_TIMEOUT)
        .await
        .inspect_err(|e| tracing::error!(error = %e, state = %state, "frontend ui update failed"))?;

    tracing::info!(state = %state, destination = %destination, "frontend ui updated");
    Ok(format!("UI actualizada: {state}"))
}
