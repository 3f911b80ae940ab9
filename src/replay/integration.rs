//! Wiring between the replay service and the host session
//!
//! Completed utterances are captured in the background; the frontend drives
//! replays and diagnostics over RPC.

use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use super::service::{ReplayService, rpc_error_json};
use crate::Result;
use crate::session::{AgentSession, CompletedUtterance, RpcHandler, RpcInvocation, RpcRegistry};

/// RPC method replaying the last agent utterance
pub const REPLAY_METHOD: &str = "replay_last_audio";

/// RPC method returning the replay diagnostics snapshot
pub const STATUS_METHOD: &str = "audio_replay_status";

/// Replay wiring for one agent session
#[derive(Clone)]
pub struct ReplayIntegration {
    service: Arc<ReplayService>,
    session: Arc<dyn AgentSession>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for ReplayIntegration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayIntegration")
            .field("service", &self.service)
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ReplayIntegration {
    #[must_use]
    pub fn new(service: Arc<ReplayService>, session: Arc<dyn AgentSession>) -> Self {
        Self {
            service,
            session,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancel in-flight replays when `token` fires
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Wire capture and register both RPC methods
    ///
    /// # Errors
    ///
    /// Returns error if the session or the registry rejects a registration
    pub fn install(&self, rpc: &dyn RpcRegistry) -> Result<()> {
        self.wire_capture()?;

        rpc.register_rpc_method(REPLAY_METHOD, self.replay_handler())
            .inspect_err(|e| tracing::error!(error = %e, method = REPLAY_METHOD, "rpc registration failed"))?;
        rpc.register_rpc_method(STATUS_METHOD, self.status_handler())
            .inspect_err(|e| tracing::error!(error = %e, method = STATUS_METHOD, "rpc registration failed"))?;

        tracing::info!("audio replay integration installed");
        Ok(())
    }

    /// Wire capture only; used when there is no room to receive RPCs
    ///
    /// # Errors
    ///
    /// Returns error if the session rejects the event handler
    pub fn console_only(&self) -> Result<()> {
        self.wire_capture()?;
        tracing::info!("console mode: replay rpc methods not registered");
        Ok(())
    }

    fn wire_capture(&self) -> Result<()> {
        let service = Arc::clone(&self.service);
        self.session
            .on_speech_completed(Arc::new(move |utterance: Arc<dyn CompletedUtterance>| {
                let service = Arc::clone(&service);
                // Ordered here, in event order; the spawned tasks may run in any order
                let seq = service.next_sequence();
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(async move {
                            service.capture_in_order(seq, utterance.as_ref()).await;
                        });
                    }
                    Err(_) => tracing::warn!("no runtime available, utterance not captured"),
                }
            }))
            .inspect_err(|e| tracing::error!(error = %e, "speech handler registration failed"))
    }

    fn replay_handler(&self) -> RpcHandler {
        let service = Arc::clone(&self.service);
        let session = Arc::clone(&self.session);
        let shutdown = self.shutdown.clone();

        Arc::new(move |invocation: RpcInvocation| {
            let service = Arc::clone(&service);
            let session = Arc::clone(&session);
            let cancel = shutdown.child_token();
            async move {
                tracing::debug!(
                    caller = %invocation.caller_identity,
                    request_id = %invocation.request_id,
                    "replay requested"
                );
                let task = tokio::spawn(async move {
                    service
                        .handle_replay_request(session.as_ref(), &cancel)
                        .await
                        .to_json()
                });
                match task.await {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, "replay handler aborted");
                        rpc_error_json(&e.to_string())
                    }
                }
            }
            .boxed()
        })
    }

    fn status_handler(&self) -> RpcHandler {
        let service = Arc::clone(&self.service);

        Arc::new(move |_invocation: RpcInvocation| {
            let service = Arc::clone(&service);
            async move {
                let snapshot = service.status_snapshot().await;
                match serde_json::to_value(&snapshot) {
                    Ok(data) => serde_json::json!({
                        "status": "ok",
                        "data": data,
                        "success": true,
                    }),
                    Err(e) => serde_json::json!({
                        "status": "error",
                        "message": e.to_string(),
                        "success": false,
                    }),
                }
                .to_string()
            }
            .boxed()
        })
    }
}

/// Wire `service` into `session` and register its RPC methods on `rpc`
///
/// # Errors
///
/// Returns error if any registration fails
pub fn install_replay_integration(
    service: Arc<ReplayService>,
    session: Arc<dyn AgentSession>,
    rpc: &dyn RpcRegistry,
) -> Result<ReplayIntegration> {
    let integration = ReplayIntegration::new(service, session);
    integration.install(rpc)?;
    Ok(integration)
}
