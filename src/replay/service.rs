//! Replay buffer service
//!
//! Owns the single most recent [`AudioAsset`]. Speech-completed events feed
//! [`ReplayService::capture`]; the `replay_last_audio` RPC drives
//! [`ReplayService::handle_replay_request`], which re-streams the captured
//! frames through the session without invoking TTS again.
//!
//! Capture and replay are mutually exclusive: both move the service out of
//! [`ReplayPhase::Idle`] under the state lock. A replay request arriving while
//! busy is answered immediately with a tagged status; a capture arriving
//! while a replay is streaming waits for it to finish.
//!
//! Captures carry a sequence number taken when the speech-completed event
//! fires. Waiting captures may win the lock in any order, so a capture older
//! than the last applied one is dropped instead of overwriting the slot.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use super::asset::{AssetSummary, AudioAsset};
use super::frame::ReplayFrames;
use super::text::{clean_transcript, join_segments};
use crate::session::{AgentSession, AudioSegment, CompletedUtterance, SayRequest};

const BYTES_PER_MB: usize = 1024 * 1024;

const MSG_NO_AUDIO: &str = "No hay mensaje anterior para reproducir";
const MSG_REPLAY_IN_PROGRESS: &str = "Ya estoy reproduciendo el último mensaje";
const MSG_CAPTURE_IN_PROGRESS: &str = "Espera a que termine de hablar para reproducir";
const MSG_SUCCESS: &str = "Reproduciendo último mensaje";
const MSG_CANCELLED: &str = "Reproducción cancelada";
const MSG_APOLOGY: &str = "Hubo un problema reproduciendo el último mensaje";
const MSG_RPC_ERROR: &str = "Error interno procesando la solicitud de replay";

/// Limits and encoding defaults for captured audio
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Buffers larger than this are truncated
    pub max_buffer_mb: usize,
    /// Longer captures are logged; the byte limit is the only hard cap
    pub max_duration_seconds: f64,
    /// Duration of each replayed frame
    pub frame_duration_ms: u32,
    /// Used when captured frames carry no format metadata
    pub default_sample_rate: u32,
    pub default_channels: u16,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_buffer_mb: 10,
            max_duration_seconds: 120.0,
            frame_duration_ms: 20,
            default_sample_rate: 48_000,
            default_channels: 1,
        }
    }
}

impl ReplayConfig {
    /// Byte limit for a captured buffer
    #[must_use]
    pub const fn max_buffer_bytes(&self) -> usize {
        self.max_buffer_mb * BYTES_PER_MB
    }
}

/// What the service is doing with the shared asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayPhase {
    Idle,
    Capturing,
    Replaying,
}

/// Cumulative counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayMetrics {
    pub total_captures: u64,
    pub total_replays: u64,
    pub failed_captures: u64,
    pub failed_replays: u64,
    /// Captures dropped because a newer utterance was already applied
    pub superseded_captures: u64,
}

/// Result of a capture attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Utterance had neither audio nor text; nothing changed
    Ignored,
    /// A replayable asset is now current
    Captured,
    /// The asset was replaced but is not replayable
    Invalid,
    /// A newer utterance was already applied; nothing changed
    Superseded,
}

/// Outcome tag of a replay request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayStatus {
    Success,
    NoAudio,
    ReplayInProgress,
    CaptureInProgress,
    Cancelled,
    Error,
    RpcError,
}

impl ReplayStatus {
    const fn message(self) -> &'static str {
        match self {
            Self::Success => MSG_SUCCESS,
            Self::NoAudio => MSG_NO_AUDIO,
            Self::ReplayInProgress => MSG_REPLAY_IN_PROGRESS,
            Self::CaptureInProgress => MSG_CAPTURE_IN_PROGRESS,
            Self::Cancelled => MSG_CANCELLED,
            Self::Error => MSG_APOLOGY,
            Self::RpcError => MSG_RPC_ERROR,
        }
    }
}

/// Details of the replayed asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayMetadata {
    pub text: String,
    pub duration_seconds: f64,
    pub frame_count: usize,
    pub created_at: Option<DateTime<Utc>>,
}

/// JSON payload returned to the RPC caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResponse {
    pub status: ReplayStatus,
    pub message: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ReplayMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl ReplayResponse {
    fn rejected(status: ReplayStatus) -> Self {
        Self {
            status,
            message: status.message().to_string(),
            success: false,
            metadata: None,
            error_type: None,
        }
    }

    /// Serialize for the RPC transport, falling back to an `rpc_error` payload
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| rpc_error_json(&e.to_string()))
    }
}

/// Last-resort payload when the replay handler itself fails
#[must_use]
pub fn rpc_error_json(detail: &str) -> String {
    serde_json::json!({
        "status": ReplayStatus::RpcError,
        "message": MSG_RPC_ERROR,
        "success": false,
        "error": detail,
    })
    .to_string()
}

/// Diagnostic view of the service
#[derive(Debug, Clone, Serialize)]
pub struct ReplayStatusSnapshot {
    pub phase: ReplayPhase,
    pub is_capturing: bool,
    pub is_replaying: bool,
    pub current_asset: AssetSummary,
    pub config: ReplayConfig,
    pub metrics: ReplayMetrics,
}

#[derive(Debug)]
struct ReplayState {
    asset: AudioAsset,
    phase: ReplayPhase,
    metrics: ReplayMetrics,
    /// Sequence number of the capture that produced `asset`
    applied_seq: u64,
}

/// Single-slot capture/replay buffer for the latest agent utterance
#[derive(Debug)]
pub struct ReplayService {
    state: Arc<Mutex<ReplayState>>,
    idle: Arc<Notify>,
    next_seq: AtomicU64,
    config: ReplayConfig,
}

impl Default for ReplayService {
    fn default() -> Self {
        Self::new(ReplayConfig::default())
    }
}

impl ReplayService {
    /// Create a service with an empty asset
    #[must_use]
    pub fn new(config: ReplayConfig) -> Self {
        tracing::info!(
            max_buffer_mb = config.max_buffer_mb,
            max_duration_seconds = config.max_duration_seconds,
            "audio replay service initialized"
        );
        Self {
            state: Arc::new(Mutex::new(ReplayState {
                asset: AudioAsset::empty(config.default_sample_rate, config.default_channels),
                phase: ReplayPhase::Idle,
                metrics: ReplayMetrics::default(),
                applied_seq: 0,
            })),
            idle: Arc::new(Notify::new()),
            next_seq: AtomicU64::new(1),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Reserve the sequence number for an utterance that just completed
    ///
    /// Call this in completion order, before handing the capture to a task.
    pub fn next_sequence(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Capture a completed utterance, replacing the current asset
    ///
    /// Utterances with neither audio nor text are ignored. Only the first
    /// audio segment is kept; all text segments are joined and cleaned.
    pub async fn capture(&self, utterance: &dyn CompletedUtterance) -> CaptureOutcome {
        self.capture_in_order(self.next_sequence(), utterance).await
    }

    /// Capture `utterance` unless one with a higher `seq` was already applied
    pub async fn capture_in_order(&self, seq: u64, utterance: &dyn CompletedUtterance) -> CaptureOutcome {
        let audio = utterance.audio_segments();
        let texts = utterance.text_segments();
        if audio.is_empty() && texts.is_empty() {
            tracing::debug!("completed utterance has no audio or text, skipping capture");
            return CaptureOutcome::Ignored;
        }

        let mut guard = self.begin(ReplayPhase::Capturing).await;
        {
            let mut state = self.state.lock().await;
            if seq < state.applied_seq {
                tracing::debug!(seq, applied = state.applied_seq, "dropping superseded utterance");
                state.metrics.superseded_captures += 1;
                state.phase = ReplayPhase::Idle;
                guard.disarm();
                drop(state);
                self.idle.notify_waiters();
                return CaptureOutcome::Superseded;
            }
        }

        let asset = self.assemble(audio.first(), texts);
        let valid = asset.is_valid();

        let summary = (asset.frame_count, asset.duration_seconds, asset.buffer.len());
        {
            let mut state = self.state.lock().await;
            state.asset = asset;
            state.applied_seq = seq;
            if valid {
                state.metrics.total_captures += 1;
            } else {
                state.metrics.failed_captures += 1;
            }
            state.phase = ReplayPhase::Idle;
            guard.disarm();
        }
        self.idle.notify_waiters();

        let (frames, duration, bytes) = summary;
        if valid {
            tracing::debug!(frames, duration, bytes, "captured utterance for replay");
            CaptureOutcome::Captured
        } else {
            tracing::warn!(frames, duration, bytes, "captured utterance is not replayable");
            CaptureOutcome::Invalid
        }
    }

    /// Build an asset from the first audio segment and all text segments
    fn assemble(&self, audio: Option<&AudioSegment>, texts: &[String]) -> AudioAsset {
        let mut asset =
            AudioAsset::empty(self.config.default_sample_rate, self.config.default_channels);

        if let Some(segment) = audio {
            let total: usize = segment.frames.iter().map(|f| f.data.len()).sum();
            let mut buffer = Vec::with_capacity(total);
            for frame in &segment.frames {
                buffer.extend_from_slice(&frame.data);
            }

            if let Some(format) = segment.frames.iter().find(|f| f.has_format()) {
                asset.sample_rate = format.sample_rate;
                asset.channels = format.channels;
            }
            asset.frame_count = segment.frames.len();

            let max_bytes = self.config.max_buffer_bytes();
            let truncated = buffer.len() > max_bytes;
            if truncated {
                tracing::warn!(
                    size_bytes = buffer.len(),
                    max_bytes,
                    "captured audio exceeds size limit, truncating"
                );
                buffer.truncate(max_bytes);
            }
            asset.buffer = Arc::from(buffer);
            asset.recompute_duration();
        }

        if asset.duration_seconds > self.config.max_duration_seconds {
            tracing::warn!(
                duration = asset.duration_seconds,
                max = self.config.max_duration_seconds,
                "captured audio exceeds duration limit"
            );
        }

        asset.text_content = join_segments(texts);
        asset.clean_text = clean_transcript(&asset.text_content);
        asset.created_at = Some(Utc::now());
        asset
    }

    /// Fresh frame sequence over the current asset
    ///
    /// Buffer and format are read once under the lock; the returned
    /// iterator is unaffected by later captures.
    pub async fn replay_iterator(&self) -> ReplayFrames {
        let state = self.state.lock().await;
        Self::frames_for(&state.asset, self.config.frame_duration_ms)
    }

    fn frames_for(asset: &AudioAsset, frame_duration_ms: u32) -> ReplayFrames {
        ReplayFrames::new(
            Arc::clone(&asset.buffer),
            asset.sample_rate,
            asset.channels,
            frame_duration_ms,
        )
    }

    /// Replay the current asset through `session`
    ///
    /// Never fails: every path ends in a [`ReplayResponse`]. Firing `cancel`
    /// stops playback and yields a `cancelled` response.
    pub async fn handle_replay_request(
        &self,
        session: &dyn AgentSession,
        cancel: &CancellationToken,
    ) -> ReplayResponse {
        let (frames, metadata, mut guard) = {
            let mut state = self.state.lock().await;

            let rejection = if !state.asset.is_valid() {
                Some(ReplayStatus::NoAudio)
            } else {
                match state.phase {
                    ReplayPhase::Replaying => Some(ReplayStatus::ReplayInProgress),
                    ReplayPhase::Capturing => Some(ReplayStatus::CaptureInProgress),
                    ReplayPhase::Idle => None,
                }
            };

            if let Some(status) = rejection {
                drop(state);
                return Self::reject(session, status).await;
            }

            state.phase = ReplayPhase::Replaying;
            let asset = &state.asset;
            let metadata = ReplayMetadata {
                text: asset.clean_text.clone(),
                duration_seconds: asset.duration_seconds,
                frame_count: asset.frame_count,
                created_at: asset.created_at,
            };
            (
                Self::frames_for(asset, self.config.frame_duration_ms),
                metadata,
                PhaseGuard::new(&self.state, &self.idle),
            )
        };

        tracing::info!(
            text = %truncate_for_log(&metadata.text),
            duration = metadata.duration_seconds,
            "replaying last utterance"
        );

        let request = SayRequest::audio(frames.into_stream());
        let outcome = tokio::select! {
            result = session.say(request) => result,
            () = cancel.cancelled() => Err(crate::Error::Cancelled),
        };

        let response = {
            let mut state = self.state.lock().await;
            let response = match &outcome {
                Ok(()) => {
                    state.metrics.total_replays += 1;
                    ReplayResponse {
                        status: ReplayStatus::Success,
                        message: MSG_SUCCESS.to_string(),
                        success: true,
                        metadata: Some(metadata),
                        error_type: None,
                    }
                }
                Err(e) if e.is_cancelled() => ReplayResponse::rejected(ReplayStatus::Cancelled),
                Err(e) => {
                    state.metrics.failed_replays += 1;
                    ReplayResponse {
                        status: ReplayStatus::Error,
                        message: format!("Error reproduciendo audio: {e}"),
                        success: false,
                        metadata: None,
                        error_type: Some(e.kind().to_string()),
                    }
                }
            };
            state.phase = ReplayPhase::Idle;
            guard.disarm();
            response
        };
        self.idle.notify_waiters();

        match &outcome {
            Ok(()) => tracing::info!("replay completed"),
            Err(e) if e.is_cancelled() => tracing::info!("replay cancelled"),
            Err(e) => {
                tracing::error!(error = %e, "replay playback failed");
                if let Err(feedback) = session.say_text(MSG_APOLOGY).await {
                    tracing::error!(error = %feedback, "failed to notify user of replay failure");
                }
            }
        }

        response
    }

    async fn reject(session: &dyn AgentSession, status: ReplayStatus) -> ReplayResponse {
        tracing::warn!(?status, "replay request rejected");
        let response = ReplayResponse::rejected(status);
        if let Err(e) = session.say_text(&response.message).await {
            tracing::warn!(error = %e, "failed to speak replay fallback message");
        }
        response
    }

    /// Wait until idle, then enter `phase`
    async fn begin(&self, phase: ReplayPhase) -> PhaseGuard {
        loop {
            let mut idle = pin!(self.idle.notified());
            idle.as_mut().enable();
            {
                let mut state = self.state.lock().await;
                if state.phase == ReplayPhase::Idle {
                    state.phase = phase;
                    return PhaseGuard::new(&self.state, &self.idle);
                }
                tracing::debug!(current = ?state.phase, wanted = ?phase, "waiting for replay buffer");
            }
            idle.await;
        }
    }

    /// Diagnostic snapshot of state, configuration and counters
    pub async fn status_snapshot(&self) -> ReplayStatusSnapshot {
        let state = self.state.lock().await;
        ReplayStatusSnapshot {
            phase: state.phase,
            is_capturing: state.phase == ReplayPhase::Capturing,
            is_replaying: state.phase == ReplayPhase::Replaying,
            current_asset: state.asset.summary(),
            config: self.config.clone(),
            metrics: state.metrics,
        }
    }

    pub async fn metrics(&self) -> ReplayMetrics {
        self.state.lock().await.metrics
    }

    /// Copy of the current asset (the buffer is shared, not copied)
    pub async fn current_asset(&self) -> AudioAsset {
        self.state.lock().await.asset.clone()
    }

    /// Drop the current asset
    pub async fn clear(&self) {
        self.state.lock().await.asset.clear();
        tracing::debug!("replay asset cleared");
    }
}

/// Returns the service to idle if an operation is abandoned mid-flight
struct PhaseGuard {
    state: Arc<Mutex<ReplayState>>,
    idle: Arc<Notify>,
    armed: bool,
}

impl PhaseGuard {
    fn new(state: &Arc<Mutex<ReplayState>>, idle: &Arc<Notify>) -> Self {
        Self {
            state: Arc::clone(state),
            idle: Arc::clone(idle),
            armed: true,
        }
    }

    /// Phase was reset by the owner
    const fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut state) = self.state.try_lock() {
            state.phase = ReplayPhase::Idle;
            drop(state);
            self.idle.notify_waiters();
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let state = Arc::clone(&self.state);
            let idle = Arc::clone(&self.idle);
            handle.spawn(async move {
                state.lock().await.phase = ReplayPhase::Idle;
                idle.notify_waiters();
            });
        } else {
            tracing::error!("replay phase could not be reset; buffer stays busy");
        }
    }
}

fn truncate_for_log(text: &str) -> String {
    text.chars().take(40).collect()
}
