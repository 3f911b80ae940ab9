//! Replay of the agent's last spoken utterance
//!
//! - [`asset`]: the captured utterance
//! - [`frame`]: PCM frames and the fixed-duration replay sequence
//! - [`text`]: transcript cleanup
//! - [`service`]: capture/replay state machine
//! - [`integration`]: session and RPC wiring

mod asset;
mod frame;
mod integration;
mod service;
mod text;

pub use asset::{AssetSummary, AudioAsset, MIN_REPLAY_SECONDS};
pub use frame::{AudioFrame, BYTES_PER_SAMPLE, ReplayFrames};
pub use integration::{REPLAY_METHOD, ReplayIntegration, STATUS_METHOD, install_replay_integration};
pub use service::{
    CaptureOutcome, ReplayConfig, ReplayMetadata, ReplayMetrics, ReplayPhase, ReplayResponse,
    ReplayService, ReplayStatus, ReplayStatusSnapshot, rpc_error_json,
};
pub use text::{clean_transcript, join_segments};
