//! Interfaces to the host real-time agent framework
//!
//! The framework owns the media session, the room and its RPC transport.
//! Adapters implement these traits over the framework's objects; everything
//! in this crate talks to the host only through them.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::Result;
use crate::replay::AudioFrame;

/// Audio produced for one content item of a completed utterance
#[derive(Debug, Clone, Default)]
pub struct AudioSegment {
    pub frames: Vec<AudioFrame>,
}

impl AudioSegment {
    #[must_use]
    pub const fn new(frames: Vec<AudioFrame>) -> Self {
        Self { frames }
    }
}

/// A finished agent utterance as reported by the speech-completed event
pub trait CompletedUtterance: Send + Sync {
    /// Audio content items, in the order the framework produced them
    fn audio_segments(&self) -> &[AudioSegment];

    /// Text content items
    fn text_segments(&self) -> &[String];
}

/// Plain owned utterance, used by adapters that copy event payloads
#[derive(Debug, Clone, Default)]
pub struct Utterance {
    pub audio: Vec<AudioSegment>,
    pub text: Vec<String>,
}

impl Utterance {
    #[must_use]
    pub const fn new(audio: Vec<AudioSegment>, text: Vec<String>) -> Self {
        Self { audio, text }
    }
}

impl CompletedUtterance for Utterance {
    fn audio_segments(&self) -> &[AudioSegment] {
        &self.audio
    }

    fn text_segments(&self) -> &[String] {
        &self.text
    }
}

/// A request to speak text and/or stream pre-synthesized audio
pub struct SayRequest {
    /// Text to synthesize or display; empty when `audio` carries the speech
    pub text: String,
    /// Pre-synthesized frames, bypassing TTS
    pub audio: Option<BoxStream<'static, AudioFrame>>,
    /// Whether the user may interrupt playback
    pub allow_interruptions: bool,
    /// Whether the utterance is recorded in the conversation history
    pub add_to_chat_ctx: bool,
}

impl SayRequest {
    /// Speak `text` through TTS, recorded in history
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            audio: None,
            allow_interruptions: true,
            add_to_chat_ctx: true,
        }
    }

    /// Stream pre-synthesized audio without text and without touching history
    #[must_use]
    pub fn audio(frames: BoxStream<'static, AudioFrame>) -> Self {
        Self {
            text: String::new(),
            audio: Some(frames),
            allow_interruptions: true,
            add_to_chat_ctx: false,
        }
    }
}

impl fmt::Debug for SayRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SayRequest")
            .field("text", &self.text)
            .field("has_audio", &self.audio.is_some())
            .field("allow_interruptions", &self.allow_interruptions)
            .field("add_to_chat_ctx", &self.add_to_chat_ctx)
            .finish()
    }
}

/// Callback fired when the agent finishes an utterance
pub type SpeechCompletedHandler = Arc<dyn Fn(Arc<dyn CompletedUtterance>) + Send + Sync>;

/// The host's voice session
#[async_trait]
pub trait AgentSession: Send + Sync {
    /// Speak text and/or play audio, resolving when playback ends
    ///
    /// Implementations report host cancellation as [`crate::Error::Cancelled`].
    async fn say(&self, request: SayRequest) -> Result<()>;

    /// Register a handler for completed utterances
    fn on_speech_completed(&self, handler: SpeechCompletedHandler) -> Result<()>;

    /// Speak plain text
    async fn say_text(&self, text: &str) -> Result<()> {
        self.say(SayRequest::text(text)).await
    }
}

/// An incoming RPC call from a remote participant
#[derive(Debug, Clone)]
pub struct RpcInvocation {
    pub request_id: String,
    pub caller_identity: String,
    pub payload: String,
    pub response_timeout: Duration,
}

/// Handler for an RPC method; always resolves to the response payload
pub type RpcHandler = Arc<dyn Fn(RpcInvocation) -> BoxFuture<'static, String> + Send + Sync>;

/// RPC method registration on the local participant
pub trait RpcRegistry: Send + Sync {
    /// Register `handler` under `method`
    fn register_rpc_method(&self, method: &str, handler: RpcHandler) -> Result<()>;
}

/// Outgoing RPC calls to a remote participant (the frontend)
#[async_trait]
pub trait RpcPeer: Send + Sync {
    /// Call `method` on `destination`, returning its raw response payload
    async fn perform_rpc(
        &self,
        destination: &str,
        method: &str,
        payload: String,
        timeout: Duration,
    ) -> Result<String>;

    /// Identity of the first connected remote participant, if any
    fn first_remote_identity(&self) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_request_defaults() {
        let req = SayRequest::text("hola");
        assert_eq!(req.text, "hola");
        assert!(req.audio.is_none());
        assert!(req.allow_interruptions);
        assert!(req.add_to_chat_ctx);
    }

    #[test]
    fn audio_request_stays_out_of_history() {
        let req = SayRequest::audio(Box::pin(futures::stream::empty()));
        assert!(req.text.is_empty());
        assert!(req.audio.is_some());
        assert!(req.allow_interruptions);
        assert!(!req.add_to_chat_ctx);
        assert!(format!("{req:?}").contains("has_audio: true"));
    }

    #[test]
    fn owned_utterance_exposes_segments() {
        let utt = Utterance::new(
            vec![AudioSegment::new(vec![AudioFrame::from_samples(&[0; 4], 16_000, 1)])],
            vec!["hola".into()],
        );
        assert_eq!(utt.audio_segments().len(), 1);
        assert_eq!(utt.text_segments(), ["hola".to_string()]);
    }
}
