//! Shared test utilities

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use mona_agent::config::{DEFAULT_AGENT_NAME, LiveKitConfig};
use mona_agent::replay::AudioFrame;
use mona_agent::session::{
    AgentSession, AudioSegment, CompletedUtterance, RpcHandler, RpcInvocation, RpcRegistry,
    SayRequest, SpeechCompletedHandler, Utterance,
};
use secrecy::SecretString;
use tempfile::TempDir;
use tokio::sync::Notify;

/// Complete LiveKit credentials for tests
#[must_use]
pub fn livekit_config() -> LiveKitConfig {
    LiveKitConfig {
        url: Some("wss://mona-test.livekit.cloud".into()),
        api_key: Some("APItestkey".into()),
        api_secret: Some(SecretString::from("s3cret-s3cret-s3cret".to_string())),
        agent_name: DEFAULT_AGENT_NAME.to_string(),
        token_ttl: Duration::from_secs(600),
        token_reuse: Duration::from_secs(480),
    }
}

/// A personas directory holding `rosalia` and `lola`
#[must_use]
pub fn persona_dir() -> TempDir {
    let dir = tempfile::tempdir().expect("failed to create persona dir");
    std::fs::write(
        dir.path().join("rosalia.json"),
        r#"{
            "name": "Rosalía",
            "voice_id": "es-rosalia",
            "instructions": "Eres Rosalía, una compañera cálida y paciente.",
            "greeting": "¡Hola! Soy Rosalía. ¿Cómo te llamas?"
        }"#,
    )
    .expect("failed to write rosalia");
    std::fs::write(
        dir.path().join("lola.json"),
        r#"{
            "name": "Lola",
            "voice_id": "es-lola",
            "instructions": "Eres Lola, divertida y muy habladora."
        }"#,
    )
    .expect("failed to write lola");
    dir
}

/// 16 kHz mono speech-like audio of `seconds`
#[must_use]
pub fn speech_segment(seconds: f64) -> AudioSegment {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = (16_000.0 * seconds) as usize;
    let samples: Vec<i16> = (0..total).map(|i| ((i % 200) as i16 - 100) * 50).collect();
    let frames = samples
        .chunks(320)
        .map(|chunk| AudioFrame::from_samples(chunk, 16_000, 1))
        .collect();
    AudioSegment { frames }
}

/// A completed utterance with audio and text
#[must_use]
pub fn utterance(seconds: f64, text: &str) -> Utterance {
    Utterance::new(vec![speech_segment(seconds)], vec![text.to_string()])
}

/// What the mock session was asked to say
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Said {
    Text(String),
    Audio { frames: usize, bytes: usize },
}

/// Session that records speech and lets the test fire completion events
#[derive(Default)]
pub struct MockSession {
    said: Mutex<Vec<Said>>,
    handlers: Mutex<Vec<SpeechCompletedHandler>>,
    gate: Option<Arc<Notify>>,
}

impl MockSession {
    /// A session whose audio playback blocks until `gate` is notified
    #[must_use]
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn said(&self) -> Vec<Said> {
        self.said.lock().unwrap().clone()
    }

    /// Fire every registered completion handler with `utterance`
    pub fn complete(&self, utterance: Utterance) {
        let utterance: Arc<dyn CompletedUtterance> = Arc::new(utterance);
        let handlers = self.handlers.lock().unwrap().clone();
        for handler in handlers {
            handler(Arc::clone(&utterance));
        }
    }
}

#[async_trait]
impl AgentSession for MockSession {
    async fn say(&self, request: SayRequest) -> mona_agent::Result<()> {
        let said = match request.audio {
            Some(mut stream) => {
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
                let mut frames = 0;
                let mut bytes = 0;
                while let Some(frame) = stream.next().await {
                    frames += 1;
                    bytes += frame.data.len();
                }
                Said::Audio { frames, bytes }
            }
            None => Said::Text(request.text),
        };
        self.said.lock().unwrap().push(said);
        Ok(())
    }

    fn on_speech_completed(&self, handler: SpeechCompletedHandler) -> mona_agent::Result<()> {
        self.handlers.lock().unwrap().push(handler);
        Ok(())
    }
}

/// In-memory RPC registry that can invoke its handlers
#[derive(Default)]
pub struct MockRegistry {
    methods: Mutex<HashMap<String, RpcHandler>>,
}

impl MockRegistry {
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Invoke `method` as the frontend would
    pub async fn invoke(&self, method: &str) -> serde_json::Value {
        let handler = self
            .methods
            .lock()
            .unwrap()
            .get(method)
            .cloned()
            .unwrap_or_else(|| panic!("{method} not registered"));
        let raw = handler(RpcInvocation {
            request_id: "req-1".to_string(),
            caller_identity: "frontend".to_string(),
            payload: String::new(),
            response_timeout: Duration::from_secs(5),
        })
        .await;
        serde_json::from_str(&raw).expect("rpc response is JSON")
    }
}

impl RpcRegistry for MockRegistry {
    fn register_rpc_method(&self, method: &str, handler: RpcHandler) -> mona_agent::Result<()> {
        self.methods
            .lock()
            .unwrap()
            .insert(method.to_string(), handler);
        Ok(())
    }
}
