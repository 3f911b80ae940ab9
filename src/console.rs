//! Local text console standing in for a LiveKit room
//!
//! Agent speech is printed to stdout and user turns are read from stdin.
//! Replay capture is wired the same way as in a room, but there is no remote
//! participant to receive RPCs, so replays are triggered with `/replay`.

use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::agent::{ConversationalAgent, SharedUserData, UserData};
use crate::config::IoMode;
use crate::monitor::SessionMonitor;
use crate::persona::PersonaManager;
use crate::replay::{ReplayIntegration, ReplayService};
use crate::session::{AgentSession, CompletedUtterance, SayRequest, SpeechCompletedHandler, Utterance};
use crate::tools::{ToolContext, ToolExecutor};
use crate::{Error, Result};

const HELP: &str = "\
comandos:
  /perfil               resumen del perfil
  /tool <name> [json]   ejecutar una herramienta
  /replay               repetir el último mensaje
  /status               estado del buffer de repetición
  /salir                terminar";

/// An [`AgentSession`] that prints instead of synthesizing
#[derive(Default)]
pub struct ConsoleSession {
    handlers: Mutex<Vec<SpeechCompletedHandler>>,
    transcript: Mutex<Vec<String>>,
}

impl std::fmt::Debug for ConsoleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleSession").finish_non_exhaustive()
    }
}

impl ConsoleSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything said so far, one entry per utterance
    #[must_use]
    pub fn transcript(&self) -> Vec<String> {
        self.transcript
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    fn record(&self, line: String) -> Result<()> {
        println!("{line}");
        let _ = std::io::stdout().flush();
        self.transcript
            .lock()
            .map_err(|_| Error::Session("console transcript poisoned".to_string()))?
            .push(line);
        Ok(())
    }
}

#[async_trait]
impl AgentSession for ConsoleSession {
    async fn say(&self, request: SayRequest) -> Result<()> {
        if let Some(mut frames) = request.audio {
            let mut count = 0usize;
            let mut bytes = 0usize;
            while let Some(frame) = frames.next().await {
                count += 1;
                bytes += frame.data.len();
            }
            return self.record(format!("[audio] {count} frames, {bytes} bytes"));
        }

        self.record(format!("🤖 {}", request.text))?;

        let handlers = self
            .handlers
            .lock()
            .map_err(|_| Error::Session("console handlers poisoned".to_string()))?
            .clone();
        let utterance: Arc<dyn CompletedUtterance> =
            Arc::new(Utterance::new(Vec::new(), vec![request.text]));
        for handler in handlers {
            handler(Arc::clone(&utterance));
        }
        Ok(())
    }

    fn on_speech_completed(&self, handler: SpeechCompletedHandler) -> Result<()> {
        self.handlers
            .lock()
            .map_err(|_| Error::Session("console handlers poisoned".to_string()))?
            .push(handler);
        Ok(())
    }
}

/// What the console loop should do after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Quit,
}

/// One console conversation
pub struct Console {
    agent: ConversationalAgent,
    session: Arc<ConsoleSession>,
    userdata: SharedUserData,
    tools: ToolExecutor,
    personas: Arc<PersonaManager>,
    replay: Arc<ReplayService>,
    shutdown: CancellationToken,
}

impl Console {
    /// Build a console conversation and wire replay capture
    ///
    /// # Errors
    ///
    /// Returns error if replay capture cannot be wired
    pub fn new(
        persona_id: &str,
        io_mode: IoMode,
        personas: Arc<PersonaManager>,
        replay: Arc<ReplayService>,
        monitor: Arc<SessionMonitor>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let session = Arc::new(ConsoleSession::new());
        let userdata = UserData::new(persona_id, io_mode).shared();

        ReplayIntegration::new(Arc::clone(&replay), session.clone())
            .with_shutdown(shutdown.clone())
            .console_only()?;

        let tools = ToolExecutor::new(ToolContext {
            userdata: userdata.clone(),
            session: session.clone(),
            personas: Arc::clone(&personas),
            monitor,
            peer: None,
        });
        let agent = ConversationalAgent::new(persona_id, personas.load_or_default(persona_id));

        Ok(Self {
            agent,
            session,
            userdata,
            tools,
            personas,
            replay,
            shutdown,
        })
    }

    #[must_use]
    pub fn session(&self) -> &Arc<ConsoleSession> {
        &self.session
    }

    #[must_use]
    pub const fn agent(&self) -> &ConversationalAgent {
        &self.agent
    }

    pub async fn start(&self) {
        self.agent.on_enter(self.session.as_ref()).await;
    }

    pub async fn finish(&self) {
        self.agent.on_exit(self.session.as_ref(), &self.userdata).await;
    }

    /// Handle one line typed by the user
    ///
    /// # Errors
    ///
    /// Returns error if the session fails to print
    pub async fn handle_line(&mut self, line: &str) -> Result<Step> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Step::Continue);
        }

        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "/salir" | "/quit" => return Ok(Step::Quit),
            "/help" | "/ayuda" => self.session.record(HELP.to_string())?,
            "/perfil" => {
                let summary = self.tools.call("get_user_summary", "").await;
                self.session.record(summary)?;
            }
            "/tool" => {
                let (name, args) = rest.trim().split_once(' ').unwrap_or((rest.trim(), ""));
                if name.is_empty() {
                    self.session.record("uso: /tool <name> [json]".to_string())?;
                } else {
                    let output = self.tools.call(name, args).await;
                    self.session.record(output)?;
                }
            }
            "/replay" => {
                let response = self
                    .replay
                    .handle_replay_request(self.session.as_ref(), &self.shutdown.child_token())
                    .await;
                self.session.record(response.to_json())?;
            }
            "/status" => {
                let snapshot = self.replay.status_snapshot().await;
                self.session.record(serde_json::to_string_pretty(&snapshot)?)?;
            }
            _ if command.starts_with('/') => {
                self.session.record(format!("comando desconocido: {command}"))?;
            }
            _ => {
                let segments = [line.to_string()];
                if self
                    .agent
                    .on_user_turn_completed(self.session.as_ref(), &self.userdata, &segments)
                    .await
                    .is_none()
                {
                    tracing::debug!("turn not recognised by onboarding");
                }
            }
        }

        self.sync_persona().await;
        Ok(Step::Continue)
    }

    /// Swap the agent when a tool changed the active persona
    async fn sync_persona(&mut self) {
        let current = self.userdata.lock().await.current_persona.clone();
        if current != self.agent.persona_id() {
            tracing::info!(from = %self.agent.persona_id(), to = %current, "switching console agent");
            let persona = self.personas.load_or_default(&current);
            self.agent = ConversationalAgent::new(current, persona);
        }
    }
}

/// Run a console conversation on stdin until `/salir`, EOF or shutdown
///
/// # Errors
///
/// Returns error if stdin cannot be read or the session fails
pub async fn run_console(mut console: Console, monitor: &SessionMonitor) -> Result<()> {
    monitor.session_started();
    console.start().await;

    let shutdown = console.shutdown.clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            () = shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if console.handle_line(&line).await? == Step::Quit {
            break;
        }
    }

    console.finish().await;
    monitor.session_ended();
    Ok(())
}
