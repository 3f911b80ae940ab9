//! Persona-bound conversational agent lifecycle

use std::sync::Arc;

use super::processor::UserTurnProcessor;
use super::user_data::SharedUserData;
use crate::persona::Persona;
use crate::replay::join_segments;
use crate::session::AgentSession;

/// Tools the LLM may call while this agent is active
pub const AGENT_TOOLS: &[&str] = &[
    "change_persona",
    "change_mode",
    "get_user_summary",
    "update_frontend_ui",
];

/// The voice agent for one persona
#[derive(Debug, Clone)]
pub struct ConversationalAgent {
    persona_id: String,
    persona: Arc<Persona>,
    processor: UserTurnProcessor,
}

impl ConversationalAgent {
    #[must_use]
    pub fn new(persona_id: impl Into<String>, persona: Arc<Persona>) -> Self {
        let persona_id = persona_id.into();
        tracing::info!(persona = %persona_id, name = %persona.name, "agent initialized");
        Self {
            persona_id,
            persona,
            processor: UserTurnProcessor,
        }
    }

    #[must_use]
    pub fn persona_id(&self) -> &str {
        &self.persona_id
    }

    #[must_use]
    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// System instructions handed to the LLM
    #[must_use]
    pub fn instructions(&self) -> &str {
        &self.persona.instructions
    }

    /// Greet the user when the agent becomes active
    pub async fn on_enter(&self, session: &dyn AgentSession) {
        tracing::info!(persona = %self.persona_id, "agent entering session");
        if let Err(e) = session.say_text(&self.persona.greeting()).await {
            tracing::error!(error = %e, "greeting failed");
            if let Err(e) = session.say_text("¡Hola! ¿Cómo puedo ayudarte?").await {
                tracing::error!(error = %e, "fallback greeting failed");
            }
        }
    }

    /// Handle a finished user turn made of text `segments`
    ///
    /// Returns the reply that was spoken, if any.
    pub async fn on_user_turn_completed(
        &self,
        session: &dyn AgentSession,
        user: &SharedUserData,
        segments: &[String],
    ) -> Option<String> {
        let text = join_segments(segments).to_lowercase();
        if text.is_empty() {
            return None;
        }
        tracing::debug!(text = %text.chars().take(50).collect::<String>(), "processing user turn");

        let reply = {
            let mut user = user.lock().await;
            self.processor.process(&text, &mut user)
        }?;

        if let Err(e) = session.say_text(&reply).await {
            tracing::error!(error = %e, "failed to speak onboarding reply");
        }
        Some(reply)
    }

    /// Say goodbye before handing the session over or closing it
    pub async fn on_exit(&self, session: &dyn AgentSession, user: &SharedUserData) {
        tracing::info!(persona = %self.persona_id, "agent leaving session");
        let name = user.lock().await.name.clone();
        let farewell = self.persona.farewell_for(name.as_deref());

        if let Err(e) = session.say_text(&farewell).await {
            tracing::error!(error = %e, "farewell failed");
            let fallback = format!("¡Hasta pronto, {}!", name.as_deref().unwrap_or("amigo"));
            if let Err(e) = session.say_text(&fallback).await {
                tracing::error!(error = %e, "fallback farewell failed");
            }
        }
    }
}
