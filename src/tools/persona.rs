//! Persona and interaction mode switching

use super::ToolContext;
use super::validate::validate_string_param;
use crate::config::IoMode;
use crate::{Error, Result};

const MODES: &[&str] = &["text", "voice", "hybrid"];

/// Switch the active persona and announce it in the new voice
///
/// # Errors
///
/// Returns [`Error::PersonaNotFound`] (after telling the user) when no
/// persona exists for `persona_id`
pub async fn change_persona(ctx: &ToolContext, persona_id: &str) -> Result<String> {
    let id = validate_string_param(persona_id, "persona_id", 1, 50, None)?.to_lowercase();

    let persona = match ctx.personas.load(&id) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(persona = %id, error = %e, "persona change failed");
            let available = ctx.personas.available().join(", ");
            let line = format!("No reconozco esa personalidad. Puedes elegir entre: {available}.");
            if let Err(e) = ctx.session.say_text(&line).await {
                tracing::error!(error = %e, "failed to announce unknown persona");
            }
            return Err(Error::PersonaNotFound(id));
        }
    };

    let previous = {
        let mut user = ctx.userdata.lock().await;
        std::mem::replace(&mut user.current_persona, id.clone())
    };
    tracing::info!(from = %previous, to = %id, name = %persona.name, "persona changed");

    ctx.session.say_text(&persona.switch_line()).await?;
    Ok(format!("Personalidad cambiada a {}", persona.name))
}

/// Switch between text, voice and hybrid interaction
///
/// # Errors
///
/// Returns [`Error::Tool`] for an unknown mode
pub async fn change_mode(ctx: &ToolContext, mode: &str) -> Result<String> {
    let mode = validate_string_param(&mode.to_lowercase(), "mode", 1, 20, Some(MODES))
        .map_err(|_| {
            Error::Tool(format!(
                "modo '{}' no válido. Los modos disponibles son: {}",
                mode.trim(),
                MODES.join(", ")
            ))
        })?
        .parse::<IoMode>()?;

    let previous = {
        let mut user = ctx.userdata.lock().await;
        std::mem::replace(&mut user.io_mode, mode)
    };
    tracing::info!(from = %previous, to = %mode, "io mode changed");

    Ok(format!("¡Perfecto! He cambiado el modo de interacción a: {mode}"))
}
