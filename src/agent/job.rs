//! Job metadata and participant attribute handling

use std::collections::HashMap;

use serde::Deserialize;

use super::user_data::UserData;
use crate::config::{IoMode, validate_io_mode};
use crate::persona::PersonaManager;

/// Initial settings carried in the dispatch metadata of a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobConfig {
    pub persona_id: Option<String>,
    pub io_mode: Option<String>,
}

impl JobConfig {
    /// Parse job metadata, tolerating absent or malformed JSON
    #[must_use]
    pub fn from_metadata(metadata: &str) -> Self {
        if metadata.trim().is_empty() {
            return Self::default();
        }
        serde_json::from_str(metadata).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid job metadata, using defaults");
            Self::default()
        })
    }

    /// Fresh profile for this job
    #[must_use]
    pub fn user_data(&self, default_persona: &str, default_io_mode: IoMode) -> UserData {
        let persona = self
            .persona_id
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(default_persona);
        let io_mode = self
            .io_mode
            .as_deref()
            .map_or(default_io_mode, validate_io_mode);
        UserData::new(persona, io_mode)
    }
}

/// Apply `persona_id` / `io_mode` attribute changes from the frontend
///
/// Unknown personas and invalid modes are logged and ignored. Returns whether
/// anything changed.
pub fn apply_attribute_changes(
    user: &mut UserData,
    changed: &HashMap<String, String>,
    personas: &PersonaManager,
) -> bool {
    let mut updated = false;

    if let Some(persona_id) = changed.get("persona_id") {
        match personas.load(persona_id) {
            Ok(_) => {
                user.current_persona.clone_from(persona_id);
                tracing::info!(persona = %persona_id, "persona changed by attribute");
                updated = true;
            }
            Err(e) => tracing::error!(persona = %persona_id, error = %e, "persona change rejected"),
        }
    }

    if let Some(mode) = changed.get("io_mode") {
        match mode.parse::<IoMode>() {
            Ok(mode) => {
                user.io_mode = mode;
                tracing::info!(io_mode = %mode, "io mode changed by attribute");
                updated = true;
            }
            Err(e) => tracing::warn!(error = %e, "io mode change rejected"),
        }
    }

    updated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_parsing() {
        let job = JobConfig::from_metadata(r#"{"persona_id": "lola", "io_mode": "voice"}"#);
        assert_eq!(job.persona_id.as_deref(), Some("lola"));

        let user = job.user_data("rosalia", IoMode::Hybrid);
        assert_eq!(user.current_persona, "lola");
        assert_eq!(user.io_mode, IoMode::Voice);
    }

    #[test]
    fn malformed_metadata_uses_defaults() {
        let user = JobConfig::from_metadata("{oops").user_data("rosalia", IoMode::Text);
        assert_eq!(user.current_persona, "rosalia");
        assert_eq!(user.io_mode, IoMode::Text);
        assert_eq!(JobConfig::from_metadata(""), JobConfig::default());
    }

    #[test]
    fn invalid_mode_in_metadata_is_hybrid() {
        let user = JobConfig::from_metadata(r#"{"io_mode": "smoke"}"#).user_data("rosalia", IoMode::Text);
        assert_eq!(user.io_mode, IoMode::Hybrid);
    }

    #[test]
    fn attribute_changes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("lola.json"),
            r#"{"name": "Lola", "voice_id": "v", "instructions": "Eres Lola, muy alegre."}"#,
        )
        .unwrap();
        let personas = PersonaManager::new(dir.path());
        let mut user = UserData::new("rosalia", IoMode::Hybrid);

        let changed = HashMap::from([
            ("persona_id".to_string(), "lola".to_string()),
            ("io_mode".to_string(), "text".to_string()),
        ]);
        assert!(apply_attribute_changes(&mut user, &changed, &personas));
        assert_eq!(user.current_persona, "lola");
        assert_eq!(user.io_mode, IoMode::Text);

        let rejected = HashMap::from([
            ("persona_id".to_string(), "ghost".to_string()),
            ("io_mode".to_string(), "smoke".to_string()),
        ]);
        assert!(!apply_attribute_changes(&mut user, &rejected, &personas));
        assert_eq!(user.current_persona, "lola");
        assert_eq!(user.io_mode, IoMode::Text);
    }
}
