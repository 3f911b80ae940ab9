//! Persona configuration and management
//!
//! A persona is a JSON file `<personas_dir>/<id>.json` giving the agent its
//! name, TTS voice and system instructions, plus optional scripted lines.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const MAX_NAME_CHARS: usize = 50;
const MIN_INSTRUCTIONS_CHARS: usize = 10;

/// Personality the agent speaks as
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Persona {
    /// Display name
    pub name: String,

    /// TTS voice identifier
    pub voice_id: String,

    /// System instructions for the LLM
    pub instructions: String,

    /// Spoken when the agent enters a session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,

    /// Spoken when the agent leaves; `{name}` is replaced with the user's name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farewell: Option<String>,

    /// Spoken after switching to this persona
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_message: Option<String>,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: "Asistente Virtual".to_string(),
            voice_id: "default".to_string(),
            instructions: "Eres un asistente virtual útil y amigable.".to_string(),
            greeting: Some("¡Hola! Soy tu asistente virtual. ¿Cómo puedo ayudarte?".to_string()),
            farewell: Some("¡Hasta luego! Que tengas un excelente día.".to_string()),
            switch_message: None,
        }
    }
}

impl Persona {
    /// Generic persona with the given name and voice
    #[must_use]
    pub fn default_for(name: &str, voice_id: &str) -> Self {
        Self {
            name: name.to_string(),
            voice_id: voice_id.to_string(),
            instructions: format!("Eres {name}, un asistente virtual útil y amigable."),
            greeting: Some(format!("¡Hola! Soy {name}. ¿Cómo puedo ayudarte?")),
            farewell: Some("¡Hasta luego! Que tengas un excelente día.".to_string()),
            switch_message: None,
        }
    }

    /// Check field constraints
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPersona`] naming the first violated constraint
    pub fn validate(&self, id: &str) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidPersona {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        for (field, value) in [
            ("name", &self.name),
            ("voice_id", &self.voice_id),
            ("instructions", &self.instructions),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(&format!("field '{field}' must not be blank")));
            }
        }
        if self.name.chars().count() > MAX_NAME_CHARS {
            return Err(invalid("name is too long"));
        }
        if self.instructions.chars().count() < MIN_INSTRUCTIONS_CHARS {
            return Err(invalid("instructions are too short"));
        }
        Ok(())
    }

    /// Greeting line, falling back to a generic introduction
    #[must_use]
    pub fn greeting(&self) -> String {
        self.greeting
            .clone()
            .unwrap_or_else(|| format!("¡Hola! Soy {}, ¿cómo estás?", self.name))
    }

    /// Farewell line personalised for `user_name`
    ///
    /// Templates without a `{name}` placeholder get a personal preamble.
    #[must_use]
    pub fn farewell_for(&self, user_name: Option<&str>) -> String {
        let template = self.farewell.as_deref().unwrap_or("¡Hasta pronto!");
        match user_name {
            Some(name) if template.contains("{name}") => template.replace("{name}", name),
            Some(name) => format!("¡Fue un placer hablar contigo, {name}! {template}"),
            None => template.to_string(),
        }
    }

    /// Line spoken after switching to this persona
    #[must_use]
    pub fn switch_line(&self) -> String {
        self.switch_message
            .clone()
            .unwrap_or_else(|| format!("¡Hola! Ahora soy {}.", self.name))
    }
}

/// Loads and caches personas from a directory
#[derive(Debug)]
pub struct PersonaManager {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Arc<Persona>>>,
}

impl PersonaManager {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load a persona, served from cache after the first success
    ///
    /// # Errors
    ///
    /// Returns [`Error::PersonaNotFound`] if no file exists for `id`, or
    /// [`Error::InvalidPersona`] if it fails to parse or validate
    pub fn load(&self, id: &str) -> Result<Arc<Persona>> {
        if let Some(persona) = self.cached(id) {
            return Ok(persona);
        }

        let persona = Arc::new(self.read(id)?);
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), Arc::clone(&persona));
        tracing::debug!(persona = id, "persona loaded");
        Ok(persona)
    }

    /// Drop `id` from the cache and load it again from disk
    ///
    /// # Errors
    ///
    /// Same as [`PersonaManager::load`]
    pub fn reload(&self, id: &str) -> Result<Arc<Persona>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        self.load(id)
    }

    /// Load `id`, falling back to the built-in default persona
    #[must_use]
    pub fn load_or_default(&self, id: &str) -> Arc<Persona> {
        self.load(id).unwrap_or_else(|e| {
            tracing::warn!(persona = id, error = %e, "using default persona");
            Arc::new(Persona::default())
        })
    }

    /// Sorted ids of every valid persona in the directory
    ///
    /// Invalid files are skipped with a warning.
    #[must_use]
    pub fn available(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(
                    path = %self.dir.display(),
                    error = %e,
                    "failed to read personas directory"
                );
                return Vec::new();
            }
        };

        let mut ids: Vec<String> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
            .filter(|id| match self.load(id) {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(persona = %id, error = %e, "skipping invalid persona");
                    false
                }
            })
            .collect();
        ids.sort();
        ids
    }

    /// Forget every cached persona
    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::debug!("persona cache cleared");
    }

    fn cached(&self, id: &str) -> Option<Arc<Persona>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn read(&self, id: &str) -> Result<Persona> {
        if !is_valid_id(id) {
            return Err(Error::PersonaNotFound(id.to_string()));
        }

        let path = self.dir.join(format!("{id}.json"));
        if !path.exists() {
            tracing::error!(path = %path.display(), "persona file not found");
            return Err(Error::PersonaNotFound(id.to_string()));
        }

        let content = std::fs::read_to_string(&path)?;
        let persona: Persona =
            serde_json::from_str(&content).map_err(|e| Error::InvalidPersona {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        persona.validate(id)?;
        Ok(persona)
    }
}

/// Persona ids are file stems; reject anything that could escape the directory
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
