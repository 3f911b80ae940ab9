//! Per-session user profile

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::IoMode;

/// Interests shown in the summary before the remainder is counted
const SUMMARY_INTERESTS: usize = 3;

/// Profile handle shared by the agent and its tools
pub type SharedUserData = Arc<Mutex<UserData>>;

/// What the agent has learned about the user, plus session state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub country: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub current_persona: String,
    #[serde(default)]
    pub io_mode: IoMode,
}

impl UserData {
    #[must_use]
    pub fn new(persona_id: impl Into<String>, io_mode: IoMode) -> Self {
        Self {
            current_persona: persona_id.into(),
            io_mode,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn shared(self) -> SharedUserData {
        Arc::new(Mutex::new(self))
    }

    /// One-line Spanish summary of the profile
    ///
    /// `"Ana - 30 años - de España - intereses: leer, música"`
    #[must_use]
    pub fn summary(&self) -> String {
        let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) else {
            return "Usuario nuevo sin información recopilada".to_string();
        };

        let mut parts = vec![name.to_string()];
        if let Some(age) = self.age {
            parts.push(format!("{age} años"));
        }
        if let Some(country) = &self.country {
            parts.push(format!("de {country}"));
        }
        if !self.interests.is_empty() {
            let mut interests = self
                .interests
                .iter()
                .take(SUMMARY_INTERESTS)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            if self.interests.len() > SUMMARY_INTERESTS {
                interests.push_str(&format!(
                    " y {} intereses más",
                    self.interests.len() - SUMMARY_INTERESTS
                ));
            }
            parts.push(format!("intereses: {interests}"));
        }
        parts.join(" - ")
    }

    /// Name, age, country and at least one interest are known
    #[must_use]
    pub fn is_onboarding_complete(&self) -> bool {
        self.name.is_some() && self.age.is_some() && self.country.is_some() && !self.interests.is_empty()
    }

    /// Forget the collected profile, keeping persona and mode
    pub fn clear_profile(&mut self) {
        self.name = None;
        self.age = None;
        self.country = None;
        self.interests.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> UserData {
        UserData {
            name: Some("Ana".into()),
            age: Some(30),
            country: Some("España".into()),
            interests: vec!["leer".into(), "música".into()],
            ..UserData::new("rosalia", IoMode::Hybrid)
        }
    }

    #[test]
    fn summary_of_full_profile() {
        assert_eq!(
            ana().summary(),
            "Ana - 30 años - de España - intereses: leer, música"
        );
    }

    #[test]
    fn summary_counts_extra_interests() {
        let mut user = ana();
        user.interests = ["leer", "música", "cine", "arte", "viajar"]
            .map(String::from)
            .to_vec();
        assert_eq!(
            user.summary(),
            "Ana - 30 años - de España - intereses: leer, música, cine y 2 intereses más"
        );
    }

    #[test]
    fn summary_without_name() {
        let mut user = ana();
        user.name = None;
        assert_eq!(user.summary(), "Usuario nuevo sin información recopilada");
    }

    #[test]
    fn summary_skips_unknown_fields() {
        let user = UserData {
            name: Some("Luis".into()),
            ..UserData::default()
        };
        assert_eq!(user.summary(), "Luis");
    }

    #[test]
    fn onboarding_requires_everything() {
        let mut user = ana();
        assert!(user.is_onboarding_complete());
        user.interests.clear();
        assert!(!user.is_onboarding_complete());
    }

    #[test]
    fn clear_profile_keeps_session_state() {
        let mut user = ana();
        user.io_mode = IoMode::Voice;
        user.clear_profile();

        assert!(user.name.is_none());
        assert!(user.interests.is_empty());
        assert_eq!(user.current_persona, "rosalia");
        assert_eq!(user.io_mode, IoMode::Voice);
    }
}
