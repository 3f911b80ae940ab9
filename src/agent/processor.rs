//! Rule-based onboarding over user turns
//!
//! Each turn fills at most one profile slot, in priority order
//! name, age, country, interests, then farewell detection.

use super::extract;
use super::user_data::UserData;

const MIN_AGE: u32 = 5;
const MAX_AGE: u32 = 120;
const MAX_INTERESTS: usize = 3;

/// Fills [`UserData`] slots from user turns and picks the spoken reply
#[derive(Debug, Clone, Copy, Default)]
pub struct UserTurnProcessor;

impl UserTurnProcessor {
    /// Process one lower-cased user turn
    ///
    /// Returns the line the agent should say, or `None` when nothing in the
    /// turn was recognised.
    #[must_use]
    pub fn process(&self, text: &str, user: &mut UserData) -> Option<String> {
        Self::name(text, user)
            .or_else(|| Self::age(text, user))
            .or_else(|| Self::country(text, user))
            .or_else(|| Self::interests(text, user))
            .or_else(|| Self::farewell(text, user))
    }

    fn name(text: &str, user: &mut UserData) -> Option<String> {
        if user.name.is_some() {
            return None;
        }
        let name = extract::extract_name(text)?;
        tracing::info!(name = %name, "user name extracted");
        let reply = format!("¡Perfecto {name}! ¿Cuántos años tienes?");
        user.name = Some(name);
        Some(reply)
    }

    fn age(text: &str, user: &mut UserData) -> Option<String> {
        if user.age.is_some() {
            return None;
        }
        let age = extract::extract_age(text)?;
        if !(MIN_AGE..=MAX_AGE).contains(&age) {
            return Some("Esa edad parece inusual. ¿Podrías decirme tu edad real?".to_string());
        }
        tracing::info!(age, "user age extracted");
        user.age = Some(age);
        Some(format!("Tienes {age} años. ¿De qué país eres?"))
    }

    fn country(text: &str, user: &mut UserData) -> Option<String> {
        if user.country.is_some() {
            return None;
        }
        let country = extract::extract_country(text)?;
        tracing::info!(country = %country, "user country extracted");
        let reply = format!("¡Genial, {country}! ¿Cuáles son tus principales intereses?");
        user.country = Some(country);
        Some(reply)
    }

    fn interests(text: &str, user: &mut UserData) -> Option<String> {
        if user.interests.len() >= MAX_INTERESTS {
            return None;
        }
        let new: Vec<String> = extract::extract_interests(text)
            .into_iter()
            .filter(|i| !user.interests.contains(i))
            .collect();
        if new.is_empty() {
            return None;
        }
        tracing::info!(interests = ?new, "user interests extracted");
        user.interests.extend(new.iter().cloned());

        let name = user.name.as_deref().unwrap_or("usuario");
        Some(format!(
            "Excelente {name}! Me parece interesante que disfrutes de {}. Ya te conozco mejor.",
            new.join(", ")
        ))
    }

    fn farewell(text: &str, user: &UserData) -> Option<String> {
        if !extract::is_farewell(text) {
            return None;
        }
        Some(user.name.as_deref().map_or_else(
            || "¡Hasta pronto!".to_string(),
            |name| format!("¡Hasta pronto, {name}!"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(turns: &[&str]) -> (UserData, Vec<Option<String>>) {
        let mut user = UserData::default();
        let replies = turns
            .iter()
            .map(|t| UserTurnProcessor.process(t, &mut user))
            .collect();
        (user, replies)
    }

    #[test]
    fn onboarding_conversation() {
        let (user, replies) = run(&[
            "me llamo ana",
            "tengo 30 años",
            "soy de españa",
            "me encanta leer y la música",
        ]);

        assert_eq!(replies[0].as_deref(), Some("¡Perfecto Ana! ¿Cuántos años tienes?"));
        assert_eq!(replies[1].as_deref(), Some("Tienes 30 años. ¿De qué país eres?"));
        assert_eq!(
            replies[2].as_deref(),
            Some("¡Genial, España! ¿Cuáles son tus principales intereses?")
        );
        assert_eq!(
            replies[3].as_deref(),
            Some("Excelente Ana! Me parece interesante que disfrutes de leer, música. Ya te conozco mejor.")
        );
        assert!(user.is_onboarding_complete());
        assert_eq!(user.summary(), "Ana - 30 años - de España - intereses: leer, música");
    }

    #[test]
    fn one_slot_per_turn() {
        let (user, _) = run(&["me llamo ana y tengo 30 años"]);
        assert_eq!(user.name.as_deref(), Some("Ana"));
        assert!(user.age.is_none());
    }

    #[test]
    fn implausible_age_is_questioned_not_stored() {
        let (user, replies) = run(&["me llamo ana", "tengo 200 años"]);
        assert!(replies[1].as_deref().unwrap().contains("inusual"));
        assert!(user.age.is_none());
    }

    #[test]
    fn repeated_interests_are_ignored() {
        let (user, replies) = run(&["me llamo ana", "me gusta leer", "me gusta leer"]);
        assert!(replies[1].is_some());
        assert!(replies[2].is_none());
        assert_eq!(user.interests, vec!["leer"]);
    }

    #[test]
    fn farewell_uses_name_when_known() {
        let (_, replies) = run(&["me llamo ana", "bueno, adiós"]);
        assert_eq!(replies[1].as_deref(), Some("¡Hasta pronto, Ana!"));

        let (_, replies) = run(&["hasta luego amigos"]);
        assert_eq!(replies[0].as_deref(), Some("¡Hasta pronto!"));
    }

    #[test]
    fn unrecognised_turn_has_no_reply() {
        let (user, replies) = run(&["¿qué hora es?"]);
        assert!(replies[0].is_none());
        assert_eq!(user, UserData::default());
    }
}
