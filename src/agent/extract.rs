//! Slot extraction from lower-cased Spanish user turns

use std::sync::LazyLock;

use regex::Regex;

static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bme llamo ([a-záéíóúñ]+)",
        r"\bsoy ([a-záéíóúñ]+)",
        r"\bmi nombre es ([a-záéíóúñ]+)",
        r"^([a-záéíóúñ]+)$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid name regex"))
    .collect()
});

static AGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"\btengo (\d+) años", r"\b(\d+) años", r"^(\d+)$"]
        .iter()
        .map(|p| Regex::new(p).expect("valid age regex"))
        .collect()
});

static COUNTRY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bsoy de ([a-záéíóúñ\s]+)",
        r"\bde ([a-záéíóúñ\s]+)",
        r"\bvivo en ([a-záéíóúñ\s]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid country regex"))
    .collect()
});

/// Words that follow "soy" or stand alone without being a name
const NOT_NAMES: &[&str] = &[
    "Hola", "Bien", "Muy", "Como", "Que", "Si", "No", "De", "Del", "Un", "Una",
];

/// Spanish-speaking countries recognised in "soy de ..." phrases
pub const COUNTRIES: &[&str] = &[
    "españa",
    "méxico",
    "argentina",
    "colombia",
    "chile",
    "perú",
    "venezuela",
    "ecuador",
    "bolivia",
    "uruguay",
    "paraguay",
    "guatemala",
    "honduras",
    "nicaragua",
    "costa rica",
    "panamá",
    "puerto rico",
    "cuba",
    "república dominicana",
];

/// Interest keywords, in reporting order
pub const INTEREST_KEYWORDS: &[&str] = &[
    "leer",
    "música",
    "deportes",
    "cocinar",
    "viajar",
    "cine",
    "arte",
    "tecnología",
    "ciencia",
    "historia",
    "naturaleza",
    "fotografía",
    "bailar",
    "cantar",
    "pintar",
    "escribir",
    "estudiar",
    "aprender",
];

const FAREWELLS: &[&str] = &[
    "adiós",
    "hasta luego",
    "nos vemos",
    "chau",
    "bye",
    "me voy",
    "tengo que irme",
    "hasta pronto",
    "gracias por todo",
];

/// Most interests taken from a single turn
pub const MAX_INTERESTS_PER_TURN: usize = 3;

/// Capitalise the first letter of every word
#[must_use]
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The user's first name, title-cased
#[must_use]
pub fn extract_name(text: &str) -> Option<String> {
    NAME_PATTERNS.iter().find_map(|pattern| {
        let candidate = title_case(pattern.captures(text)?.get(1)?.as_str().trim());
        (candidate.chars().count() >= 2 && !NOT_NAMES.contains(&candidate.as_str()))
            .then_some(candidate)
    })
}

/// A stated age; range checking is left to the caller
#[must_use]
pub fn extract_age(text: &str) -> Option<u32> {
    AGE_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(text)?.get(1)?.as_str().parse().ok())
}

/// A country from [`COUNTRIES`], title-cased
#[must_use]
pub fn extract_country(text: &str) -> Option<String> {
    COUNTRY_PATTERNS.iter().find_map(|pattern| {
        let candidate = pattern.captures(text)?.get(1)?.as_str().trim().to_string();
        COUNTRIES
            .iter()
            .find(|country| candidate.contains(*country))
            .map(|country| title_case(country))
    })
}

/// Interest keywords mentioned in `text`, at most [`MAX_INTERESTS_PER_TURN`]
#[must_use]
pub fn extract_interests(text: &str) -> Vec<String> {
    INTEREST_KEYWORDS
        .iter()
        .filter(|keyword| text.contains(*keyword))
        .take(MAX_INTERESTS_PER_TURN)
        .map(|keyword| (*keyword).to_string())
        .collect()
}

/// Whether the user is saying goodbye
#[must_use]
pub fn is_farewell(text: &str) -> bool {
    FAREWELLS.iter().any(|phrase| text.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(extract_name("me llamo ana").as_deref(), Some("Ana"));
        assert_eq!(extract_name("hola, soy josé").as_deref(), Some("José"));
        assert_eq!(extract_name("mi nombre es lucía").as_deref(), Some("Lucía"));
        assert_eq!(extract_name("carmen").as_deref(), Some("Carmen"));
    }

    #[test]
    fn rejects_non_names() {
        assert_eq!(extract_name("hola"), None);
        assert_eq!(extract_name("soy de españa"), None);
        assert_eq!(extract_name("x"), None);
        assert_eq!(extract_name("tengo 30 años"), None);
    }

    #[test]
    fn ages() {
        assert_eq!(extract_age("tengo 30 años"), Some(30));
        assert_eq!(extract_age("ya cumplí 45 años"), Some(45));
        assert_eq!(extract_age("27"), Some(27));
        assert_eq!(extract_age("tengo 200 años"), Some(200));
        assert_eq!(extract_age("vivo en el 3b"), None);
    }

    #[test]
    fn countries() {
        assert_eq!(extract_country("soy de méxico").as_deref(), Some("México"));
        assert_eq!(
            extract_country("vivo en costa rica desde niña").as_deref(),
            Some("Costa Rica")
        );
        assert_eq!(
            extract_country("vengo de la república dominicana").as_deref(),
            Some("República Dominicana")
        );
        assert_eq!(extract_country("soy de marte"), None);
        assert_eq!(extract_country("de a"), None);
    }

    #[test]
    fn interests_are_capped() {
        assert_eq!(
            extract_interests("me gusta leer, la música, el cine y el arte"),
            vec!["leer", "música", "cine"]
        );
        assert!(extract_interests("nada en especial").is_empty());
    }

    #[test]
    fn farewells() {
        assert!(is_farewell("bueno, me voy"));
        assert!(is_farewell("adiós"));
        assert!(!is_farewell("¿qué tal?"));
    }

    #[test]
    fn title_case_words() {
        assert_eq!(title_case("república dominicana"), "República Dominicana");
        assert_eq!(title_case("ñOÑo"), "Ñoño");
    }
}
