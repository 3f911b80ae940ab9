//! Weather and knowledge base lookups
//!
//! Both return canned data shaped like the real services' responses.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use super::validate::{validate_numeric_param, validate_string_param};
use crate::Result;

const UNITS: &[&str] = &["metric", "imperial", "kelvin"];

/// Default page size for knowledge base searches
pub const DEFAULT_MAX_RESULTS: u32 = 5;

fn default_units() -> String {
    "metric".to_string()
}

const fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}

#[derive(Debug, Deserialize)]
pub struct WeatherArgs {
    pub location: String,
    #[serde(default = "default_units")]
    pub units: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchArgs {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

/// Current conditions and a two-day forecast for `location`
///
/// # Errors
///
/// Returns [`crate::Error::Tool`] for a bad location or unit system
pub fn get_weather(args: &WeatherArgs) -> Result<Value> {
    let location = validate_string_param(&args.location, "location", 2, 100, None)?;
    let units = validate_string_param(&args.units.to_lowercase(), "units", 1, 20, Some(UNITS))?;
    tracing::info!(location = %location, units = %units, "weather query");

    let (temperature, unit) = match units.as_str() {
        "metric" => (22, "°C"),
        "imperial" => (72, "°F"),
        _ => (295, "K"),
    };

    Ok(json!({
        "location": location,
        "current": {
            "temperature": temperature,
            "temperature_unit": unit,
            "condition": "Partly Cloudy",
            "humidity": 65,
            "wind_speed": 12,
            "wind_direction": "NW",
        },
        "forecast": [
            {"day": "Today", "high": temperature + 3, "low": temperature - 5, "condition": "Partly Cloudy"},
            {"day": "Tomorrow", "high": temperature + 1, "low": temperature - 3, "condition": "Sunny"},
        ],
        "last_updated": Utc::now().to_rfc3339(),
        "units": units,
    }))
}

/// Knowledge base search, capped at `max_results`
///
/// # Errors
///
/// Returns [`crate::Error::Tool`] when the query is not 3..=500 chars or
/// `max_results` is outside 1..=20
pub fn search_knowledge_base(args: &SearchArgs) -> Result<Value> {
    let query = validate_string_param(&args.query, "query", 3, 500, None)?;
    let max_results = validate_numeric_param(args.max_results, "max_results", Some(1), Some(20))?;
    tracing::info!(query = %query.chars().take(50).collect::<String>(), max_results, "knowledge base search");

    let results: Vec<Value> = [
        ("kb_001", "Primeros pasos con el agente", "docs/getting-started.md", 0.95),
        ("kb_002", "Buenas prácticas para herramientas", "docs/tools.md", 0.87),
        ("kb_003", "Manejo de errores en agentes", "docs/error-handling.md", 0.82),
    ]
    .into_iter()
    .take(max_results as usize)
    .map(|(id, title, source, score)| {
        json!({
            "id": id,
            "title": title,
            "source": source,
            "relevance_score": score,
        })
    })
    .collect();

    Ok(json!({
        "query": query,
        "total_results": results.len(),
        "results": results,
    }))
}
