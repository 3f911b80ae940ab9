//! Personas API endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;

use super::ApiState;
use crate::Error;
use crate::persona::Persona;

/// Build personas router, nested under `/api/personas`
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(list))
        .route("/{persona_id}", get(get_persona))
        .route("/{persona_id}/reload", post(reload))
        .with_state(state)
}

/// Persona info for API responses
#[derive(Debug, Serialize)]
pub struct PersonaResponse {
    pub id: String,
    pub name: String,
    pub voice_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
}

impl PersonaResponse {
    fn new(id: &str, p: &Persona) -> Self {
        Self {
            id: id.to_string(),
            name: p.name.clone(),
            voice_id: p.voice_id.clone(),
            greeting: p.greeting.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PersonaListResponse {
    pub personas: Vec<PersonaResponse>,
    pub default_id: String,
}

async fn list(State(state): State<Arc<ApiState>>) -> Json<PersonaListResponse> {
    let personas = state
        .personas
        .available()
        .into_iter()
        .filter_map(|id| {
            let persona = state.personas.load(&id).ok()?;
            Some(PersonaResponse::new(&id, &persona))
        })
        .collect();

    Json(PersonaListResponse {
        personas,
        default_id: state.default_persona.clone(),
    })
}

fn status_for(e: &Error) -> StatusCode {
    match e {
        Error::PersonaNotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidPersona { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn get_persona(
    State(state): State<Arc<ApiState>>,
    Path(persona_id): Path<String>,
) -> Result<Json<PersonaResponse>, StatusCode> {
    let persona = state.personas.load(&persona_id).map_err(|e| {
        tracing::debug!(persona = %persona_id, error = %e, "persona lookup failed");
        status_for(&e)
    })?;
    Ok(Json(PersonaResponse::new(&persona_id, &persona)))
}

/// Re-read a persona file from disk
async fn reload(
    State(state): State<Arc<ApiState>>,
    Path(persona_id): Path<String>,
) -> Result<Json<PersonaResponse>, StatusCode> {
    let persona = state.personas.reload(&persona_id).map_err(|e| {
        tracing::warn!(persona = %persona_id, error = %e, "persona reload failed");
        status_for(&e)
    })?;
    tracing::info!(persona = %persona_id, "persona reloaded");
    Ok(Json(PersonaResponse::new(&persona_id, &persona)))
}
