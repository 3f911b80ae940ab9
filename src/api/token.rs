//! LiveKit access token issuance
//!
//! Tokens are HS256 JWTs in LiveKit's claim layout. Each user's latest token
//! is remembered so repeated requests within the reuse window, for the same
//! room, mode and persona, get the same token back.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use mini_moka::sync::Cache;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::ApiState;
use crate::config::{IoMode, LiveKitConfig, validate_io_mode};
use crate::{Error, Result};

/// LiveKit rejects participant metadata longer than this
pub const MAX_METADATA_CHARS: usize = 500;

const MAX_SESSIONS: u64 = 10_000;

/// Body of `POST /getToken`; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub io_mode: Option<String>,
    #[serde(default)]
    pub persona_id: Option<String>,
}

/// Settings the agent reads back from the participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub io_mode: IoMode,
    pub persona_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenResponse {
    pub url: String,
    pub token: String,
    pub room: String,
    pub user_id: String,
    pub metadata: SessionMetadata,
}

/// A token handed out to a user
#[derive(Debug, Clone)]
struct IssuedSession {
    token: String,
    room: String,
    identity: String,
    created_at: DateTime<Utc>,
    issued: Instant,
    metadata: SessionMetadata,
}

/// Public view of an issued session; never includes the token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub room: String,
    pub identity: String,
    pub created_at: DateTime<Utc>,
    pub metadata: SessionMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoGrant {
    room_join: bool,
    room: String,
    can_publish: bool,
    can_subscribe: bool,
    can_publish_data: bool,
    can_update_own_metadata: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentDispatch {
    agent_name: String,
    metadata: String,
}

#[derive(Debug, Serialize)]
struct RoomConfiguration {
    agents: Vec<AgentDispatch>,
}

/// Claims of a LiveKit access token
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LiveKitClaims {
    iss: String,
    sub: String,
    name: String,
    nbf: i64,
    exp: i64,
    video: VideoGrant,
    metadata: String,
    attributes: HashMap<String, String>,
    room_config: RoomConfiguration,
}

/// Issues and remembers LiveKit access tokens
pub struct TokenIssuer {
    url: String,
    api_key: String,
    key: EncodingKey,
    agent_name: String,
    default_persona: String,
    ttl: Duration,
    reuse: Duration,
    sessions: Cache<String, IssuedSession>,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("url", &self.url)
            .field("agent_name", &self.agent_name)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Build an issuer from complete LiveKit settings
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the URL, API key or secret is missing
    pub fn new(config: &LiveKitConfig, default_persona: impl Into<String>) -> Result<Self> {
        let (Some(url), Some(api_key), Some(secret)) =
            (&config.url, &config.api_key, &config.api_secret)
        else {
            return Err(Error::Config(
                "LIVEKIT_URL, LIVEKIT_API_KEY and LIVEKIT_API_SECRET are required".to_string(),
            ));
        };
        if !config.is_secure_url() {
            tracing::warn!(url = %url, "LiveKit URL is not wss://, browsers will block the microphone");
        }

        Ok(Self {
            url: url.clone(),
            api_key: api_key.clone(),
            key: EncodingKey::from_secret(secret.expose_secret().as_bytes()),
            agent_name: config.agent_name.clone(),
            default_persona: default_persona.into(),
            ttl: config.token_ttl,
            reuse: config.token_reuse,
            sessions: Cache::builder()
                .max_capacity(MAX_SESSIONS)
                .time_to_live(config.token_ttl)
                .build(),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue a token for `request`, reusing a recent matching one
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if signing fails
    pub fn issue(&self, request: &TokenRequest) -> Result<TokenResponse> {
        let identity = non_empty(request.identity.as_deref()).map_or_else(
            || {
                let generated = format!("user_{}", &Uuid::new_v4().simple().to_string()[..8]);
                tracing::info!(identity = %generated, "generated identity");
                generated
            },
            str::to_string,
        );
        let user_id = non_empty(request.user_id.as_deref()).unwrap_or(&identity).to_string();
        let room = non_empty(request.room.as_deref())
            .map_or_else(|| room_name_for(&user_id), str::to_string);
        let metadata = SessionMetadata {
            io_mode: request
                .io_mode
                .as_deref()
                .map_or(IoMode::Hybrid, validate_io_mode),
            persona_id: non_empty(request.persona_id.as_deref())
                .unwrap_or(&self.default_persona)
                .to_string(),
        };
        tracing::info!(
            user_id = %user_id,
            io_mode = %metadata.io_mode,
            persona = %metadata.persona_id,
            "token requested"
        );

        if let Some(existing) = self.reusable(&user_id, &room, &metadata) {
            tracing::info!(user_id = %user_id, room = %room, "reusing token");
            return Ok(self.response(existing.token, room, user_id, metadata));
        }

        let token = self.sign(&identity, &room, &metadata)?;
        self.sessions.insert(
            user_id.clone(),
            IssuedSession {
                token: token.clone(),
                room: room.clone(),
                identity,
                created_at: Utc::now(),
                issued: Instant::now(),
                metadata: metadata.clone(),
            },
        );
        tracing::info!(user_id = %user_id, room = %room, "token issued");

        Ok(self.response(token, room, user_id, metadata))
    }

    /// Forget `user_id`'s session; returns whether one existed
    pub fn revoke(&self, user_id: &str) -> bool {
        let key = user_id.to_string();
        let existed = self.sessions.contains_key(&key);
        self.sessions.invalidate(&key);
        existed
    }

    #[must_use]
    pub fn session_info(&self, user_id: &str) -> Option<SessionInfo> {
        self.sessions.get(&user_id.to_string()).map(|s| SessionInfo {
            room: s.room,
            identity: s.identity,
            created_at: s.created_at,
            metadata: s.metadata,
        })
    }

    fn reusable(&self, user_id: &str, room: &str, metadata: &SessionMetadata) -> Option<IssuedSession> {
        self.sessions
            .get(&user_id.to_string())
            .filter(|s| s.room == room && &s.metadata == metadata && s.issued.elapsed() < self.reuse)
    }

    fn sign(&self, identity: &str, room: &str, metadata: &SessionMetadata) -> Result<String> {
        let metadata_json = truncate_metadata(serde_json::to_string(metadata)?);
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);

        let claims = LiveKitClaims {
            iss: self.api_key.clone(),
            sub: identity.to_string(),
            name: identity.to_string(),
            nbf: now,
            exp: now.saturating_add(ttl),
            video: VideoGrant {
                room_join: true,
                room: room.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                can_update_own_metadata: true,
            },
            metadata: metadata_json.clone(),
            attributes: HashMap::from([
                ("io_mode".to_string(), metadata.io_mode.to_string()),
                ("persona_id".to_string(), metadata.persona_id.clone()),
            ]),
            room_config: RoomConfiguration {
                agents: vec![AgentDispatch {
                    agent_name: self.agent_name.clone(),
                    metadata: metadata_json,
                }],
            },
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| Error::Auth(format!("failed to sign token: {e}")))
    }

    fn response(&self, token: String, room: String, user_id: String, metadata: SessionMetadata) -> TokenResponse {
        TokenResponse {
            url: self.url.clone(),
            token,
            room,
            user_id,
            metadata,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Deterministic room for a user: `virtual_partner_<first 8 of uuid5>`
#[must_use]
pub fn room_name_for(user_id: &str) -> String {
    let id = Uuid::new_v5(&Uuid::NAMESPACE_DNS, user_id.as_bytes()).to_string();
    format!("virtual_partner_{}", &id[..8])
}

fn truncate_metadata(metadata: String) -> String {
    if metadata.chars().count() <= MAX_METADATA_CHARS {
        return metadata;
    }
    tracing::warn!(
        len = metadata.chars().count(),
        max = MAX_METADATA_CHARS,
        "metadata too long, truncating"
    );
    metadata.chars().take(MAX_METADATA_CHARS).collect()
}

fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": error, "message": message.into()}))).into_response()
}

async fn get_token(
    State(state): State<Arc<ApiState>>,
    body: std::result::Result<Json<TokenRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(e) => {
            state.monitor.record_rejection();
            tracing::warn!(error = %e, "token request without valid JSON");
            return error_response(StatusCode::BAD_REQUEST, "invalid JSON body", e.body_text());
        }
    };

    match state.tokens.issue(&request) {
        Ok(response) => {
            state.monitor.record_request();
            Json(response).into_response()
        }
        Err(e) => {
            state.monitor.record_rejection();
            tracing::error!(error = %e, "token generation failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "server error", e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    #[serde(default)]
    user_id: Option<String>,
}

async fn revoke_token(
    State(state): State<Arc<ApiState>>,
    body: std::result::Result<Json<UserQuery>, JsonRejection>,
) -> Response {
    let Some(user_id) = body.ok().and_then(|Json(q)| q.user_id) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid request", "user_id is required");
    };

    if state.tokens.revoke(&user_id) {
        tracing::info!(user_id = %user_id, "token revoked");
        Json(json!({"success": true, "message": "token revoked"})).into_response()
    } else {
        tracing::warn!(user_id = %user_id, "no active session to revoke");
        Json(json!({"success": false, "message": "no active session"})).into_response()
    }
}

async fn user_status(State(state): State<Arc<ApiState>>, Query(query): Query<UserQuery>) -> Response {
    let Some(user_id) = query.user_id.filter(|u| !u.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid request", "user_id is required");
    };

    match state.tokens.session_info(&user_id) {
        Some(info) => Json(json!({"active": true, "session_info": info})).into_response(),
        None => Json(json!({"active": false})).into_response(),
    }
}

/// Token routes: `/getToken`, `/revokeToken`, `/userStatus`
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/getToken", post(get_token))
        .route("/revokeToken", post(revoke_token))
        .route("/userStatus", get(user_status))
        .with_state(state)
}
