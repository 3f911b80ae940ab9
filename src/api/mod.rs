//! HTTP server: LiveKit tokens, replay inspection, personas and the frontend

pub mod health;
pub mod personas;
pub mod rate_limit;
pub mod replay;
pub mod token;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::DEFAULT_PERSONA;
use crate::monitor::SessionMonitor;
use crate::persona::PersonaManager;
use crate::replay::ReplayService;

pub use token::{SessionInfo, SessionMetadata, TokenIssuer, TokenRequest, TokenResponse, room_name_for};

/// Shared state for API handlers
pub struct ApiState {
    pub tokens: TokenIssuer,
    pub replay: Arc<ReplayService>,
    pub personas: Arc<PersonaManager>,
    pub monitor: Arc<SessionMonitor>,
    pub default_persona: String,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    tokens: TokenIssuer,
    replay: Arc<ReplayService>,
    personas: Arc<PersonaManager>,
    monitor: Arc<SessionMonitor>,
    port: u16,
    default_persona: String,
    static_dir: Option<PathBuf>,
    rate_limit_rpm: Option<u32>,
}

impl ApiServerBuilder {
    #[must_use]
    pub fn new(
        tokens: TokenIssuer,
        replay: Arc<ReplayService>,
        personas: Arc<PersonaManager>,
        monitor: Arc<SessionMonitor>,
        port: u16,
    ) -> Self {
        Self {
            tokens,
            replay,
            personas,
            monitor,
            port,
            default_persona: DEFAULT_PERSONA.to_string(),
            static_dir: None,
            rate_limit_rpm: None,
        }
    }

    #[must_use]
    pub fn default_persona(mut self, id: impl Into<String>) -> Self {
        self.default_persona = id.into();
        self
    }

    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    #[must_use]
    pub const fn rate_limit(mut self, requests_per_minute: Option<u32>) -> Self {
        self.rate_limit_rpm = requests_per_minute;
        self
    }

    #[must_use]
    pub fn build(self) -> ApiServer {
        let state = Arc::new(ApiState {
            tokens: self.tokens,
            replay: self.replay,
            personas: self.personas,
            monitor: self.monitor,
            default_persona: self.default_persona,
            rate_limiter: self.rate_limit_rpm.map(rate_limit::create_limiter),
        });

        ApiServer {
            state,
            port: self.port,
            static_dir: self.static_dir,
        }
    }
}

pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    #[must_use]
    pub fn state(&self) -> &Arc<ApiState> {
        &self.state
    }

    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .nest("/api/replay", replay::router(self.state.clone()))
            .nest("/api/personas", personas::router(self.state.clone()))
            .merge(token::router(self.state.clone()))
            .merge(health::router(self.state.clone()))
            .merge(health::ready_router(self.state.clone()));

        // Serve the frontend if configured
        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir = ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

            router = router.fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        let router = router.layer(axum::middleware::from_fn_with_state(
            self.state.clone(),
            rate_limit::rate_limit_middleware,
        ));

        // CORS layer for cross-origin requests from frontend
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server until `shutdown` fires
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(
            port = self.port,
            livekit_url = %self.state.tokens.url(),
            "API server listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
