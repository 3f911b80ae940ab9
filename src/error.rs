//! Error types for the Mona agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the agent
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Persona not found
    #[error("persona not found: {0}")]
    PersonaNotFound(String),

    /// Persona file present but failed validation
    #[error("invalid persona {id}: {reason}")]
    InvalidPersona { id: String, reason: String },

    /// Audio encoding or playback error
    #[error("audio error: {0}")]
    Audio(String),

    /// Error reported by the host session (say, event registration)
    #[error("session error: {0}")]
    Session(String),

    /// RPC transport error
    #[error("rpc error: {0}")]
    Rpc(String),

    /// Operation cancelled by the host
    #[error("operation cancelled")]
    Cancelled,

    /// Tool invocation error, safe to surface to the LLM
    #[error("tool error: {0}")]
    Tool(String),

    /// Token issuance error
    #[error("auth error: {0}")]
    Auth(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Short name of the error variant, reported to RPC callers as `error_type`
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "Config",
            Self::PersonaNotFound(_) => "PersonaNotFound",
            Self::InvalidPersona { .. } => "InvalidPersona",
            Self::Audio(_) => "Audio",
            Self::Session(_) => "Session",
            Self::Rpc(_) => "Rpc",
            Self::Cancelled => "Cancelled",
            Self::Tool(_) => "Tool",
            Self::Auth(_) => "Auth",
            Self::Io(_) => "Io",
            Self::Serialization(_) => "Serialization",
            Self::Toml(_) => "Toml",
        }
    }

    /// Whether the error represents a host-initiated cancellation
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
