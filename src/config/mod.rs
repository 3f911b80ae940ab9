//! Configuration management for the Mona agent
//!
//! Values are resolved with precedence environment > TOML file > defaults.

pub mod file;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::replay::ReplayConfig;
use crate::{Error, Result};
use file::MonaConfigFile;

/// Persona used when neither the job nor the config names one
pub const DEFAULT_PERSONA: &str = "rosalia";

/// Agent name the token server dispatches rooms to
pub const DEFAULT_AGENT_NAME: &str = "monaquehabla";

/// Default request budget for the HTTP server
pub const DEFAULT_RATE_LIMIT_RPM: u32 = 120;

const DEFAULT_PORT: u16 = 8000;

/// How the user talks to the agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoMode {
    Text,
    Voice,
    #[default]
    Hybrid,
}

impl IoMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for IoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IoMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "voice" => Ok(Self::Voice),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(Error::Config(format!("invalid io mode: {other}"))),
        }
    }
}

/// Parse an I/O mode leniently, falling back to [`IoMode::Hybrid`]
#[must_use]
pub fn validate_io_mode(raw: &str) -> IoMode {
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(io_mode = raw, fallback = %IoMode::Hybrid, "invalid io mode");
        IoMode::Hybrid
    })
}

/// Whether the agent runs in the local console instead of a real room
///
/// True when argv contains `console`, `LIVEKIT_CONSOLE_MODE=true`, or the
/// room name looks like a console/fake room.
pub fn is_console_mode<A, E>(args: &[A], env: E) -> bool
where
    A: AsRef<str>,
    E: Fn(&str) -> Option<String>,
{
    if args.iter().any(|a| a.as_ref() == "console") {
        return true;
    }
    if env("LIVEKIT_CONSOLE_MODE").is_some_and(|v| v == "true") {
        return true;
    }
    env("LIVEKIT_ROOM_NAME").is_some_and(|room| {
        let room = room.to_lowercase();
        room.contains("fake") || room.contains("console")
    })
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,

    /// Frontend directory served at `/`
    pub static_dir: Option<PathBuf>,

    /// Requests per minute; `None` disables rate limiting
    pub rate_limit_rpm: Option<u32>,
}

/// LiveKit server and token policy
#[derive(Debug)]
pub struct LiveKitConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<SecretString>,
    pub agent_name: String,
    pub token_ttl: Duration,
    pub token_reuse: Duration,
}

impl LiveKitConfig {
    /// Whether URL, key and secret are all present
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.url.is_some() && self.api_key.is_some() && self.api_secret.is_some()
    }

    /// Browsers only grant microphone access to secure origins
    #[must_use]
    pub fn is_secure_url(&self) -> bool {
        self.url
            .as_deref()
            .is_some_and(|u| u.starts_with("wss://") || u.starts_with("ws://localhost"))
    }
}

/// Agent defaults
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub default_persona: String,
    pub default_io_mode: IoMode,
    pub personas_dir: PathBuf,
}

/// Session monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub enabled: bool,
    pub log_interval: Duration,
}

/// Mona agent configuration
#[derive(Debug)]
pub struct Config {
    pub replay: ReplayConfig,
    pub server: ServerConfig,
    pub livekit: LiveKitConfig,
    pub agent: AgentConfig,
    pub monitor: MonitorConfig,

    /// Running against the local console; RPC is unavailable
    pub console_mode: bool,
}

impl Config {
    /// Load configuration from the environment and the TOML config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn load() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let env = |key: &str| std::env::var(key).ok();
        let mut config = Self::from_sources(file::load_config_file(), env)?;
        config.console_mode = is_console_mode(&args, env);
        Ok(config)
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn from_sources<E>(fc: MonaConfigFile, env: E) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let defaults = ReplayConfig::default();
        let replay = ReplayConfig {
            max_buffer_mb: parse_env(&env, "MONA_REPLAY_MAX_MB")?
                .or(fc.replay.max_buffer_mb)
                .unwrap_or(defaults.max_buffer_mb),
            max_duration_seconds: fc
                .replay
                .max_duration_seconds
                .unwrap_or(defaults.max_duration_seconds),
            frame_duration_ms: fc
                .replay
                .frame_duration_ms
                .unwrap_or(defaults.frame_duration_ms),
            default_sample_rate: fc
                .replay
                .default_sample_rate
                .unwrap_or(defaults.default_sample_rate),
            default_channels: fc
                .replay
                .default_channels
                .unwrap_or(defaults.default_channels),
        };
        if replay.max_buffer_mb == 0 || replay.frame_duration_ms == 0 {
            return Err(Error::Config(
                "replay max_buffer_mb and frame_duration_ms must be positive".to_string(),
            ));
        }

        let server = ServerConfig {
            port: match parse_env(&env, "MONA_PORT")? {
                Some(port) => port,
                None => parse_env(&env, "PORT")?
                    .or(fc.server.port)
                    .unwrap_or(DEFAULT_PORT),
            },
            static_dir: env("MONA_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
            rate_limit_rpm: Some(
                parse_env(&env, "MONA_RATE_LIMIT_RPM")?
                    .or(fc.server.rate_limit_rpm)
                    .unwrap_or(DEFAULT_RATE_LIMIT_RPM),
            )
            .filter(|rpm| *rpm > 0),
        };

        let livekit = LiveKitConfig {
            url: env("LIVEKIT_URL").or(fc.livekit.url),
            api_key: env("LIVEKIT_API_KEY").or(fc.livekit.api_key),
            api_secret: env("LIVEKIT_API_SECRET")
                .or(fc.livekit.api_secret)
                .map(SecretString::from),
            agent_name: fc
                .livekit
                .agent_name
                .unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string()),
            token_ttl: Duration::from_secs(60 * fc.livekit.token_ttl_minutes.unwrap_or(10)),
            token_reuse: Duration::from_secs(60 * fc.livekit.token_reuse_minutes.unwrap_or(8)),
        };

        let agent = AgentConfig {
            default_persona: env("MONA_DEFAULT_PERSONA")
                .or(fc.agent.default_persona)
                .unwrap_or_else(|| DEFAULT_PERSONA.to_string()),
            default_io_mode: fc
                .agent
                .default_io_mode
                .as_deref()
                .map_or(IoMode::Hybrid, validate_io_mode),
            personas_dir: env("MONA_PERSONAS_DIR")
                .or(fc.agent.personas_dir)
                .map_or_else(|| PathBuf::from("personas"), PathBuf::from),
        };

        let monitor = MonitorConfig {
            enabled: fc.monitor.enabled.unwrap_or(true),
            log_interval: Duration::from_secs(fc.monitor.log_interval_secs.unwrap_or(30).max(1)),
        };

        Ok(Self {
            replay,
            server,
            livekit,
            agent,
            monitor,
            console_mode: false,
        })
    }
}

fn parse_env<E, T>(env: &E, key: &str) -> Result<Option<T>>
where
    E: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {key} '{raw}': {e}")))
        })
        .transpose()
}
