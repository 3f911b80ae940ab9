//! TOML configuration file loading
//!
//! Supports `~/.config/mona/agent/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct MonaConfigFile {
    /// Replay buffer limits
    #[serde(default)]
    pub replay: ReplayFileConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// LiveKit credentials and token policy
    #[serde(default)]
    pub livekit: LiveKitFileConfig,

    /// Agent defaults
    #[serde(default)]
    pub agent: AgentFileConfig,

    /// Session monitor
    #[serde(default)]
    pub monitor: MonitorFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReplayFileConfig {
    pub max_buffer_mb: Option<usize>,
    pub max_duration_seconds: Option<f64>,
    pub frame_duration_ms: Option<u32>,
    pub default_sample_rate: Option<u32>,
    pub default_channels: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Token/API server port
    pub port: Option<u16>,

    /// Frontend directory served at `/`
    pub static_dir: Option<String>,

    /// Requests per minute across all endpoints; 0 disables limiting
    pub rate_limit_rpm: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LiveKitFileConfig {
    /// `wss://` server URL handed to clients
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,

    /// Agent name used for room dispatch
    pub agent_name: Option<String>,

    /// Access token lifetime in minutes
    pub token_ttl_minutes: Option<u64>,

    /// Window in minutes during which an issued token is handed out again
    pub token_reuse_minutes: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AgentFileConfig {
    /// Persona used when a job carries none
    pub default_persona: Option<String>,

    /// `text`, `voice` or `hybrid`
    pub default_io_mode: Option<String>,

    /// Directory holding `<id>.json` persona files
    pub personas_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MonitorFileConfig {
    pub enabled: Option<bool>,

    /// Seconds between stats log lines
    pub log_interval_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `MonaConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> MonaConfigFile {
    let Some(path) = config_file_path() else {
        return MonaConfigFile::default();
    };

    if !path.exists() {
        return MonaConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            MonaConfigFile::default()
        }
    }
}

/// Read and parse a config file at `path`
///
/// # Errors
///
/// Returns error if the file can't be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<MonaConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/mona/agent/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("mona")
            .join("agent")
            .join("config.toml")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_parses() {
        let file: MonaConfigFile = toml::from_str(
            r#"
            [replay]
            max_buffer_mb = 4

            [livekit]
            url = "wss://example.livekit.cloud"
            "#,
        )
        .unwrap();

        assert_eq!(file.replay.max_buffer_mb, Some(4));
        assert!(file.replay.frame_duration_ms.is_none());
        assert_eq!(file.livekit.url.as_deref(), Some("wss://example.livekit.cloud"));
        assert!(file.server.port.is_none());
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();

        let file = read_config_file(&path).unwrap();
        assert_eq!(file.server.port, Some(9000));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        let err = read_config_file(&path).unwrap_err();
        assert_eq!(err.kind(), "Toml");
    }
}
