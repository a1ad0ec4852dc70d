use anyhow::{Context, Result};
use serde::Deserialize;

/// Client configuration, layered from an optional file and `VOICECHAT__*` environment variables
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub audio: AudioConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host and port of the voice backend (e.g. "localhost:8000")
    pub host: String,
    /// Use wss:// instead of ws://
    pub secure: bool,
    /// Socket endpoint path
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost:8000".to_string(),
            secure: false,
            path: "/api/v1/ws/chat".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the conversation REST API
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Maximum number of buffered (not yet started) TTS chunks
    pub queue_capacity: usize,
    /// Sample rate of captured speech sent as vad.audio
    pub capture_sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 50,
            capture_sample_rate: 16000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path` (extension optional, file may be absent)
    /// with `VOICECHAT__SECTION__KEY` environment overrides on top.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("VOICECHAT").separator("__"))
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        Ok(settings.try_deserialize()?)
    }

    /// Socket endpoint URL derived from the server section
    pub fn ws_url(&self) -> String {
        let scheme = if self.server.secure { "wss" } else { "ws" };
        let path = if self.server.path.starts_with('/') {
            self.server.path.clone()
        } else {
            format!("/{}", self.server.path)
        };
        format!("{}://{}{}", scheme, self.server.host, path)
    }

    /// Parsed log level, falling back to INFO for unknown values
    pub fn log_level(&self) -> tracing::Level {
        self.logging
            .level
            .parse()
            .unwrap_or(tracing::Level::INFO)
    }
}
