//! Client configuration
//!
//! Settings come from environment variables (`MANGIA_*`) or from a TOML
//! file; both produce the same [`Config`]. The bearer token is an opaque
//! credential provisioned externally, the client only attaches it.

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which chat endpoint the controller talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatBackend {
    /// `POST /ai-chat`: single message plus context, replies carry
    /// intent/priority classification.
    #[default]
    Assistant,
    /// `POST /chat`: raw transcript window, replies may carry an order
    /// snapshot and a detected order id.
    Transcript,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the backend, no trailing slash.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token attached to chat requests when present.
    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default)]
    pub chat_backend: ChatBackend,

    /// How many trailing messages are sent as chat context.
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Per-attempt request timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Retries after the first attempt, for network-level failures only.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between retry attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Sessions idle longer than this are evicted.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_context_window() -> usize {
    3
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_session_idle_secs() -> u64 {
    1800
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            auth_token: None,
            chat_backend: ChatBackend::default(),
            context_window: default_context_window(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();
        Ok(Self {
            api_url: env::var("MANGIA_API_URL").unwrap_or(defaults.api_url),
            auth_token: env::var("MANGIA_AUTH_TOKEN").ok().filter(|t| !t.is_empty()),
            chat_backend: match env::var("MANGIA_CHAT_BACKEND").ok().as_deref() {
                Some("transcript") => ChatBackend::Transcript,
                _ => ChatBackend::Assistant,
            },
            context_window: env::var("MANGIA_CONTEXT_WINDOW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.context_window),
            request_timeout_ms: env::var("MANGIA_REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_ms),
            max_retries: env::var("MANGIA_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_delay_ms: env::var("MANGIA_RETRY_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.retry_delay_ms),
            session_idle_secs: env::var("MANGIA_SESSION_IDLE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.session_idle_secs),
        })
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONFIG: &str = r#"
api_url = "https://api.mangia.example"
auth_token = "secret-token"
chat_backend = "transcript"
context_window = 5
request_timeout_ms = 2500
max_retries = 3
"#;

    #[test]
    fn test_parse_config() {
        let config = Config::from_toml(SAMPLE_CONFIG).unwrap();

        assert_eq!(config.api_url, "https://api.mangia.example");
        assert_eq!(config.auth_token, Some("secret-token".to_string()));
        assert_eq!(config.chat_backend, ChatBackend::Transcript);
        assert_eq!(config.context_window, 5);
        assert_eq!(config.request_timeout_ms, 2500);
        assert_eq!(config.max_retries, 3);
        // Unset fields keep their defaults
        assert_eq!(config.retry_delay_ms, 1000);
        assert_eq!(config.session_idle_secs, 1800);
    }

    #[test]
    fn test_minimal_config() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.chat_backend, ChatBackend::Assistant);
        assert!(config.auth_token.is_none());
        assert_eq!(config.context_window, 3);
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_millis(5000));
        assert_eq!(config.retry_delay(), Duration::from_millis(1000));
        assert_eq!(config.session_idle(), Duration::from_secs(1800));
    }
}
