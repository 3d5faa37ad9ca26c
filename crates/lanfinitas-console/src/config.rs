//! Console configuration.
//!
//! Resolution order: built-in defaults, then the TOML file (explicit
//! `--config` path or `<config_dir>/lanfinitas/console.toml`), then
//! environment variables, then CLI flags (applied by `main`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lanfinitas_protocol::{
    DEFAULT_AGENT_POLL_SECS, DEFAULT_DELEGATION_POLL_SECS, DEFAULT_TASK_POLL_SECS,
};

pub const ENV_API_URL: &str = "LANFINITAS_API_URL";
pub const ENV_API_TOKEN: &str = "LANFINITAS_API_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer token. Takes precedence over `token_file`.
    pub token: Option<String>,
    pub token_file: Option<PathBuf>,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            token: None,
            token_file: None,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub tasks_secs: u64,
    pub delegations_secs: u64,
    pub agents_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            tasks_secs: DEFAULT_TASK_POLL_SECS,
            delegations_secs: DEFAULT_DELEGATION_POLL_SECS,
            agents_secs: DEFAULT_AGENT_POLL_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Maximum number of timeline rows kept for display.
    pub max_events: usize,
    /// Redraw interval of the terminal UI.
    pub tick_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_events: 200,
            tick_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Log file used while the terminal UI owns the screen.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub console: DisplayConfig,
    pub logging: LoggingConfig,
}

impl ConsoleConfig {
    /// Load from `path`, or from the default location when it exists.
    /// An explicit path that cannot be read is an error; a missing
    /// default file just yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(default) if default.exists() => Self::from_file(&default),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded console config");
        Ok(config)
    }

    /// Apply `LANFINITAS_API_URL` / `LANFINITAS_API_TOKEN` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api.base_url = v;
        }
        if let Some(v) = lookup(ENV_API_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.api.token = Some(v);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api.base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid("api.base_url must not be empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api.base_url must be an http(s) URL, got '{url}'"
            )));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.request_timeout_secs must be at least 1".into()));
        }
        let polling = [
            ("polling.tasks_secs", self.polling.tasks_secs),
            ("polling.delegations_secs", self.polling.delegations_secs),
            ("polling.agents_secs", self.polling.agents_secs),
        ];
        for (name, secs) in polling {
            if secs == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be at least 1")));
            }
        }
        if self.console.tick_ms == 0 {
            return Err(ConfigError::Invalid("console.tick_ms must be at least 1".into()));
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.api.base_url.trim().trim_end_matches('/')
    }

    /// Log file for watch mode: configured path or `<data_dir>/lanfinitas/console.log`.
    pub fn log_file(&self) -> PathBuf {
        self.logging.file.clone().unwrap_or_else(|| data_dir().join("console.log"))
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lanfinitas").join("console.toml"))
}

/// Per-user data directory for logs and the session token.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lanfinitas")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = ConsoleConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.polling.agents_secs, 15);
        assert!(cfg.polling.tasks_secs < cfg.polling.agents_secs);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: ConsoleConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://api.lanfinitas.ai/"

            [polling]
            agents_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(cfg.base_url(), "https://api.lanfinitas.ai");
        assert_eq!(cfg.polling.agents_secs, 60);
        assert_eq!(cfg.polling.tasks_secs, DEFAULT_TASK_POLL_SECS);
        assert_eq!(cfg.console.max_events, 200);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_URL, "http://backend:9000"),
            (ENV_API_TOKEN, "tok-123"),
        ]
        .into_iter()
        .collect();
        let mut cfg = ConsoleConfig::default();
        cfg.apply_env_from(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.api.base_url, "http://backend:9000");
        assert_eq!(cfg.api.token.as_deref(), Some("tok-123"));
    }

    #[test]
    fn test_blank_env_ignored() {
        let mut cfg = ConsoleConfig::default();
        cfg.apply_env_from(|_| Some("   ".to_string()));
        assert_eq!(cfg.api.base_url, ApiConfig::default().base_url);
        assert!(cfg.api.token.is_none());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut cfg = ConsoleConfig::default();
        cfg.api.base_url = "ftp://example".into();
        assert!(cfg.validate().is_err());

        let mut cfg = ConsoleConfig::default();
        cfg.polling.delegations_secs = 0;
        assert!(cfg.validate().is_err());
    }
}
