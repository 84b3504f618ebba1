// src/config/models.rs
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// File name of the log written to the working directory when logging is on
/// and no `log_path` is configured.
pub const DEFAULT_LOG_FILE: &str = "argus.log";

/// Largest inbound body buffered in passthrough mode unless configured.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no backends configured")]
    NoBackends,

    #[error("backend {url} must use the http scheme")]
    UnsupportedScheme { url: Url },

    #[error("backend {url} has no host")]
    MissingHost { url: Url },

    #[error("attempt_timeout_ms must be greater than zero")]
    ZeroTimeout,

    #[error("max_body_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("metrics path {0:?} must start with '/'")]
    InvalidMetricsPath(String),

    #[error("failed to resolve default log path")]
    LogPath(#[source] std::io::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Write logs to `log_path` instead of stdout.
    #[serde(default)]
    pub logging: bool,

    #[serde(default)]
    pub log_path: Option<String>,

    #[serde(default)]
    pub forward_mode: ForwardMode,

    /// Per-attempt timeout. Unset means a hung backend hangs the request.
    #[serde(default)]
    pub attempt_timeout_ms: Option<u64>,

    /// Cap on a buffered passthrough request body; larger ones get a 413.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Ordered; rotation follows this order.
    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub url: Url,
}

/// Shape of the request sent to a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardMode {
    /// Plain `GET` of the configured backend URL.
    #[default]
    Get,
    /// Inbound method, path, headers and body replayed against the backend.
    Passthrough,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,

    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backends.is_empty() {
            return Err(ConfigError::NoBackends);
        }

        for backend in &self.backends {
            let url = &backend.url;
            if url.scheme() != "http" {
                return Err(ConfigError::UnsupportedScheme { url: url.clone() });
            }
            if url.host_str().map_or(true, str::is_empty) {
                return Err(ConfigError::MissingHost { url: url.clone() });
            }
        }

        if self.attempt_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }

        if self.max_body_bytes == 0 {
            return Err(ConfigError::ZeroBodyLimit);
        }

        if !self.metrics.path.starts_with('/') {
            return Err(ConfigError::InvalidMetricsPath(self.metrics.path.clone()));
        }

        Ok(())
    }

    /// `host:port` as given; resolved when the listener binds.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }

    /// Where log output should go, or `None` for stdout.
    pub fn resolved_log_path(&self) -> Result<Option<PathBuf>, ConfigError> {
        if !self.logging {
            return Ok(None);
        }

        match self.log_path.as_deref() {
            Some(path) if !path.is_empty() => Ok(Some(PathBuf::from(path))),
            _ => {
                let cwd = std::env::current_dir().map_err(ConfigError::LogPath)?;
                Ok(Some(cwd.join(DEFAULT_LOG_FILE)))
            }
        }
    }
}
