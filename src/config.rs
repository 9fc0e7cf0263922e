//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `INSIGHTDECK_*` environment overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::ApiConfig;
use crate::realtime::RealtimeConfig;
use crate::service::{ServiceConfig, WidgetScope};
use crate::session::User;
use crate::store::RestConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub api: ApiServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub realtime: RealtimeSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote table store the CLI talks to
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,

    pub api_key: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_backend_url() -> String {
    "http://localhost:8083".to_string()
}

fn default_request_timeout() -> u64 {
    10_000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            api_key: None,
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl BackendConfig {
    pub fn rest_config(&self) -> RestConfig {
        RestConfig {
            base_url: self.url.clone(),
            api_key: self.api_key.clone(),
            request_timeout_ms: self.request_timeout_ms,
        }
    }
}

/// The user the CLI acts as
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    pub user_id: Option<String>,
    pub email: Option<String>,
}

impl SessionConfig {
    /// Configured user; the email falls back to an empty string
    pub fn user(&self) -> Option<User> {
        let id = self.user_id.as_deref()?.trim();
        if id.is_empty() {
            return None;
        }
        Some(User::new(id, self.email.clone().unwrap_or_default()))
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8083
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl ApiServerConfig {
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
        }
    }
}

/// Storage of the API server's tables
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// JSON snapshot file; tables stay in memory only when unset
    pub data_file: Option<String>,

    #[serde(default = "default_persist_interval")]
    pub persist_interval_ms: u64,
}

fn default_persist_interval() -> u64 {
    5000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            persist_interval_ms: default_persist_interval(),
        }
    }
}

impl StoreConfig {
    pub fn persist_interval(&self) -> Duration {
        Duration::from_millis(self.persist_interval_ms.max(100))
    }
}

/// Change feed settings
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeSettings {
    #[serde(default)]
    pub widget_scope: WidgetScope,

    #[serde(default = "default_subscribe_timeout")]
    pub subscribe_timeout_ms: u64,
}

fn default_subscribe_timeout() -> u64 {
    5000
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            widget_scope: WidgetScope::default(),
            subscribe_timeout_ms: default_subscribe_timeout(),
        }
    }
}

impl RealtimeSettings {
    /// Client settings for the feed served next to `backend_url`
    pub fn client_config(&self, backend_url: &str) -> RealtimeConfig {
        RealtimeConfig {
            subscribe_timeout_ms: self.subscribe_timeout_ms,
            ..RealtimeConfig::from_base_url(backend_url)
        }
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            widget_scope: self.widget_scope,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        for path in default_paths() {
            if path.exists() {
                match Self::load_with_env(&path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `INSIGHTDECK_*` overrides from `lookup`
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("INSIGHTDECK_BACKEND_URL") {
            self.backend.url = url;
        }
        if let Some(key) = lookup("INSIGHTDECK_API_KEY") {
            self.backend.api_key = Some(key);
        }

        if let Some(user_id) = lookup("INSIGHTDECK_USER_ID") {
            self.session.user_id = Some(user_id);
        }
        if let Some(email) = lookup("INSIGHTDECK_EMAIL") {
            self.session.email = Some(email);
        }

        if let Some(host) = lookup("INSIGHTDECK_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = lookup("INSIGHTDECK_API_PORT") {
            match port.parse() {
                Ok(p) => self.api.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid INSIGHTDECK_API_PORT"),
            }
        }

        if let Some(file) = lookup("INSIGHTDECK_DATA_FILE") {
            self.store.data_file = Some(file);
        }

        if let Some(scope) = lookup("INSIGHTDECK_WIDGET_SCOPE") {
            match scope.as_str() {
                "unscoped" => self.realtime.widget_scope = WidgetScope::Unscoped,
                "current_dashboard" => self.realtime.widget_scope = WidgetScope::CurrentDashboard,
                other => tracing::warn!(value = %other, "Ignoring invalid INSIGHTDECK_WIDGET_SCOPE"),
            }
        }

        if let Some(level) = lookup("INSIGHTDECK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("INSIGHTDECK_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Config file locations, most specific first
pub fn default_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("insightdeck").join("config.toml"));
    }
    paths.push(PathBuf::from("/etc/insightdeck/config.toml"));
    paths.push(PathBuf::from("./insightdeck.toml"));
    paths
}

/// Default snapshot file under the user's data directory
pub fn default_data_file() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("insightdeck").join("tables.json"))
        .unwrap_or_else(|| PathBuf::from("./insightdeck_tables.json"))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# InsightDeck Configuration
#
# Environment variables override these settings:
# - INSIGHTDECK_BACKEND_URL
# - INSIGHTDECK_API_KEY
# - INSIGHTDECK_USER_ID
# - INSIGHTDECK_EMAIL
# - INSIGHTDECK_API_HOST
# - INSIGHTDECK_API_PORT
# - INSIGHTDECK_DATA_FILE
# - INSIGHTDECK_WIDGET_SCOPE
# - INSIGHTDECK_LOG_LEVEL
# - INSIGHTDECK_LOG_FORMAT

[backend]
# Base URL of the table store (insightdeck-api or a compatible backend)
url = "http://localhost:8083"

# Optional API key, sent as `apikey` and bearer token
# api_key = ""

# Request timeout (ms)
request_timeout_ms = 10000

[session]
# User the CLI acts as
# user_id = ""
# email = ""

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8083

# Allowed CORS origins (empty allows any)
cors_origins = []

[store]
# JSON snapshot of the API server's tables; in-memory only when unset
# data_file = "~/.local/share/insightdeck/tables.json"

# How often dirty tables are written (ms)
persist_interval_ms = 5000

[realtime]
# Widget changes to follow: "unscoped" (every widget change) or
# "current_dashboard" (only the selected dashboard's widgets)
widget_scope = "unscoped"

# How long to wait for a subscription acknowledgement (ms)
subscribe_timeout_ms = 5000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/insightdeck/insightdeck.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend.url, "http://localhost:8083");
        assert_eq!(config.api.port, 8083);
        assert_eq!(config.realtime.widget_scope, WidgetScope::Unscoped);
        assert!(config.session.user().is_none());
        assert!(config.store.data_file.is_none());
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.api.port, 8083);
        assert_eq!(config.store.persist_interval_ms, 5000);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_file() {
        let config = Config::parse(
            r#"
            [session]
            user_id = "u1"
            email = "ada@example.com"

            [realtime]
            widget_scope = "current_dashboard"
            "#,
        )
        .unwrap();

        assert_eq!(config.session.user().unwrap(), User::new("u1", "ada@example.com"));
        assert_eq!(
            config.realtime.service_config().widget_scope,
            WidgetScope::CurrentDashboard
        );
        assert_eq!(config.realtime.subscribe_timeout_ms, 5000);
    }

    #[test]
    fn test_invalid_scope_rejected() {
        assert!(Config::parse("[realtime]\nwidget_scope = \"everything\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[backend]\nurl = \"https://bi.example.com\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.backend.rest_config().base_url, "https://bi.example.com");
        assert_eq!(
            config.realtime.client_config(&config.backend.url).url,
            "wss://bi.example.com/realtime"
        );

        let missing = Config::load(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("INSIGHTDECK_BACKEND_URL", "http://10.0.0.5:8083"),
            ("INSIGHTDECK_USER_ID", "u9"),
            ("INSIGHTDECK_API_PORT", "not-a-port"),
            ("INSIGHTDECK_WIDGET_SCOPE", "current_dashboard"),
            ("INSIGHTDECK_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.backend.url, "http://10.0.0.5:8083");
        assert_eq!(config.session.user().unwrap().id, "u9");
        assert_eq!(config.api.port, 8083);
        assert_eq!(config.realtime.widget_scope, WidgetScope::CurrentDashboard);
        assert_eq!(config.logging.format, "json");
    }
}
