//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use chrono::Duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::api::ApiConfig as ServerConfig;
use crate::auth::DirectoryConfig;
use crate::store::StoreConfig;
use crate::websocket::HubConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub websocket: WebSocketConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Document store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,

    /// Write snapshots to disk
    #[serde(default = "default_true")]
    pub persist: bool,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("tenant-portal").to_string_lossy().to_string())
        .unwrap_or_else(|| "./portal_data".to_string())
}

fn default_flush_interval() -> u64 {
    5000 // 5 seconds
}

fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            flush_interval_ms: default_flush_interval(),
            persist: default_true(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_body_mb")]
    pub max_body_size_mb: usize,

    #[serde(default = "default_max_list_limit")]
    pub max_list_limit: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_mb() -> usize {
    10
}

fn default_max_list_limit() -> usize {
    500
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size_mb: default_max_body_mb(),
            max_list_limit: default_max_list_limit(),
        }
    }
}

/// Accounts and sessions
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: i64,

    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,

    /// Super admin ensured at startup together with `bootstrap_admin_token`
    #[serde(default)]
    pub bootstrap_admin_email: Option<String>,

    #[serde(default)]
    pub bootstrap_admin_token: Option<String>,
}

fn default_session_ttl() -> i64 {
    12
}

fn default_min_password_length() -> usize {
    6
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl(),
            min_password_length: default_min_password_length(),
            bootstrap_admin_email: None,
            bootstrap_admin_token: None,
        }
    }
}

/// WebSocket listen channel limits
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_max_listeners")]
    pub max_listeners_per_connection: usize,
}

fn default_max_connections() -> usize {
    1000
}

fn default_max_listeners() -> usize {
    32
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_listeners_per_connection: default_max_listeners(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
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
        let config_paths = [
            dirs::config_dir().map(|p| p.join("tenant-portal").join("config.toml")),
            Some(PathBuf::from("/etc/tenant-portal/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(data_dir) = var("PORTAL_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }

        if let Some(host) = var("PORTAL_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("PORTAL_API_PORT") {
            match port.parse() {
                Ok(p) => self.api.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PORTAL_API_PORT"),
            }
        }

        if let Some(email) = var("PORTAL_ADMIN_EMAIL") {
            self.auth.bootstrap_admin_email = Some(email);
        }
        if let Some(token) = var("PORTAL_ADMIN_TOKEN") {
            self.auth.bootstrap_admin_token = Some(token);
        }

        if let Some(level) = var("PORTAL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("PORTAL_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Data directory with a leading `~` resolved
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.storage.data_dir)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            flush_interval_ms: self.storage.flush_interval_ms,
            persist: self.storage.persist,
            ..StoreConfig::new(self.data_dir())
        }
    }

    /// Accounts persist beside the document snapshot as `auth.json`
    pub fn directory_config(&self) -> DirectoryConfig {
        DirectoryConfig {
            path: self.storage.persist.then(|| self.data_dir().join("auth.json")),
            session_ttl: Duration::hours(self.auth.session_ttl_hours),
            min_password_length: self.auth.min_password_length,
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.api.host.clone(),
            port: self.api.port,
            max_body_size: self.api.max_body_size_mb * 1024 * 1024,
            max_list_limit: self.api.max_list_limit,
        }
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            max_connections: self.websocket.max_connections,
            max_listeners_per_connection: self.websocket.max_listeners_per_connection,
        }
    }

    /// Email and token of the bootstrap super admin, when both are set
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        let email = self.auth.bootstrap_admin_email.as_deref().filter(|s| !s.is_empty())?;
        let token = self.auth.bootstrap_admin_token.as_deref().filter(|s| !s.is_empty())?;
        Some((email, token))
    }
}

/// Resolve `~` or `~/rest` against the home directory
fn expand_home(raw: &str) -> PathBuf {
    let rest = match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(raw),
    };

    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => {
            tracing::warn!(path = %raw, "No home directory, using data_dir as written");
            PathBuf::from(raw)
        }
    }
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
    r#"# Tenant Portal Configuration
#
# Environment variables override these settings:
# - PORTAL_DATA_DIR
# - PORTAL_API_HOST
# - PORTAL_API_PORT
# - PORTAL_ADMIN_EMAIL
# - PORTAL_ADMIN_TOKEN
# - PORTAL_LOG_LEVEL
# - PORTAL_LOG_FORMAT

[storage]
# Directory holding documents.json and auth.json
data_dir = "~/.local/share/tenant-portal"

# How often to flush the document snapshot to disk (ms)
flush_interval_ms = 5000

# Set to false to keep everything in memory
persist = true

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8080

# Maximum request body size (MB), also caps menu CSV uploads
max_body_size_mb = 10

# Largest `limit` accepted on list requests
max_list_limit = 500

[auth]
# Bearer session lifetime (hours)
session_ttl_hours = 12

# Minimum password length for new accounts
min_password_length = 6

# Super admin ensured at startup; its token never expires
# bootstrap_admin_email = "admin@example.com"
# bootstrap_admin_token = "change-me"

[websocket]
# Maximum concurrent WebSocket connections
max_connections = 1000

# Maximum live listeners per connection
max_listeners_per_connection = 32

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.auth.session_ttl_hours, 12);
        assert_eq!(config.websocket.max_listeners_per_connection, 32);
        assert!(config.bootstrap_admin().is_none());
    }

    #[test]
    fn test_generated_data_dir_is_expanded() {
        let config = Config::parse(&generate_default_config()).unwrap();
        let data_dir = config.store_config().data_dir;
        assert!(!data_dir.starts_with("~"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(data_dir, home.join(".local/share/tenant-portal"));
            assert_eq!(config.directory_config().path, Some(data_dir.join("auth.json")));
        }
    }

    #[test]
    fn test_expand_home_leaves_other_paths() {
        assert_eq!(expand_home("/srv/portal"), PathBuf::from("/srv/portal"));
        assert_eq!(expand_home("./portal_data"), PathBuf::from("./portal_data"));
        assert_eq!(expand_home("~alice/data"), PathBuf::from("~alice/data"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~"), home);
        }
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse("[api]\nport = 9000\n").unwrap();
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.server_config().max_body_size, 10 * 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PORTAL_API_PORT", "9100"),
            ("PORTAL_DATA_DIR", "/tmp/portal"),
            ("PORTAL_ADMIN_EMAIL", "root@portal.example"),
            ("PORTAL_ADMIN_TOKEN", "boot"),
            ("PORTAL_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.port, 9100);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.bootstrap_admin(), Some(("root@portal.example", "boot")));
        assert_eq!(
            config.directory_config().path,
            Some(PathBuf::from("/tmp/portal/auth.json"))
        );
    }

    #[test]
    fn test_invalid_port_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "PORTAL_API_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api\nport = ").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }
}
