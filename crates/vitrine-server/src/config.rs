//! Server configuration.
//!
//! Loaded from a TOML file (`vitrine.toml` by default) with environment
//! overrides for the secrets that never belong in a file: `BOT_TOKEN`,
//! `STORE_URL`, `STORE_TOKEN`, `ADMIN_API_KEY`. A missing file falls back
//! to defaults; a missing bot token only disables the order and profile
//! endpoints, it never prevents startup.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        if self.store.timeout_secs == 0 {
            return Err("store.timeout_secs must be > 0".into());
        }
        if self.rate_limit.api_per_minute == 0
            || self.rate_limit.facets_per_minute == 0
            || self.rate_limit.orders_max == 0
        {
            return Err("rate_limit maxima must be > 0".into());
        }
        if self.rate_limit.orders_window_secs == 0 {
            return Err("rate_limit.orders_window_secs must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    /// Order and profile endpoints need the bot token to verify
    /// credentials; without it they answer 503.
    pub fn auth_enabled(&self) -> bool {
        self.auth
            .bot_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            timeout_secs: default_store_timeout_secs(),
        }
    }
}

impl StoreSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Signing secret issued by the hosting platform.
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Credential max age for profile requests, seconds. 0 disables.
    #[serde(default = "default_init_data_max_age")]
    pub init_data_max_age_secs: u64,
    /// Credential max age for order submissions, seconds. 0 disables.
    #[serde(default = "default_init_data_max_age")]
    pub order_init_data_max_age_secs: u64,
    /// Replay window for identical order resubmissions, seconds.
    #[serde(default = "default_replay_ttl")]
    pub replay_ttl_secs: u64,
    /// Key guarding the cache invalidation endpoint.
    #[serde(default)]
    pub admin_api_key: Option<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            init_data_max_age_secs: default_init_data_max_age(),
            order_init_data_max_age_secs: default_init_data_max_age(),
            replay_ttl_secs: default_replay_ttl(),
            admin_api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_api_per_minute")]
    pub api_per_minute: u32,
    #[serde(default = "default_facets_per_minute")]
    pub facets_per_minute: u32,
    #[serde(default = "default_orders_max")]
    pub orders_max: u32,
    #[serde(default = "default_orders_window_secs")]
    pub orders_window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            api_per_minute: default_api_per_minute(),
            facets_per_minute: default_facets_per_minute(),
            orders_max: default_orders_max(),
            orders_window_secs: default_orders_window_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_body_limit() -> usize {
    1024 * 1024
}
fn default_store_timeout_secs() -> u64 {
    30
}
fn default_init_data_max_age() -> u64 {
    300
}
fn default_replay_ttl() -> u64 {
    600
}
fn default_api_per_minute() -> u32 {
    60
}
fn default_facets_per_minute() -> u32 {
    10
}
fn default_orders_max() -> u32 {
    30
}
fn default_orders_window_secs() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Load configuration from a TOML file and apply environment overrides.
///
/// A missing file is not an error; the defaults apply.
pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let path = path.unwrap_or("vitrine.toml");

    let mut config = if std::path::Path::new(path).exists() {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?
    } else {
        AppConfig::default()
    };

    apply_env_overrides(&mut config);

    config.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(token) = std::env::var("BOT_TOKEN") {
        if !token.trim().is_empty() {
            config.auth.bot_token = Some(token);
        }
    }
    if let Ok(url) = std::env::var("STORE_URL") {
        if !url.trim().is_empty() {
            config.store.url = url;
        }
    }
    if let Ok(token) = std::env::var("STORE_TOKEN") {
        if !token.trim().is_empty() {
            config.store.token = token;
        }
    }
    if let Ok(key) = std::env::var("ADMIN_API_KEY") {
        if !key.trim().is_empty() {
            config.auth.admin_api_key = Some(key);
        }
    }
}
