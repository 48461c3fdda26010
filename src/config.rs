//! Configuration loading and validation for the cache manager.
//!
//! Values come from `MEMCACHE_`-prefixed environment variables, or from any
//! [`config::Config`] the caller has assembled:
//!
//! | Variable | Meaning | Default |
//! |:---------|:--------|:-------:|
//! | `MEMCACHE_PASSWORD` | Sealing password, 1..=32 bytes | required |
//! | `MEMCACHE_SERVERS` | Comma-separated `host[:port]` list | none |
//! | `MEMCACHE_DEFAULT_EXPIRE` | Expiration for writes that do not pass one | `0` |
//! | `MEMCACHE_LOG_LEVEL` | Tracing filter | `info` |
//! | `MEMCACHE_JSON_LOGS` | Emit JSON log lines | `false` |

use serde::Deserialize;
use thiserror::Error;

use crate::encryption::{EncryptionError, Password};
use crate::store::{Expiration, MAX_RELATIVE_EXPIRATION, ServerAddr};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "MEMCACHE";

/// Error types for configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("MEMCACHE_PASSWORD is invalid: {0}")]
    InvalidPassword(String),

    #[error("MEMCACHE_SERVERS contains an invalid address: {0}")]
    InvalidServer(String),

    #[error("MEMCACHE_DEFAULT_EXPIRE must be at most {max} seconds, got {value}")]
    InvalidExpire { value: u32, max: u32 },
}

/// Shape of the raw configuration source
#[derive(Debug, Deserialize)]
struct RawConfig {
    password: String,

    #[serde(default)]
    servers: String,

    #[serde(default)]
    default_expire: u32,

    #[serde(default = "default_log_level")]
    log_level: String,

    #[serde(default)]
    json_logs: bool,
}

fn default_log_level() -> String {
    "info".into()
}

/// Validated manager configuration
#[derive(Debug)]
pub struct ManagerConfig {
    /// Redacted in `Debug` output
    pub password: Password,
    pub servers: Vec<ServerAddr>,
    /// Relative seconds applied when a write does not pass an expiration
    pub default_expire: u32,
    pub log_level: String,
    pub json_logs: bool,
}

impl ManagerConfig {
    /// Config with no servers and default settings
    pub fn new(password: Password) -> Self {
        Self {
            password,
            servers: Vec::new(),
            default_expire: 0,
            log_level: default_log_level(),
            json_logs: false,
        }
    }

    /// Load and validate configuration from `MEMCACHE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the password is absent or any value fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Self::from_config(cfg)
    }

    /// Validate configuration from an already-built source
    pub fn from_config(cfg: config::Config) -> Result<Self, ConfigError> {
        let raw: RawConfig = cfg.try_deserialize()?;

        // Environment values arrive as strings; surrounding whitespace is part of the password
        let password = Password::new(raw.password.into_bytes()).map_err(|e| match e {
            EncryptionError::InvalidParameter(msg) => ConfigError::InvalidPassword(msg),
            other => ConfigError::InvalidPassword(other.to_string()),
        })?;

        let servers = parse_server_list(&raw.servers)?;

        if raw.default_expire > MAX_RELATIVE_EXPIRATION {
            return Err(ConfigError::InvalidExpire {
                value: raw.default_expire,
                max: MAX_RELATIVE_EXPIRATION,
            });
        }

        Ok(Self {
            password,
            servers,
            default_expire: raw.default_expire,
            log_level: raw.log_level,
            json_logs: raw.json_logs,
        })
    }

    pub fn with_servers(mut self, servers: Vec<ServerAddr>) -> Self {
        self.servers = servers;
        self
    }

    pub fn with_default_expire(mut self, secs: u32) -> Self {
        self.default_expire = secs;
        self
    }

    pub fn default_expiration(&self) -> Expiration {
        Expiration::from_secs(self.default_expire)
    }
}

/// Parse a comma-separated server list, skipping empty entries
pub fn parse_server_list(list: &str) -> Result<Vec<ServerAddr>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<ServerAddr>()
                .map_err(|_| ConfigError::InvalidServer(entry.to_string()))
        })
        .collect()
}
