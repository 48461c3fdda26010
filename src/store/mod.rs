//! Cache store seam
//!
//! [`CacheStore`] is the boundary between the façade and whatever actually holds the
//! bytes: a memcached client, or the in-process [`MemoryStore`]. Stores own wire
//! compression: a value written with `compress = true` must come back from `get`
//! already decompressed.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub mod envelope;
pub mod memory;
pub mod stats;

pub use envelope::{CompressedEnvelope, EnvelopeError};
pub use memory::MemoryStore;
pub use stats::ServerStats;

/// Default memcached port
pub const DEFAULT_PORT: u16 = 11211;

/// Longest key memcached accepts
pub const MAX_KEY_LENGTH: usize = 250;

/// Largest relative expiration; larger values are absolute Unix timestamps
pub const MAX_RELATIVE_EXPIRATION: u32 = 60 * 60 * 24 * 30;

/// Error types for store operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("no cache servers in the pool")]
    NoServers,

    #[error("cache server {0} is unavailable")]
    ServerUnavailable(String),

    #[error("invalid cache key: {0}")]
    InvalidKey(String),

    #[error("value of {size} bytes exceeds the item size limit of {limit} bytes")]
    ValueTooLarge { size: usize, limit: usize },

    #[error("value stored under '{0}' is not a decimal number")]
    NonNumeric(String),

    #[error("invalid server address: {0}")]
    InvalidAddress(String),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Address of one cache server
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerAddr {
    pub host: String,
    pub port: u16,
}

impl ServerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn is_unix_socket(&self) -> bool {
        self.host.starts_with("unix://")
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') && !self.is_unix_socket() {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ServerAddr {
    type Err = StoreError;

    /// Parses `host`, `host:port`, `[ipv6]`, `[ipv6]:port` and `unix:///path/to.sock` (port 0)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(StoreError::InvalidAddress("empty address".into()));
        }

        if s.starts_with("unix://") {
            return Ok(ServerAddr::new(s, 0));
        }

        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| StoreError::InvalidAddress(format!("unclosed '[' in '{}'", s)))?;
            if host.is_empty() {
                return Err(StoreError::InvalidAddress(format!("missing host in '{}'", s)));
            }
            let port = match tail {
                "" => DEFAULT_PORT,
                _ => tail
                    .strip_prefix(':')
                    .and_then(|p| p.parse::<u16>().ok())
                    .ok_or_else(|| StoreError::InvalidAddress(format!("bad port in '{}'", s)))?,
            };
            return Ok(ServerAddr::new(host, port));
        }

        match s.rsplit_once(':') {
            // IPv6 literals must be bracketed to carry a port
            Some((host, _)) if host.contains(':') => Err(StoreError::InvalidAddress(format!(
                "unbracketed IPv6 address '{}'",
                s
            ))),
            Some((host, port)) => {
                if host.is_empty() {
                    return Err(StoreError::InvalidAddress(format!("missing host in '{}'", s)));
                }
                let port = port
                    .parse::<u16>()
                    .map_err(|_| StoreError::InvalidAddress(format!("bad port in '{}'", s)))?;
                Ok(ServerAddr::new(host, port))
            }
            None => Ok(ServerAddr::new(s, DEFAULT_PORT)),
        }
    }
}

/// Item lifetime, memcached style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiration {
    #[default]
    Never,
    /// Seconds from now
    Relative(u32),
    /// Unix timestamp
    Absolute(u64),
}

impl Expiration {
    /// Interpret a raw memcached expiration value
    ///
    /// 0 never expires, up to 30 days is relative, anything larger is a Unix timestamp.
    pub fn from_secs(secs: u32) -> Self {
        match secs {
            0 => Expiration::Never,
            s if s <= MAX_RELATIVE_EXPIRATION => Expiration::Relative(s),
            s => Expiration::Absolute(s as u64),
        }
    }

    /// Absolute deadline given the current Unix time
    pub fn deadline(&self, now: u64) -> Option<u64> {
        match self {
            Expiration::Never => None,
            Expiration::Relative(secs) => Some(now + *secs as u64),
            Expiration::Absolute(ts) => Some(*ts),
        }
    }
}

impl From<u32> for Expiration {
    fn from(secs: u32) -> Self {
        Expiration::from_secs(secs)
    }
}

/// Validate a memcached key: 1..=250 bytes, no whitespace or control characters
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey("key is empty".into()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(StoreError::InvalidKey(format!(
            "key is {} bytes, maximum is {}",
            key.len(),
            MAX_KEY_LENGTH
        )));
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(StoreError::InvalidKey(
            "key contains whitespace or control characters".into(),
        ));
    }
    Ok(())
}

/// Cache-store collaborator
///
/// Storage commands return `Ok(false)` when the item was not stored because of the
/// command's precondition (`add` on an existing key, `replace` on a missing one).
pub trait CacheStore: Send + Sync {
    fn add_server(&self, addr: &ServerAddr) -> Result<(), StoreError>;

    /// Whether the server is in the pool and accepting requests
    fn server_status(&self, addr: &ServerAddr) -> bool;

    /// Store unconditionally (memcached `set`)
    fn put(
        &self,
        key: &str,
        value: &[u8],
        expiration: Expiration,
        compress: bool,
    ) -> Result<bool, StoreError>;

    /// Store only if the key does not exist
    fn add(
        &self,
        key: &str,
        value: &[u8],
        expiration: Expiration,
        compress: bool,
    ) -> Result<bool, StoreError>;

    /// Store only if the key exists
    fn replace(
        &self,
        key: &str,
        value: &[u8],
        expiration: Expiration,
        compress: bool,
    ) -> Result<bool, StoreError>;

    /// Fetch decompressed bytes
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Fetch several keys at once; misses are absent from the map
    fn get_multi(&self, keys: &[&str]) -> Result<BTreeMap<String, Vec<u8>>, StoreError> {
        let mut found = BTreeMap::new();
        for key in keys {
            if let Some(bytes) = self.get(key)? {
                found.insert((*key).to_string(), bytes);
            }
        }
        Ok(found)
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Add `delta` to a decimal value; wraps at 2^64. `None` if the key is missing.
    fn increment(&self, key: &str, delta: u64) -> Result<Option<u64>, StoreError>;

    /// Subtract `delta` from a decimal value, flooring at 0. `None` if the key is missing.
    fn decrement(&self, key: &str, delta: u64) -> Result<Option<u64>, StoreError>;

    /// Invalidate every item on every server
    fn flush(&self) -> Result<(), StoreError>;

    /// Per-server statistics keyed by `host:port`
    fn statistics(&self) -> Result<BTreeMap<String, ServerStats>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv6_server_addr() {
        let bracketed = "[::1]:11212".parse::<ServerAddr>().unwrap();
        assert_eq!(bracketed, ServerAddr::new("::1", 11212));
        assert_eq!(bracketed.to_string(), "[::1]:11212");

        assert_eq!(
            "[fe80::1]".parse::<ServerAddr>().unwrap(),
            ServerAddr::new("fe80::1", DEFAULT_PORT)
        );
    }

    #[test]
    fn test_server_addr_parsing() {
        assert_eq!(
            "localhost:11211".parse::<ServerAddr>().unwrap(),
            ServerAddr::new("localhost", 11211)
        );
        assert_eq!(
            "cache-01".parse::<ServerAddr>().unwrap(),
            ServerAddr::new("cache-01", DEFAULT_PORT)
        );

        let unix = "unix:///var/run/memcached.sock".parse::<ServerAddr>().unwrap();
        assert!(unix.is_unix_socket());
        assert_eq!(unix.port, 0);

        assert!(matches!(
            "host:notaport".parse::<ServerAddr>(),
            Err(StoreError::InvalidAddress(_))
        ));
        assert!(matches!(
            ":11211".parse::<ServerAddr>(),
            Err(StoreError::InvalidAddress(_))
        ));
        assert!(matches!(
            "::1".parse::<ServerAddr>(),
            Err(StoreError::InvalidAddress(_))
        ));
        assert!(matches!(
            "[::1".parse::<ServerAddr>(),
            Err(StoreError::InvalidAddress(_))
        ));
        assert!(matches!(
            "[::1]11211".parse::<ServerAddr>(),
            Err(StoreError::InvalidAddress(_))
        ));
        assert!(matches!(
            "  ".parse::<ServerAddr>(),
            Err(StoreError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_server_addr_display() {
        assert_eq!(ServerAddr::new("10.0.0.1", 11212).to_string(), "10.0.0.1:11212");
    }

    #[test]
    fn test_expiration_interpretation() {
        assert_eq!(Expiration::from_secs(0), Expiration::Never);
        assert_eq!(Expiration::from_secs(30), Expiration::Relative(30));
        assert_eq!(
            Expiration::from_secs(MAX_RELATIVE_EXPIRATION),
            Expiration::Relative(MAX_RELATIVE_EXPIRATION)
        );
        assert_eq!(
            Expiration::from_secs(MAX_RELATIVE_EXPIRATION + 1),
            Expiration::Absolute(MAX_RELATIVE_EXPIRATION as u64 + 1)
        );
    }

    #[test]
    fn test_expiration_deadline() {
        assert_eq!(Expiration::Never.deadline(1000), None);
        assert_eq!(Expiration::Relative(30).deadline(1000), Some(1030));
        assert_eq!(Expiration::Absolute(5000).deadline(1000), Some(5000));
    }

    #[test]
    fn test_key_validation() {
        assert!(validate_key("user:42:profile").is_ok());
        assert!(validate_key(&"k".repeat(MAX_KEY_LENGTH)).is_ok());

        assert!(matches!(validate_key(""), Err(StoreError::InvalidKey(_))));
        assert!(matches!(
            validate_key(&"k".repeat(MAX_KEY_LENGTH + 1)),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(validate_key("has space"), Err(StoreError::InvalidKey(_))));
        assert!(matches!(validate_key("tab\tkey"), Err(StoreError::InvalidKey(_))));
        assert!(matches!(validate_key("nul\0key"), Err(StoreError::InvalidKey(_))));
    }
}
