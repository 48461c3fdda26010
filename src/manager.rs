//! Cache manager façade
//!
//! [`MemcacheManager`] ties a [`CacheStore`] to a [`ValueCodec`]: writes run the codec
//! forward and hand the bytes plus compression hint to the store, reads fetch
//! decompressed bytes and run the codec in reverse.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::{CodecError, CodecOptions, ValueCodec};
use crate::config::{ConfigError, ManagerConfig};
use crate::encryption::AuthenticatedCipher;
use crate::report::render_report;
use crate::store::{CacheStore, Expiration, ServerAddr, ServerStats, StoreError};

/// Error types for manager operations
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ManagerError {
    /// True when a stored value failed to authenticate or was malformed
    ///
    /// Callers that prefer cache-miss semantics can treat these as "value absent".
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, ManagerError::Codec(e) if e.is_integrity_failure())
    }
}

enum WriteMode {
    Add,
    Set,
    Replace,
}

/// Typed access to a cache pool
pub struct MemcacheManager<S: CacheStore> {
    store: S,
    codec: ValueCodec,
    servers: RwLock<Vec<ServerAddr>>,
    default_expiration: Expiration,
}

impl<S: CacheStore> MemcacheManager<S> {
    pub fn new(store: S, cipher: AuthenticatedCipher) -> Self {
        Self {
            store,
            codec: ValueCodec::new(Arc::new(cipher)),
            servers: RwLock::new(Vec::new()),
            default_expiration: Expiration::Never,
        }
    }

    /// Build a manager from validated configuration and register its servers
    pub fn from_config(config: ManagerConfig, store: S) -> Result<Self, ManagerError> {
        let default_expiration = config.default_expiration();
        let servers = config.servers;

        let mut manager = Self::new(store, AuthenticatedCipher::new(config.password));
        manager.default_expiration = default_expiration;
        for server in &servers {
            manager.register(server.clone())?;
        }
        Ok(manager)
    }

    pub fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn default_expiration(&self) -> Expiration {
        self.default_expiration
    }

    pub fn add_server(&self, host: &str, port: u16) -> Result<(), ManagerError> {
        self.register(ServerAddr::new(host, port))
    }

    fn register(&self, addr: ServerAddr) -> Result<(), ManagerError> {
        self.store.add_server(&addr)?;
        if let Ok(mut servers) = self.servers.write() {
            if !servers.contains(&addr) {
                servers.push(addr.clone());
            }
        }
        info!(server = %addr, "registered cache server");
        Ok(())
    }

    /// Servers registered through this manager, in registration order
    pub fn servers(&self) -> Vec<ServerAddr> {
        self.servers
            .read()
            .map(|servers| servers.clone())
            .unwrap_or_default()
    }

    pub fn status(&self, host: &str, port: u16) -> bool {
        self.store.server_status(&ServerAddr::new(host, port))
    }

    /// Store only if `key` is absent
    pub fn add<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expire: Option<Expiration>,
        options: &CodecOptions,
    ) -> Result<bool, ManagerError> {
        self.write(WriteMode::Add, key, value, expire, options)
    }

    /// Store unconditionally
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expire: Option<Expiration>,
        options: &CodecOptions,
    ) -> Result<bool, ManagerError> {
        self.write(WriteMode::Set, key, value, expire, options)
    }

    /// Store only if `key` is present
    pub fn replace<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expire: Option<Expiration>,
        options: &CodecOptions,
    ) -> Result<bool, ManagerError> {
        self.write(WriteMode::Replace, key, value, expire, options)
    }

    fn write<T: Serialize + ?Sized>(
        &self,
        mode: WriteMode,
        key: &str,
        value: &T,
        expire: Option<Expiration>,
        options: &CodecOptions,
    ) -> Result<bool, ManagerError> {
        let encoded = self.codec.encode(value, options)?;
        let expiration = expire.unwrap_or(self.default_expiration);

        let stored = match mode {
            WriteMode::Add => self
                .store
                .add(key, &encoded.bytes, expiration, encoded.compress)?,
            WriteMode::Set => self
                .store
                .put(key, &encoded.bytes, expiration, encoded.compress)?,
            WriteMode::Replace => self
                .store
                .replace(key, &encoded.bytes, expiration, encoded.compress)?,
        };

        debug!(
            key,
            size = encoded.bytes.len(),
            encrypted = options.encrypt,
            compressed = encoded.compress,
            stored,
            "wrote cache value"
        );
        Ok(stored)
    }

    /// Fetch and decode `key`; `Ok(None)` on a miss
    ///
    /// # Errors
    /// Integrity failures surface as errors rather than misses; see
    /// [`ManagerError::is_integrity_failure`].
    pub fn get<T: DeserializeOwned>(
        &self,
        key: &str,
        options: &CodecOptions,
    ) -> Result<Option<T>, ManagerError> {
        let Some(bytes) = self.store.get(key)? else {
            return Ok(None);
        };

        match self.codec.decode(&bytes, options) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "failed to decode cache value");
                Err(e.into())
            }
        }
    }

    /// Fetch and decode several keys; misses are left out of the map
    ///
    /// The first value that fails to decode aborts the whole call, as in [`get`](Self::get).
    pub fn get_multi<T: DeserializeOwned>(
        &self,
        keys: &[&str],
        options: &CodecOptions,
    ) -> Result<BTreeMap<String, T>, ManagerError> {
        let found = self.store.get_multi(keys)?;

        let mut values = BTreeMap::new();
        for (key, bytes) in found {
            match self.codec.decode(&bytes, options) {
                Ok(value) => {
                    values.insert(key, value);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "failed to decode cache value");
                    return Err(e.into());
                }
            }
        }
        debug!(requested = keys.len(), found = values.len(), "multi-get");
        Ok(values)
    }

    pub fn delete(&self, key: &str) -> Result<bool, ManagerError> {
        Ok(self.store.delete(key)?)
    }

    pub fn increment(&self, key: &str, by: u64) -> Result<Option<u64>, ManagerError> {
        Ok(self.store.increment(key, by)?)
    }

    pub fn decrement(&self, key: &str, by: u64) -> Result<Option<u64>, ManagerError> {
        Ok(self.store.decrement(key, by)?)
    }

    pub fn flush(&self) -> Result<(), ManagerError> {
        self.store.flush()?;
        info!("flushed cache pool");
        Ok(())
    }

    pub fn statistics(&self) -> Result<BTreeMap<String, ServerStats>, ManagerError> {
        Ok(self.store.statistics()?)
    }

    /// HTML report of the current pool statistics
    pub fn report(&self, now: u64) -> Result<String, ManagerError> {
        Ok(render_report(&self.statistics()?, now))
    }
}

impl<S: CacheStore + std::fmt::Debug> std::fmt::Debug for MemcacheManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemcacheManager")
            .field("store", &self.store)
            .field("codec", &self.codec)
            .field("default_expiration", &self.default_expiration)
            .finish_non_exhaustive()
    }
}
