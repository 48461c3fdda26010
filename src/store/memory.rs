//! In-process [`CacheStore`] with memcached semantics
//!
//! Each added server becomes a node with its own item map and counters. Keys are
//! routed to nodes by xxHash3-64, so a fixed pool always sends a key to the same node.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, trace, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::metrics::OperationMetrics;

#[cfg(feature = "compression")]
use super::envelope::CompressedEnvelope;
use super::stats::ServerStats;
use super::{CacheStore, Expiration, ServerAddr, StoreError, validate_key};

/// memcached's default `-m 64`
pub const DEFAULT_LIMIT_MAXBYTES: u64 = 64 * 1024 * 1024;

/// memcached's default item size limit
pub const MAX_ITEM_SIZE: usize = 1024 * 1024;

/// Unix-time source, injectable for expiry tests
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

fn system_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug)]
struct Item {
    data: Vec<u8>,
    compressed: bool,
    expires_at: Option<u64>,
    /// Insertion order, oldest evicted first
    seq: u64,
}

impl Item {
    fn is_expired(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(deadline) if deadline <= now)
    }

    fn footprint(key: &str, data: &[u8]) -> u64 {
        (key.len() + data.len()) as u64
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StoreMode {
    Set,
    Add,
    Replace,
}

#[derive(Debug)]
struct NodeState {
    items: HashMap<String, Item>,
    stats: ServerStats,
    started_at: u64,
    next_seq: u64,
    online: bool,
}

impl NodeState {
    fn new(now: u64, limit_maxbytes: u64) -> Self {
        let stats = ServerStats {
            pid: std::process::id(),
            version: format!("memory-{}", env!("CARGO_PKG_VERSION")),
            pointer_size: usize::BITS,
            limit_maxbytes,
            threads: 1,
            accepting_conns: true,
            ..Default::default()
        };
        Self {
            items: HashMap::new(),
            stats,
            started_at: now,
            next_seq: 0,
            online: true,
        }
    }

    /// Drop `key` if it has expired, returning whether it is still live
    fn live(&mut self, key: &str, now: u64) -> bool {
        let expired = match self.items.get(key) {
            Some(item) => item.is_expired(now),
            None => return false,
        };
        if expired {
            self.remove(key);
            return false;
        }
        true
    }

    fn remove(&mut self, key: &str) -> Option<Item> {
        let item = self.items.remove(key)?;
        self.stats.bytes = self
            .stats
            .bytes
            .saturating_sub(Item::footprint(key, &item.data));
        self.stats.curr_items = self.items.len() as u64;
        Some(item)
    }

    fn purge_expired(&mut self, now: u64) {
        let expired: Vec<String> = self
            .items
            .iter()
            .filter(|(_, item)| item.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            self.remove(&key);
        }
    }

    /// Evict oldest items until `incoming` more bytes fit
    fn make_room(&mut self, incoming: u64) {
        let limit = self.stats.limit_maxbytes;
        if limit == 0 {
            return;
        }
        while self.stats.bytes + incoming > limit {
            let oldest = self
                .items
                .iter()
                .min_by_key(|(_, item)| item.seq)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    self.remove(&key);
                    self.stats.evictions += 1;
                    trace!(key = %key, "evicted item");
                }
                None => break,
            }
        }
    }

    /// Store an item, evicting older ones to make room
    ///
    /// An item larger than the whole node limit is refused before anything is evicted.
    fn insert(
        &mut self,
        key: &str,
        data: Vec<u8>,
        compressed: bool,
        expires_at: Option<u64>,
    ) -> Result<(), StoreError> {
        let footprint = Item::footprint(key, &data);
        let limit = self.stats.limit_maxbytes;
        if limit > 0 && footprint > limit {
            return Err(StoreError::ValueTooLarge {
                size: footprint as usize,
                limit: limit as usize,
            });
        }

        self.remove(key);
        self.make_room(footprint);

        let seq = self.next_seq;
        self.next_seq += 1;
        self.items.insert(
            key.to_string(),
            Item {
                data,
                compressed,
                expires_at,
                seq,
            },
        );
        self.stats.bytes += footprint;
        self.stats.curr_items = self.items.len() as u64;
        self.stats.total_items += 1;
        Ok(())
    }

    fn snapshot(&mut self, now: u64) -> ServerStats {
        self.purge_expired(now);
        let mut stats = self.stats.clone();
        stats.time = now;
        stats.uptime = now.saturating_sub(self.started_at);
        stats
    }
}

#[derive(Debug)]
struct Node {
    addr: ServerAddr,
    state: Mutex<NodeState>,
}

impl Node {
    fn lock(&self) -> Result<MutexGuard<'_, NodeState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend(format!("node {} lock poisoned", self.addr)))
    }
}

/// Thread-safe in-memory cache pool
pub struct MemoryStore {
    nodes: RwLock<Vec<Node>>,
    clock: Clock,
    limit_maxbytes: u64,
    last_metrics: Arc<Mutex<OperationMetrics>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(system_clock))
    }

    /// Store whose notion of "now" comes from `clock`
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            clock,
            limit_maxbytes: DEFAULT_LIMIT_MAXBYTES,
            last_metrics: Arc::new(Mutex::new(OperationMetrics::new())),
        }
    }

    /// Memory limit applied to nodes added after this call; 0 disables eviction
    pub fn with_limit_maxbytes(mut self, limit: u64) -> Self {
        self.limit_maxbytes = limit;
        self
    }

    /// Take a node out of service; requests routed to it fail with `ServerUnavailable`
    pub fn mark_offline(&self, addr: &ServerAddr) -> Result<(), StoreError> {
        self.set_online(addr, false)
    }

    pub fn mark_online(&self, addr: &ServerAddr) -> Result<(), StoreError> {
        self.set_online(addr, true)
    }

    /// Compression metrics from the most recent write
    pub fn get_last_metrics(&self) -> OperationMetrics {
        self.last_metrics
            .lock()
            .map(|m| m.clone())
            .unwrap_or_else(|_| OperationMetrics::new())
    }

    fn set_online(&self, addr: &ServerAddr, online: bool) -> Result<(), StoreError> {
        let nodes = self.read_nodes()?;
        let node = nodes
            .iter()
            .find(|n| &n.addr == addr)
            .ok_or_else(|| StoreError::ServerUnavailable(addr.to_string()))?;
        let mut state = node.lock()?;
        state.online = online;
        state.stats.accepting_conns = online;
        debug!(server = %addr, online, "changed node availability");
        Ok(())
    }

    fn read_nodes(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<Node>>, StoreError> {
        self.nodes
            .read()
            .map_err(|_| StoreError::Backend("server list lock poisoned".into()))
    }

    /// Run `f` against the live node that owns `key`
    fn with_node<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut NodeState, u64) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        validate_key(key)?;
        let nodes = self.read_nodes()?;
        if nodes.is_empty() {
            return Err(StoreError::NoServers);
        }

        let index = (xxh3_64(key.as_bytes()) % nodes.len() as u64) as usize;
        let node = &nodes[index];
        let mut state = node.lock()?;
        if !state.online {
            warn!(server = %node.addr, "request routed to unavailable node");
            return Err(StoreError::ServerUnavailable(node.addr.to_string()));
        }

        let now = (self.clock)();
        f(&mut *state, now)
    }

    fn store(
        &self,
        mode: StoreMode,
        key: &str,
        value: &[u8],
        expiration: Expiration,
        compress: bool,
    ) -> Result<bool, StoreError> {
        let start = Instant::now();
        let (data, compressed) = encode_value(value, compress)?;
        if let Ok(mut metrics) = self.last_metrics.lock() {
            *metrics = OperationMetrics::new().with_compression(
                start.elapsed().as_micros() as u64,
                value.len(),
                data.len(),
            );
        }

        if data.len() > MAX_ITEM_SIZE {
            return Err(StoreError::ValueTooLarge {
                size: data.len(),
                limit: MAX_ITEM_SIZE,
            });
        }

        self.with_node(key, |state, now| {
            state.stats.cmd_set += 1;
            state.stats.bytes_read += value.len() as u64;

            let exists = state.live(key, now);
            let allowed = match mode {
                StoreMode::Set => true,
                StoreMode::Add => !exists,
                StoreMode::Replace => exists,
            };
            if !allowed {
                trace!(key, "store precondition not met");
                return Ok(false);
            }

            state.insert(key, data, compressed, expiration.deadline(now))?;
            trace!(key, size = value.len(), compressed, "stored item");
            Ok(true)
        })
    }

    fn adjust(&self, key: &str, delta: u64, increment: bool) -> Result<Option<u64>, StoreError> {
        self.with_node(key, |state, now| {
            if !state.live(key, now) {
                if increment {
                    state.stats.incr_misses += 1;
                } else {
                    state.stats.decr_misses += 1;
                }
                return Ok(None);
            }

            let (current, expires_at) = match state.items.get(key) {
                Some(item) => (decode_value(item)?, item.expires_at),
                None => return Ok(None),
            };
            let number = std::str::from_utf8(&current)
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok())
                .ok_or_else(|| StoreError::NonNumeric(key.to_string()))?;

            let updated = if increment {
                state.stats.incr_hits += 1;
                number.wrapping_add(delta)
            } else {
                state.stats.decr_hits += 1;
                number.saturating_sub(delta)
            };

            state.insert(key, updated.to_string().into_bytes(), false, expires_at)?;
            Ok(Some(updated))
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let servers = self
            .nodes
            .read()
            .map(|nodes| nodes.iter().map(|n| n.addr.to_string()).collect::<Vec<_>>())
            .unwrap_or_default();
        f.debug_struct("MemoryStore")
            .field("servers", &servers)
            .field("limit_maxbytes", &self.limit_maxbytes)
            .finish()
    }
}

#[cfg(feature = "compression")]
fn encode_value(value: &[u8], compress: bool) -> Result<(Vec<u8>, bool), StoreError> {
    if compress {
        Ok((CompressedEnvelope::pack(value)?, true))
    } else {
        Ok((value.to_vec(), false))
    }
}

// Without compression support the hint is ignored
#[cfg(not(feature = "compression"))]
fn encode_value(value: &[u8], _compress: bool) -> Result<(Vec<u8>, bool), StoreError> {
    Ok((value.to_vec(), false))
}

#[cfg(feature = "compression")]
fn decode_value(item: &Item) -> Result<Vec<u8>, StoreError> {
    if item.compressed {
        Ok(CompressedEnvelope::unpack(&item.data)?)
    } else {
        Ok(item.data.clone())
    }
}

#[cfg(not(feature = "compression"))]
fn decode_value(item: &Item) -> Result<Vec<u8>, StoreError> {
    Ok(item.data.clone())
}

impl CacheStore for MemoryStore {
    fn add_server(&self, addr: &ServerAddr) -> Result<(), StoreError> {
        let mut nodes = self
            .nodes
            .write()
            .map_err(|_| StoreError::Backend("server list lock poisoned".into()))?;
        if nodes.iter().any(|n| &n.addr == addr) {
            debug!(server = %addr, "server already in pool");
            return Ok(());
        }

        let now = (self.clock)();
        nodes.push(Node {
            addr: addr.clone(),
            state: Mutex::new(NodeState::new(now, self.limit_maxbytes)),
        });
        debug!(server = %addr, pool_size = nodes.len(), "added server");
        Ok(())
    }

    fn server_status(&self, addr: &ServerAddr) -> bool {
        let Ok(nodes) = self.read_nodes() else {
            return false;
        };
        nodes
            .iter()
            .find(|n| &n.addr == addr)
            .and_then(|n| n.lock().ok().map(|state| state.online))
            .unwrap_or(false)
    }

    fn put(
        &self,
        key: &str,
        value: &[u8],
        expiration: Expiration,
        compress: bool,
    ) -> Result<bool, StoreError> {
        self.store(StoreMode::Set, key, value, expiration, compress)
    }

    fn add(
        &self,
        key: &str,
        value: &[u8],
        expiration: Expiration,
        compress: bool,
    ) -> Result<bool, StoreError> {
        self.store(StoreMode::Add, key, value, expiration, compress)
    }

    fn replace(
        &self,
        key: &str,
        value: &[u8],
        expiration: Expiration,
        compress: bool,
    ) -> Result<bool, StoreError> {
        self.store(StoreMode::Replace, key, value, expiration, compress)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.with_node(key, |state, now| {
            state.stats.cmd_get += 1;
            if !state.live(key, now) {
                state.stats.get_misses += 1;
                trace!(key, "cache miss");
                return Ok(None);
            }

            let value = match state.items.get(key) {
                Some(item) => decode_value(item)?,
                None => return Ok(None),
            };
            state.stats.get_hits += 1;
            state.stats.bytes_written += value.len() as u64;
            trace!(key, size = value.len(), "cache hit");
            Ok(Some(value))
        })
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.with_node(key, |state, now| {
            if state.live(key, now) {
                state.remove(key);
                state.stats.delete_hits += 1;
                Ok(true)
            } else {
                state.stats.delete_misses += 1;
                Ok(false)
            }
        })
    }

    fn increment(&self, key: &str, delta: u64) -> Result<Option<u64>, StoreError> {
        self.adjust(key, delta, true)
    }

    fn decrement(&self, key: &str, delta: u64) -> Result<Option<u64>, StoreError> {
        self.adjust(key, delta, false)
    }

    fn flush(&self) -> Result<(), StoreError> {
        let nodes = self.read_nodes()?;
        if nodes.is_empty() {
            return Err(StoreError::NoServers);
        }
        for node in nodes.iter() {
            let mut state = node.lock()?;
            if !state.online {
                warn!(server = %node.addr, "skipping flush of unavailable node");
                continue;
            }
            state.items.clear();
            state.stats.bytes = 0;
            state.stats.curr_items = 0;
            state.stats.cmd_flush += 1;
        }
        debug!(servers = nodes.len(), "flushed cache pool");
        Ok(())
    }

    fn statistics(&self) -> Result<BTreeMap<String, ServerStats>, StoreError> {
        let nodes = self.read_nodes()?;
        let now = (self.clock)();
        let mut result = BTreeMap::new();
        for node in nodes.iter() {
            let mut state = node.lock()?;
            // Unreachable servers report nothing, as with a real pool
            if !state.online {
                continue;
            }
            result.insert(node.addr.to_string(), state.snapshot(now));
        }
        Ok(result)
    }
}
