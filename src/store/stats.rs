//! Per-server statistics in the shape memcached's `stats` command reports them

use serde::{Deserialize, Serialize};

/// One server's `stats` snapshot
///
/// Fields a backend does not report stay at their zero default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerStats {
    pub pid: u32,
    /// Seconds since the server started
    pub uptime: u64,
    /// Server's current Unix time
    pub time: u64,
    pub version: String,
    pub pointer_size: u32,
    /// Accumulated user CPU seconds
    pub rusage_user: f64,
    /// Accumulated system CPU seconds
    pub rusage_system: f64,

    pub curr_items: u64,
    pub total_items: u64,
    /// Bytes currently used for item storage
    pub bytes: u64,

    pub curr_connections: u64,
    pub total_connections: u64,
    pub connection_structures: u64,

    pub cmd_get: u64,
    pub cmd_set: u64,
    pub cmd_flush: u64,
    pub get_hits: u64,
    pub get_misses: u64,
    pub delete_hits: u64,
    pub delete_misses: u64,
    pub incr_hits: u64,
    pub incr_misses: u64,
    pub decr_hits: u64,
    pub decr_misses: u64,
    pub cas_hits: u64,
    pub cas_misses: u64,
    pub cas_badval: u64,

    /// Valid items removed to free memory for new ones
    pub evictions: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    /// Memory the server may use for storage
    pub limit_maxbytes: u64,
    pub threads: u32,
    pub conn_yields: u64,
    pub listen_disabled_num: u64,
    pub accepting_conns: bool,
}

impl ServerStats {
    /// Fraction of `get` requests that hit, 0.0 when there were none
    pub fn hit_ratio(&self) -> f64 {
        if self.cmd_get == 0 {
            return 0.0;
        }
        self.get_hits as f64 / self.cmd_get as f64
    }

    /// Fraction of `limit_maxbytes` in use, 0.0 when unlimited or unknown
    pub fn fill_ratio(&self) -> f64 {
        if self.limit_maxbytes == 0 {
            return 0.0;
        }
        self.bytes as f64 / self.limit_maxbytes as f64
    }
}
