// concord/p2p/src/config.rs

use crate::message::DEFAULT_MAX_FRAME_BYTES;
use crate::peer::DEFAULT_PEER_QUEUE_DEPTH;
use crate::seen::DEFAULT_SEEN_CAPACITY;
use serde::{Deserialize, Serialize};

/// The `[network]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub listen_address: String,
    pub bootstrap_nodes: Vec<String>,
    pub max_frame_bytes: usize,
    pub peer_queue_depth: usize,
    pub seen_cache_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1:8008".to_string(),
            bootstrap_nodes: Vec::new(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            peer_queue_depth: DEFAULT_PEER_QUEUE_DEPTH,
            seen_cache_capacity: DEFAULT_SEEN_CAPACITY,
        }
    }
}

/// The `[discovery]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    pub port: u16,
    pub broadcast_address: String,
    pub interval_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 6000,
            broadcast_address: "255.255.255.255".to_string(),
            interval_ms: 5_000,
        }
    }
}
