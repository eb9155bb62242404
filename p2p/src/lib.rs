// concord/p2p/src/lib.rs

//! Peer-to-peer layer for Concord nodes.
//!
//! Peers exchange length-prefixed JSON envelopes over TCP. Transactions and
//! blocks are gossiped once per node thanks to a bounded recently-seen cache,
//! and divergent chains are reconciled by requesting the peer's full chain and
//! keeping the longest valid one.

pub mod config;
pub mod discovery;
pub mod error;
pub mod message;
pub mod peer;
pub mod seen;
pub mod service;
pub mod sync;

pub use config::{DiscoveryConfig, NetworkConfig};
pub use discovery::Discovery;
pub use error::NetworkError;
pub use message::P2pMessage;
pub use peer::PeerRegistry;
pub use service::P2pService;
pub use sync::{ChainSynchronizer, Reaction};
