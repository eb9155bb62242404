// concord/p2p/src/error.rs

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Faults on the wire. Each one costs at most the offending peer.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed message: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
    #[error("invalid address {0}")]
    InvalidAddress(String),
    #[error("peer {0} is not connected")]
    PeerUnavailable(SocketAddr),
}
