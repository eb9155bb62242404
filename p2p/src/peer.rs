// concord/p2p/src/peer.rs

use crate::error::NetworkError;
use crate::message::P2pMessage;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

pub const DEFAULT_PEER_QUEUE_DEPTH: usize = 256;

struct PeerHandle {
    outbound: mpsc::Sender<P2pMessage>,
    // Dropping this tells the connection's reader to stop.
    _close: oneshot::Sender<()>,
}

/// The receiving ends a connection task needs once its peer is registered.
pub struct PeerLink {
    pub outbound: mpsc::Receiver<P2pMessage>,
    pub closed: oneshot::Receiver<()>,
}

/// Live connections keyed by remote address. Each peer has its own bounded
/// outbound queue, so a slow peer only loses its own messages.
#[derive(Clone, Default)]
pub struct PeerRegistry {
    peers: Arc<Mutex<HashMap<SocketAddr, PeerHandle>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a peer, replacing any previous connection from the same address.
    pub async fn register(&self, addr: SocketAddr, queue_depth: usize) -> PeerLink {
        let (outbound_tx, outbound_rx) = mpsc::channel(queue_depth.max(1));
        let (close_tx, close_rx) = oneshot::channel();
        let handle = PeerHandle {
            outbound: outbound_tx,
            _close: close_tx,
        };
        if self.peers.lock().await.insert(addr, handle).is_some() {
            debug!(peer = %addr, "replaced existing connection");
        }
        PeerLink {
            outbound: outbound_rx,
            closed: close_rx,
        }
    }

    /// Forgets the peer and closes its connection. Unknown addresses are a no-op.
    pub async fn remove(&self, addr: SocketAddr) -> bool {
        self.peers.lock().await.remove(&addr).is_some()
    }

    pub async fn send_to(&self, addr: SocketAddr, message: P2pMessage) -> Result<(), NetworkError> {
        let mut peers = self.peers.lock().await;
        let peer = peers.get(&addr).ok_or(NetworkError::PeerUnavailable(addr))?;
        match peer.outbound.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(message)) => {
                warn!(peer = %addr, kind = message.kind(), "outbound queue full, dropping message");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => {
                peers.remove(&addr);
                Err(NetworkError::PeerUnavailable(addr))
            }
        }
    }

    /// Queues `message` for every live peer except `except`; returns how many took it.
    pub async fn broadcast(&self, message: &P2pMessage, except: Option<SocketAddr>) -> usize {
        let mut peers = self.peers.lock().await;
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (addr, peer) in peers.iter() {
            if Some(*addr) == except {
                continue;
            }
            match peer.outbound.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        peer = %addr,
                        kind = message.kind(),
                        "outbound queue full, dropping message"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*addr),
            }
        }

        for addr in closed {
            debug!(peer = %addr, "dropping closed peer");
            peers.remove(&addr);
        }
        delivered
    }

    pub async fn addresses(&self) -> Vec<SocketAddr> {
        self.peers.lock().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.peers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.lock().await.is_empty()
    }
}
