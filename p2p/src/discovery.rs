// concord/p2p/src/discovery.rs

use crate::config::DiscoveryConfig;
use crate::error::NetworkError;
use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DISCOVER_NODE: &[u8] = b"DISCOVER_NODE";
pub const NODE_RESPONSE: &[u8] = b"NODE_RESPONSE";

/// UDP broadcast probing. Addresses found here are unvalidated candidates and never expire.
pub struct Discovery {
    socket: UdpSocket,
    target: SocketAddr,
    interval: Duration,
    nodes: Mutex<BTreeSet<SocketAddr>>,
}

impl Discovery {
    /// Binds the discovery port on all interfaces and enables broadcast.
    pub async fn bind(config: &DiscoveryConfig) -> Result<Self, NetworkError> {
        let ip: IpAddr = config
            .broadcast_address
            .parse()
            .map_err(|_| NetworkError::InvalidAddress(config.broadcast_address.clone()))?;
        let socket = UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], config.port))).await?;
        socket.set_broadcast(true)?;
        info!(port = config.port, "node discovery started");
        Ok(Self::new(
            socket,
            SocketAddr::new(ip, config.port),
            Duration::from_millis(config.interval_ms),
        ))
    }

    pub fn new(socket: UdpSocket, target: SocketAddr, interval: Duration) -> Self {
        Self {
            socket,
            target,
            interval,
            nodes: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        Ok(self.socket.local_addr()?)
    }

    pub async fn discovered_nodes(&self) -> Vec<SocketAddr> {
        self.nodes.lock().await.iter().copied().collect()
    }

    pub async fn probe(&self) -> Result<(), NetworkError> {
        self.socket.send_to(DISCOVER_NODE, self.target).await?;
        debug!(target = %self.target, "discovery probe sent");
        Ok(())
    }

    /// Receives and handles one datagram.
    pub async fn recv_once(&self) -> Result<(), NetworkError> {
        let mut buf = [0u8; 64];
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        self.handle_datagram(&buf[..len], from).await
    }

    async fn handle_datagram(&self, body: &[u8], from: SocketAddr) -> Result<(), NetworkError> {
        if body == DISCOVER_NODE {
            info!(node = %from, "discovery probe received");
            self.nodes.lock().await.insert(from);
            self.socket.send_to(NODE_RESPONSE, from).await?;
        } else if body == NODE_RESPONSE {
            debug!(node = %from, "discovery response received");
            self.nodes.lock().await.insert(from);
        } else {
            debug!(node = %from, len = body.len(), "ignoring unknown discovery datagram");
        }
        Ok(())
    }

    /// Probes every interval and answers incoming probes until the task is aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.probe().await {
                            warn!(error = %e, "error sending discovery probe");
                        }
                    }
                    result = self.recv_once() => {
                        if let Err(e) = result {
                            warn!(error = %e, "error handling discovery datagram");
                        }
                    }
                }
            }
        })
    }
}
