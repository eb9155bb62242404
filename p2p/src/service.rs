// concord/p2p/src/service.rs

use crate::config::NetworkConfig;
use crate::error::NetworkError;
use crate::message::{read_frame, write_frame, P2pMessage};
use crate::peer::{PeerLink, PeerRegistry};
use crate::seen::Seen;
use crate::sync::{ChainSynchronizer, Reaction};
use concord_core::{LedgerEvent, LedgerService, Source};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::select;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// TCP gossip between nodes: one reader and one writer task per peer.
#[derive(Clone)]
pub struct P2pService {
    peers: PeerRegistry,
    synchronizer: Arc<ChainSynchronizer>,
    config: Arc<NetworkConfig>,
}

impl P2pService {
    pub fn new(ledger: LedgerService, config: NetworkConfig) -> Self {
        Self {
            peers: PeerRegistry::new(),
            synchronizer: Arc::new(ChainSynchronizer::new(ledger, config.seen_cache_capacity)),
            config: Arc::new(config),
        }
    }

    pub fn ledger(&self) -> &LedgerService {
        self.synchronizer.ledger()
    }

    pub async fn peers(&self) -> Vec<SocketAddr> {
        self.peers.addresses().await
    }

    /// Binds `address` and accepts peers in the background. Returns the bound address.
    pub async fn listen(
        &self,
        address: &str,
    ) -> Result<(SocketAddr, JoinHandle<()>), NetworkError> {
        let listener = TcpListener::bind(address).await?;
        let local = listener.local_addr()?;
        info!(address = %local, "p2p service listening");

        let service = self.clone();
        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((socket, addr)) => {
                        info!(peer = %addr, "new peer connected via listener");
                        service.attach(socket, addr).await;
                    }
                    Err(e) => error!(error = %e, "error accepting peer"),
                }
            }
        });
        Ok((local, task))
    }

    /// Dials `address`, registers the peer and asks it for its chain.
    pub async fn connect(&self, address: &str) -> Result<SocketAddr, NetworkError> {
        let socket = TcpStream::connect(address).await?;
        let addr = socket.peer_addr()?;
        info!(peer = %addr, "connected to peer");
        self.attach(socket, addr).await;
        self.peers.send_to(addr, P2pMessage::RequestChain).await?;
        Ok(addr)
    }

    /// Dials every address, logging the ones that fail.
    pub async fn connect_all(&self, addresses: &[String]) {
        for address in addresses {
            if let Err(e) = self.connect(address).await {
                warn!(peer = %address, error = %e, "failed to connect to bootstrap node");
            }
        }
    }

    /// Closes the connection to `addr`. Safe to call for unknown or already closed peers.
    pub async fn disconnect(&self, addr: SocketAddr) -> bool {
        let removed = self.peers.remove(addr).await;
        if removed {
            info!(peer = %addr, "peer disconnected");
        }
        removed
    }

    pub async fn broadcast(&self, message: &P2pMessage) -> usize {
        self.peers.broadcast(message, None).await
    }

    /// Forwards locally produced blocks and locally submitted transactions to every peer.
    /// Items that arrived from peers are relayed by the synchronizer instead.
    pub fn spawn_event_relay(&self) -> JoinHandle<()> {
        let mut events = self.ledger().subscribe();
        let service = self.clone();
        tokio::spawn(async move {
            loop {
                let message = match events.recv().await {
                    Ok(LedgerEvent::BlockCommitted { block, source: Source::Local }) => {
                        service.synchronizer.mark_seen(Seen::Block(block.hash.clone())).await;
                        P2pMessage::Block(block)
                    }
                    Ok(LedgerEvent::TransactionAccepted { transaction, source: Source::Local }) => {
                        service.synchronizer.mark_seen(Seen::Transaction(transaction.id)).await;
                        P2pMessage::Transaction(transaction)
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event relay lagged behind the ledger");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let delivered = service.broadcast(&message).await;
                debug!(kind = message.kind(), delivered, "broadcast local item");
            }
        })
    }

    async fn attach(&self, socket: TcpStream, addr: SocketAddr) {
        let PeerLink { outbound, closed } =
            self.peers.register(addr, self.config.peer_queue_depth).await;
        let (reader, writer) = socket.into_split();
        tokio::spawn(self.clone().write_loop(addr, writer, outbound));
        tokio::spawn(self.clone().read_loop(addr, reader, closed));
    }

    async fn write_loop(
        self,
        addr: SocketAddr,
        mut writer: OwnedWriteHalf,
        mut outbound: tokio::sync::mpsc::Receiver<P2pMessage>,
    ) {
        while let Some(message) = outbound.recv().await {
            if let Err(e) = write_frame(&mut writer, &message, self.config.max_frame_bytes).await {
                warn!(peer = %addr, error = %e, "error writing to peer");
                self.disconnect(addr).await;
                break;
            }
        }
    }

    async fn read_loop(
        self,
        addr: SocketAddr,
        mut reader: OwnedReadHalf,
        mut closed: tokio::sync::oneshot::Receiver<()>,
    ) {
        loop {
            let frame = select! {
                _ = &mut closed => break,
                frame = read_frame(&mut reader, self.config.max_frame_bytes) => frame,
            };
            let message = match frame {
                Ok(Some(message)) => message,
                Ok(None) => {
                    info!(peer = %addr, "peer closed the connection");
                    break;
                }
                Err(e) => {
                    warn!(peer = %addr, error = %e, "dropping peer after bad frame");
                    break;
                }
            };

            debug!(peer = %addr, kind = message.kind(), "message received");
            match self.synchronizer.handle(message).await {
                Reaction::Ignore => {}
                Reaction::Reply(reply) => {
                    if let Err(e) = self.peers.send_to(addr, reply).await {
                        warn!(peer = %addr, error = %e, "could not reply to peer");
                    }
                }
                Reaction::Relay(message) => {
                    self.peers.broadcast(&message, Some(addr)).await;
                }
            }
        }
        self.disconnect(addr).await;
    }
}
