// concord/p2p/src/sync.rs

use crate::message::P2pMessage;
use crate::seen::{Seen, SeenCache};
use concord_core::{
    Block, BlockOutcome, ChainIntegrityError, ConsensusError, LedgerService, Transaction,
    ValidationError,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// What the connection task should do after a message is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    Ignore,
    /// Answer the sender only.
    Reply(P2pMessage),
    /// Forward to every peer except the sender.
    Relay(P2pMessage),
}

/// Applies peer messages to the ledger. "Longest valid chain wins."
pub struct ChainSynchronizer {
    ledger: LedgerService,
    seen: Mutex<SeenCache>,
}

impl ChainSynchronizer {
    pub fn new(ledger: LedgerService, seen_capacity: usize) -> Self {
        Self {
            ledger,
            seen: Mutex::new(SeenCache::new(seen_capacity)),
        }
    }

    pub fn ledger(&self) -> &LedgerService {
        &self.ledger
    }

    /// Records `item` as gossiped; false if it already was.
    pub async fn mark_seen(&self, item: Seen) -> bool {
        self.seen.lock().await.insert(item)
    }

    pub async fn handle(&self, message: P2pMessage) -> Reaction {
        match message {
            P2pMessage::Transaction(tx) => self.on_transaction(tx).await,
            P2pMessage::Block(block) => self.on_block(block).await,
            P2pMessage::RequestChain => {
                Reaction::Reply(P2pMessage::ResponseChain(self.ledger.get_chain().await))
            }
            P2pMessage::ResponseChain(chain) => {
                self.on_chain(chain).await;
                Reaction::Ignore
            }
        }
    }

    async fn already_seen(&self, item: &Seen) -> bool {
        self.seen.lock().await.contains(item)
    }

    // Items are marked seen only once the ledger has taken them, so a forged
    // copy sharing an id cannot shadow the real one.
    async fn on_transaction(&self, tx: Transaction) -> Reaction {
        let key = Seen::Transaction(tx.id);
        if self.already_seen(&key).await {
            return Reaction::Ignore;
        }
        match self.ledger.accept_remote_transaction(tx.clone()).await {
            Ok(()) => {
                self.mark_seen(key).await;
                Reaction::Relay(P2pMessage::Transaction(tx))
            }
            Err(ValidationError::AlreadyPending(_) | ValidationError::AlreadyCommitted(_)) => {
                debug!(id = %tx.id, "transaction already known");
                Reaction::Ignore
            }
            Err(e) => {
                warn!(id = %tx.id, error = %e, "dropping invalid transaction");
                Reaction::Ignore
            }
        }
    }

    async fn on_block(&self, block: Block) -> Reaction {
        // Keyed on the recomputed hash; the claimed one is the sender's word.
        let key = Seen::Block(block.calculate_hash());
        if self.already_seen(&key).await {
            return Reaction::Ignore;
        }
        let index = block.index;
        let outcome = self.ledger.accept_block(block.clone()).await;
        let local_len = self.ledger.chain_len().await;
        match outcome {
            Ok(BlockOutcome::Appended) => {
                self.mark_seen(key).await;
                info!(index, hash = %block.hash, "block received from peer");
                Reaction::Relay(P2pMessage::Block(block))
            }
            Ok(BlockOutcome::Stale) => {
                debug!(index, "block at an existing height, ignoring");
                Reaction::Ignore
            }
            Err(ConsensusError::Integrity(e)) if index as usize >= local_len => {
                // The sender is at least as far ahead as this block; fetch its whole chain.
                info!(index, error = %e, "block does not extend our tip, requesting chain");
                Reaction::Reply(P2pMessage::RequestChain)
            }
            Err(e) => {
                warn!(index, error = %e, "dropping invalid block");
                Reaction::Ignore
            }
        }
    }

    async fn on_chain(&self, chain: Vec<Block>) {
        let candidate = chain.len();
        match self.ledger.replace_chain(chain).await {
            Ok(()) => info!(length = candidate, "adopted longer chain from peer"),
            Err(ChainIntegrityError::NotLonger { local, candidate }) => {
                debug!(local, candidate, "received chain is not longer, ignoring");
            }
            Err(e) => warn!(error = %e, "received chain rejected"),
        }
    }
}
