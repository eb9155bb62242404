// concord/core/src/events.rs

use crate::block::Block;
use crate::transaction::Transaction;

/// Where a committed block or accepted transaction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Local,
    Peer,
}

/// Notifications published by the ledger to collaborators and to the network layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    BlockCommitted { block: Block, source: Source },
    TransactionAccepted { transaction: Transaction, source: Source },
    /// The local chain was swapped for a longer one received from a peer.
    ChainReplaced { length: usize },
}
