// concord/core/src/error.rs

use crate::transaction::TxId;
use concord_crypto::Hash;
use thiserror::Error;

/// A transaction was rejected before reaching the mempool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("transaction sender is empty")]
    EmptySender,
    #[error("transaction recipient is empty")]
    EmptyRecipient,
    #[error("transaction amount must be positive")]
    NonPositiveAmount,
    #[error("transaction {0} is already pending")]
    AlreadyPending(TxId),
    #[error("transaction {0} is already committed")]
    AlreadyCommitted(TxId),
}

/// A block or chain failed hash/link validation. The chain is never modified
/// when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainIntegrityError {
    #[error("chain is empty")]
    EmptyChain,
    #[error("block index mismatch: expected {expected}, got {found}")]
    IndexMismatch { expected: u64, found: u64 },
    #[error("block #{index} links to {found}, expected {expected}")]
    PreviousHashMismatch {
        index: u64,
        expected: Hash,
        found: Hash,
    },
    #[error("block #{index} carries hash {stored} but recomputes to {computed}")]
    HashMismatch {
        index: u64,
        stored: Hash,
        computed: Hash,
    },
    #[error("block #{index} re-commits transaction {id}")]
    DuplicateTransaction { index: u64, id: TxId },
    #[error("candidate genesis {found} does not match local genesis {expected}")]
    GenesisMismatch { expected: Hash, found: Hash },
    #[error("candidate chain of length {candidate} is not longer than local length {local}")]
    NotLonger { local: usize, candidate: usize },
    #[error("candidate chain failed validation")]
    InvalidChain,
}

/// Block production or seal verification failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    #[error("{0} is not an elected delegate")]
    NotElected(String),
    #[error("quorum not reached: {yes} yes votes, {quorum} required")]
    QuorumNotReached { yes: usize, quorum: usize },
    #[error("{0} is not eligible to produce this block")]
    Ineligible(String),
    #[error("validator set is empty")]
    EmptyValidatorSet,
    #[error("{0} is already registered")]
    AlreadyRegistered(String),
    #[error("block #{index} seal rejected: {reason}")]
    InvalidSeal { index: u64, reason: String },
    #[error("mining worker failed: {0}")]
    Worker(String),
    #[error(transparent)]
    Integrity(#[from] ChainIntegrityError),
}

/// Cooperative cancellation of a proof-of-work search. Not a failure: a peer
/// produced the block for this index first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningAbort {
    pub index: u64,
    pub nonces_tried: u64,
}
