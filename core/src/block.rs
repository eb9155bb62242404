// concord/core/src/block.rs

use crate::transaction::{current_timestamp, Address, Transaction};
use concord_crypto::{sha256_hex, Hash};
use serde::{Deserialize, Serialize};

/// How a block earned its place in the chain. Covered by the block hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProducerMetadata {
    Genesis,
    /// Proof-of-work: the nonce that satisfied `difficulty`.
    Work { nonce: u64, difficulty: u32 },
    /// Stake-weighted selection picked `miner`.
    Stake { miner: Address },
    /// `miner` was an elected delegate at production time.
    Delegate { miner: Address },
    /// Vote tally collected from the validator set.
    Quorum {
        proposer: Address,
        yes: usize,
        no: usize,
    },
}

impl ProducerMetadata {
    /// The address credited with producing the block, if any.
    pub fn producer(&self) -> Option<&str> {
        match self {
            ProducerMetadata::Genesis | ProducerMetadata::Work { .. } => None,
            ProducerMetadata::Stake { miner } | ProducerMetadata::Delegate { miner } => Some(miner),
            ProducerMetadata::Quorum { proposer, .. } => Some(proposer),
        }
    }
}

/// A committed block. Any field change invalidates `hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: Hash,
    pub hash: Hash,
    pub producer_metadata: ProducerMetadata,
}

impl Block {
    /// Recomputes the hash from the block's fields.
    pub fn calculate_hash(&self) -> Hash {
        let prefix = preimage_prefix(
            self.index,
            self.timestamp,
            &self.transactions,
            &self.previous_hash,
        );
        hash_with_metadata(&prefix, &self.producer_metadata)
    }

    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }
}

/// Everything about a block except how it was sealed.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: Hash,
}

impl BlockTemplate {
    /// A candidate extending `parent`, stamped now.
    pub fn extending(parent: &Block, transactions: Vec<Transaction>) -> Self {
        Self {
            index: parent.index + 1,
            timestamp: current_timestamp(),
            transactions,
            previous_hash: parent.hash.clone(),
        }
    }

    /// The part of the hash preimage that does not depend on the metadata.
    /// Proof-of-work computes this once and varies only the nonce.
    pub fn preimage_prefix(&self) -> String {
        preimage_prefix(
            self.index,
            self.timestamp,
            &self.transactions,
            &self.previous_hash,
        )
    }

    pub fn seal(self, producer_metadata: ProducerMetadata) -> Block {
        let hash = hash_with_metadata(&self.preimage_prefix(), &producer_metadata);
        Block {
            index: self.index,
            timestamp: self.timestamp,
            transactions: self.transactions,
            previous_hash: self.previous_hash,
            hash,
            producer_metadata,
        }
    }
}

/// `index ‖ timestamp ‖ json(transactions) ‖ previous_hash`
pub fn preimage_prefix(
    index: u64,
    timestamp: u64,
    transactions: &[Transaction],
    previous_hash: &str,
) -> String {
    let txs = serde_json::to_string(transactions).unwrap_or_default();
    format!("{}{}{}{}", index, timestamp, txs, previous_hash)
}

/// Completes the preimage with `json(metadata)` and hashes it.
pub fn hash_with_metadata(prefix: &str, metadata: &ProducerMetadata) -> Hash {
    let meta = serde_json::to_string(metadata).unwrap_or_default();
    let mut preimage = String::with_capacity(prefix.len() + meta.len());
    preimage.push_str(prefix);
    preimage.push_str(&meta);
    sha256_hex(preimage.as_bytes())
}
