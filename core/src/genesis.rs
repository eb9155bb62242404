// concord/core/src/genesis.rs

use crate::block::{Block, BlockTemplate, ProducerMetadata};
use concord_crypto::ZERO_HASH;

/// Fixed timestamp so every node derives the same genesis hash: 2024-10-05 18:13:13 UTC.
pub const GENESIS_TIMESTAMP: u64 = 1_728_151_993_000;

/// Returns the fixed genesis block shared by all nodes in the network.
pub fn genesis_block() -> Block {
    BlockTemplate {
        index: 0,
        timestamp: GENESIS_TIMESTAMP,
        transactions: Vec::new(),
        previous_hash: ZERO_HASH.to_string(),
    }
    .seal(ProducerMetadata::Genesis)
}
