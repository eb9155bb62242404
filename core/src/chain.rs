// concord/core/src/chain.rs

use crate::block::Block;
use crate::consensus::validator;
use crate::error::ChainIntegrityError;
use crate::genesis::genesis_block;
use crate::transaction::TxId;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// The shared, serialized-access handle to the chain.
pub type AppState = Arc<Mutex<Blockchain>>;

/// The append-only chain of blocks, starting at the genesis block.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    committed: HashSet<TxId>,
}

impl Blockchain {
    /// Creates a chain holding only the genesis block.
    pub fn new() -> Self {
        Self {
            blocks: vec![genesis_block()],
            committed: HashSet::new(),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: a chain holds at least its genesis block.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn last_block(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn contains_transaction(&self, id: &TxId) -> bool {
        self.committed.contains(id)
    }

    /// Appends `candidate` if it links to the current tip and its hash recomputes.
    pub fn append_block(&mut self, candidate: Block) -> Result<(), ChainIntegrityError> {
        validator::validate_block(&candidate, self.last_block())?;

        let mut in_block = HashSet::with_capacity(candidate.transactions.len());
        for tx in &candidate.transactions {
            if self.committed.contains(&tx.id) || !in_block.insert(tx.id) {
                return Err(ChainIntegrityError::DuplicateTransaction {
                    index: candidate.index,
                    id: tx.id,
                });
            }
        }

        self.committed.extend(in_block);
        debug!(index = candidate.index, hash = %candidate.hash, "block appended");
        self.blocks.push(candidate);
        Ok(())
    }

    /// Validates linkage and hashes of a whole chain. The genesis block is trusted.
    pub fn validate_chain(chain: &[Block]) -> bool {
        match Self::check_chain(chain) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "chain failed validation");
                false
            }
        }
    }

    /// Like [`Blockchain::validate_chain`], reporting the first violation.
    pub fn check_chain(chain: &[Block]) -> Result<(), ChainIntegrityError> {
        if chain.is_empty() {
            return Err(ChainIntegrityError::EmptyChain);
        }
        let mut seen = HashSet::new();
        for pair in chain.windows(2) {
            let (prev, current) = (&pair[0], &pair[1]);
            validator::validate_block(current, prev)?;
            for tx in &current.transactions {
                if !seen.insert(tx.id) {
                    return Err(ChainIntegrityError::DuplicateTransaction {
                        index: current.index,
                        id: tx.id,
                    });
                }
            }
        }
        Ok(())
    }

    /// Adopts `candidate` only if it is strictly longer, shares our genesis and
    /// validates end to end. On any rejection the local chain is untouched.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<(), ChainIntegrityError> {
        if candidate.len() <= self.blocks.len() {
            return Err(ChainIntegrityError::NotLonger {
                local: self.blocks.len(),
                candidate: candidate.len(),
            });
        }

        let local_genesis = &self.genesis().hash;
        if candidate[0].hash != *local_genesis {
            warn!("genesis blocks don't match, refusing to sync");
            return Err(ChainIntegrityError::GenesisMismatch {
                expected: local_genesis.clone(),
                found: candidate[0].hash.clone(),
            });
        }

        Self::check_chain(&candidate)?;

        info!(
            local = self.blocks.len(),
            candidate = candidate.len(),
            "replacing local chain with longer valid chain"
        );
        self.committed = candidate
            .iter()
            .flat_map(|b| b.transactions.iter().map(|tx| tx.id))
            .collect();
        self.blocks = candidate;
        Ok(())
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockTemplate, ProducerMetadata};
    use crate::transaction::Transaction;

    fn next_block(chain: &Blockchain, txs: Vec<Transaction>) -> Block {
        BlockTemplate::extending(chain.last_block(), txs)
            .seal(ProducerMetadata::Stake { miner: "alice".into() })
    }

    fn chain_of(len: usize) -> Blockchain {
        let mut chain = Blockchain::new();
        while chain.len() < len {
            let block = next_block(&chain, vec![Transaction::new("alice", "bob", 1)]);
            chain.append_block(block).unwrap();
        }
        chain
    }

    #[test]
    fn new_chain_starts_at_genesis() {
        let chain = Blockchain::new();
        assert_eq!(chain.len(), 1);
        assert!(!chain.is_empty());
        assert_eq!(chain.last_block().index, 0);
    }

    #[test]
    fn appended_blocks_link_to_their_predecessor() {
        let chain = chain_of(4);
        for pair in chain.blocks().windows(2) {
            assert_eq!(pair[1].previous_hash, pair[0].hash);
        }
        assert!(Blockchain::validate_chain(chain.blocks()));
    }

    #[test]
    fn failed_append_leaves_chain_unmodified() {
        let mut chain = chain_of(2);
        let mut bad = next_block(&chain, vec![Transaction::new("alice", "bob", 1)]);
        bad.previous_hash = "f".repeat(64);
        let before = chain.blocks().to_vec();

        assert!(chain.append_block(bad).is_err());
        assert_eq!(chain.blocks(), before.as_slice());
    }

    #[test]
    fn append_rejects_recommitted_transaction() {
        let mut chain = Blockchain::new();
        let tx = Transaction::new("alice", "bob", 3);
        chain.append_block(next_block(&chain, vec![tx.clone()])).unwrap();

        let replay = next_block(&chain, vec![tx.clone()]);
        assert_eq!(
            chain.append_block(replay),
            Err(ChainIntegrityError::DuplicateTransaction { index: 2, id: tx.id })
        );
        assert!(chain.contains_transaction(&tx.id));
    }

    #[test]
    fn tampering_with_a_committed_transaction_invalidates_the_chain() {
        let chain = chain_of(3);
        let mut blocks = chain.blocks().to_vec();
        blocks[1].transactions[0].amount = 1_000_000;
        assert!(!Blockchain::validate_chain(&blocks));
    }

    #[test]
    fn empty_chain_is_invalid() {
        assert!(!Blockchain::validate_chain(&[]));
    }

    #[test]
    fn longer_valid_chain_replaces_shorter() {
        let mut local = chain_of(3);
        let remote = chain_of(5);
        local.replace_chain(remote.blocks().to_vec()).unwrap();
        assert_eq!(local.len(), 5);
        assert_eq!(local.blocks(), remote.blocks());
        for tx in remote.blocks().iter().flat_map(|b| &b.transactions) {
            assert!(local.contains_transaction(&tx.id));
        }
    }

    #[test]
    fn shorter_or_equal_chain_never_replaces() {
        let mut local = chain_of(5);
        let snapshot = local.blocks().to_vec();

        assert!(matches!(
            local.replace_chain(chain_of(3).blocks().to_vec()),
            Err(ChainIntegrityError::NotLonger { local: 5, candidate: 3 })
        ));
        assert!(matches!(
            local.replace_chain(chain_of(5).blocks().to_vec()),
            Err(ChainIntegrityError::NotLonger { .. })
        ));
        assert_eq!(local.blocks(), snapshot.as_slice());
    }

    #[test]
    fn longer_but_invalid_chain_is_rejected() {
        let mut local = chain_of(3);
        let mut remote = chain_of(5).blocks().to_vec();
        remote[3].transactions[0].amount += 1;

        assert!(local.replace_chain(remote).is_err());
        assert_eq!(local.len(), 3);
    }

    #[test]
    fn chain_with_foreign_genesis_is_rejected() {
        let mut local = chain_of(2);
        let mut remote = chain_of(4).blocks().to_vec();
        remote[0].timestamp += 1;
        remote[0].hash = remote[0].calculate_hash();

        assert!(matches!(
            local.replace_chain(remote),
            Err(ChainIntegrityError::GenesisMismatch { .. })
        ));
    }
}
