// concord/core/src/consensus/pow.rs

use crate::block::{hash_with_metadata, Block, BlockTemplate, ProducerMetadata};
use crate::consensus::Sealed;
use crate::error::{ConsensusError, MiningAbort};
use concord_crypto::meets_difficulty;
use tokio::sync::watch;
use tracing::{debug, info};

/// How many nonces are tried between checks of the chain-length watch.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Proof-of-work: a hash is valid when its hex form starts with `difficulty` zeros.
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    difficulty: u32,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> Self {
        Self { difficulty }
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Mines `template` on a blocking worker so peer traffic keeps flowing.
    ///
    /// `chain_len` carries the local chain length; once it passes the
    /// template's index a peer's block has won the race and the search stops.
    pub async fn seal(
        &self,
        template: BlockTemplate,
        chain_len: watch::Receiver<usize>,
    ) -> Result<Sealed, ConsensusError> {
        let difficulty = self.difficulty;
        let index = template.index;
        info!(index, difficulty, "mining block");

        let outcome = tokio::task::spawn_blocking(move || mine(template, difficulty, &chain_len))
            .await
            .map_err(|e| ConsensusError::Worker(e.to_string()))?;

        match outcome {
            Ok(block) => {
                info!(index, hash = %block.hash, "block mined");
                Ok(Sealed::Block(block))
            }
            Err(abort) => {
                info!(
                    index,
                    tried = abort.nonces_tried,
                    "mining aborted, block already accepted from a peer"
                );
                Ok(Sealed::Aborted(abort))
            }
        }
    }

    pub fn verify(&self, block: &Block) -> Result<(), ConsensusError> {
        match &block.producer_metadata {
            ProducerMetadata::Work { .. } if meets_difficulty(&block.hash, self.difficulty) => {
                Ok(())
            }
            ProducerMetadata::Work { .. } => Err(ConsensusError::InvalidSeal {
                index: block.index,
                reason: format!("hash does not meet difficulty {}", self.difficulty),
            }),
            other => Err(kind_mismatch(block, other, "work")),
        }
    }
}

/// Searches the nonce space until the difficulty is met or the index is taken.
pub fn mine(
    template: BlockTemplate,
    difficulty: u32,
    chain_len: &watch::Receiver<usize>,
) -> Result<Block, MiningAbort> {
    let index = template.index;
    let prefix = template.preimage_prefix();

    for nonce in 0..u64::MAX {
        if nonce % CANCEL_CHECK_INTERVAL == 0 && *chain_len.borrow() > index as usize {
            return Err(MiningAbort {
                index,
                nonces_tried: nonce,
            });
        }
        let metadata = ProducerMetadata::Work { nonce, difficulty };
        if meets_difficulty(&hash_with_metadata(&prefix, &metadata), difficulty) {
            debug!(index, nonce, "nonce found");
            return Ok(template.seal(metadata));
        }
    }

    Err(MiningAbort {
        index,
        nonces_tried: u64::MAX,
    })
}

pub(crate) fn kind_mismatch(
    block: &Block,
    found: &ProducerMetadata,
    expected: &str,
) -> ConsensusError {
    ConsensusError::InvalidSeal {
        index: block.index,
        reason: format!("expected {expected} metadata, found {found:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::genesis_block;
    use crate::transaction::Transaction;

    fn template() -> BlockTemplate {
        BlockTemplate::extending(&genesis_block(), vec![Transaction::new("alice", "bob", 4)])
    }

    #[test]
    fn mined_block_meets_difficulty_and_rehashes() {
        let (_tx, rx) = watch::channel(1usize);
        let block = mine(template(), 2, &rx).unwrap();

        assert!(block.hash.starts_with("00"));
        assert_eq!(block.calculate_hash(), block.hash);
        assert!(matches!(block.producer_metadata, ProducerMetadata::Work { difficulty: 2, .. }));
        assert!(ProofOfWork::new(2).verify(&block).is_ok());
    }

    #[test]
    fn mining_aborts_when_index_already_filled() {
        let (_tx, rx) = watch::channel(2usize);
        let abort = mine(template(), 64, &rx).unwrap_err();
        assert_eq!(abort.index, 1);
        assert_eq!(abort.nonces_tried, 0);
    }

    #[test]
    fn verify_rejects_insufficient_work() {
        let (_tx, rx) = watch::channel(1usize);
        let block = mine(template(), 1, &rx).unwrap();
        let strict = ProofOfWork::new(64);
        assert!(matches!(strict.verify(&block), Err(ConsensusError::InvalidSeal { .. })));
    }

    #[test]
    fn verify_rejects_other_metadata_kinds() {
        let block = template().seal(ProducerMetadata::Stake { miner: "alice".into() });
        assert!(ProofOfWork::new(0).verify(&block).is_err());
    }

    #[tokio::test]
    async fn seal_aborts_when_peer_block_lands() {
        let (tx, rx) = watch::channel(1usize);
        let pow = ProofOfWork::new(64);
        let mining = tokio::spawn(async move { pow.seal(template(), rx).await });

        tx.send(2).unwrap();
        let sealed = mining.await.unwrap().unwrap();
        assert!(matches!(sealed, Sealed::Aborted(MiningAbort { index: 1, .. })));
    }
}
