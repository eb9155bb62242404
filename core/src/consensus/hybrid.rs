// concord/core/src/consensus/hybrid.rs

use crate::block::{Block, BlockTemplate, ProducerMetadata};
use crate::consensus::pos::ProofOfStake;
use crate::consensus::pow::{kind_mismatch, ProofOfWork};
use crate::consensus::Sealed;
use crate::error::ConsensusError;
use tokio::sync::watch;
use tracing::debug;

/// Stake selection first; producers that are not selected may still mine.
#[derive(Debug)]
pub struct Hybrid {
    stake: ProofOfStake,
    work: ProofOfWork,
}

impl Hybrid {
    pub fn new(stake: ProofOfStake, work: ProofOfWork) -> Self {
        Self { stake, work }
    }

    pub fn stake(&self) -> &ProofOfStake {
        &self.stake
    }

    pub fn work(&self) -> &ProofOfWork {
        &self.work
    }

    pub async fn propose(
        &self,
        producer: &str,
        template: BlockTemplate,
        chain_len: watch::Receiver<usize>,
    ) -> Result<Sealed, ConsensusError> {
        if self.stake.is_eligible(producer, &template.previous_hash).await {
            return Ok(Sealed::Block(template.seal(ProducerMetadata::Stake {
                miner: producer.to_string(),
            })));
        }
        debug!(%producer, index = template.index, "not stake-selected, falling back to work");
        self.work.seal(template, chain_len).await
    }

    pub async fn verify(&self, block: &Block) -> Result<(), ConsensusError> {
        match &block.producer_metadata {
            ProducerMetadata::Stake { .. } => self.stake.verify(block).await,
            ProducerMetadata::Work { .. } => self.work.verify(block),
            other => Err(kind_mismatch(block, other, "stake or work")),
        }
    }
}
