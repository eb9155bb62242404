// concord/core/src/consensus/pos.rs

use crate::block::{Block, BlockTemplate, ProducerMetadata};
use crate::consensus::pow::kind_mismatch;
use crate::consensus::registry::StakeTable;
use crate::consensus::selection::{select_proposer, LeaderSelection};
use crate::error::ConsensusError;
use crate::transaction::Address;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Stake-weighted producer eligibility.
#[derive(Debug)]
pub struct ProofOfStake {
    stakes: RwLock<StakeTable>,
    selection: LeaderSelection,
}

impl ProofOfStake {
    pub fn new(stakes: StakeTable, selection: LeaderSelection) -> Self {
        Self {
            stakes: RwLock::new(stakes),
            selection,
        }
    }

    pub fn selection(&self) -> LeaderSelection {
        self.selection
    }

    /// Adds a staker or updates its stake.
    pub async fn register_stake(&self, address: impl Into<Address>, stake: u64) {
        let address = address.into();
        info!(%address, stake, "stake registered");
        self.stakes.write().await.register(address, stake);
    }

    pub async fn snapshot(&self) -> StakeTable {
        self.stakes.read().await.clone()
    }

    pub async fn is_eligible(&self, producer: &str, parent_hash: &str) -> bool {
        let stakes = self.snapshot().await;
        self.selection.is_eligible(producer, parent_hash, &stakes)
    }

    pub async fn propose(
        &self,
        producer: &str,
        template: BlockTemplate,
    ) -> Result<Block, ConsensusError> {
        if !self.is_eligible(producer, &template.previous_hash).await {
            debug!(%producer, index = template.index, "not selected by stake");
            return Err(ConsensusError::Ineligible(producer.to_string()));
        }
        Ok(template.seal(ProducerMetadata::Stake {
            miner: producer.to_string(),
        }))
    }

    /// Checks that the block's miner could have been selected for its parent.
    pub async fn verify(&self, block: &Block) -> Result<(), ConsensusError> {
        let miner = match &block.producer_metadata {
            ProducerMetadata::Stake { miner } => miner,
            other => return Err(kind_mismatch(block, other, "stake")),
        };
        let stakes = self.snapshot().await;
        let valid = match self.selection {
            LeaderSelection::SeededByParent => {
                select_proposer(&block.previous_hash, &stakes).as_deref() == Some(miner.as_str())
            }
            // A local draw cannot be replayed; the best check is that the miner stakes.
            LeaderSelection::LocalDraw => stakes.stake_of(miner) > 0,
        };
        if valid {
            Ok(())
        } else {
            Err(ConsensusError::InvalidSeal {
                index: block.index,
                reason: format!("{miner} was not the stake-selected producer"),
            })
        }
    }
}
