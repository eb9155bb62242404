// concord/core/src/consensus/dpos.rs

use crate::block::{Block, BlockTemplate, ProducerMetadata};
use crate::consensus::pow::kind_mismatch;
use crate::consensus::registry::StakeTable;
use crate::error::ConsensusError;
use crate::transaction::Address;
use tokio::sync::RwLock;
use tracing::info;

pub const DEFAULT_DELEGATE_COUNT: usize = 10;

#[derive(Debug, Default)]
struct DelegateState {
    stakes: StakeTable,
    elected: Vec<Address>,
}

/// Only the top `delegate_count` stakers, as of the last election, may produce.
#[derive(Debug)]
pub struct DelegatedProofOfStake {
    delegate_count: usize,
    state: RwLock<DelegateState>,
}

impl DelegatedProofOfStake {
    /// Builds the registry and runs an initial election.
    pub fn new(delegate_count: usize, stakes: StakeTable) -> Self {
        let elected = elect(&stakes, delegate_count);
        Self {
            delegate_count,
            state: RwLock::new(DelegateState { stakes, elected }),
        }
    }

    pub fn delegate_count(&self) -> usize {
        self.delegate_count
    }

    /// Registers a candidate delegate. Takes effect at the next election.
    pub async fn register_delegate(
        &self,
        address: impl Into<Address>,
        stake: u64,
    ) -> Result<(), ConsensusError> {
        let address = address.into();
        self.state.write().await.stakes.register_new(address.clone(), stake)?;
        info!(%address, stake, "delegate registered");
        Ok(())
    }

    /// Ranks the stake table and keeps the top `delegate_count` addresses.
    pub async fn elect_delegates(&self) -> Vec<Address> {
        let mut state = self.state.write().await;
        state.elected = elect(&state.stakes, self.delegate_count);
        info!(elected = ?state.elected, "delegates elected");
        state.elected.clone()
    }

    pub async fn elected_delegates(&self) -> Vec<Address> {
        self.state.read().await.elected.clone()
    }

    pub async fn propose(
        &self,
        producer: &str,
        template: BlockTemplate,
    ) -> Result<Block, ConsensusError> {
        let elected = self.elected_delegates().await;
        if !elected.iter().any(|d| d == producer) {
            return Err(ConsensusError::NotElected(producer.to_string()));
        }
        Ok(template.seal(ProducerMetadata::Delegate {
            miner: producer.to_string(),
        }))
    }

    pub async fn verify(&self, block: &Block) -> Result<(), ConsensusError> {
        match &block.producer_metadata {
            ProducerMetadata::Delegate { miner } => {
                if self.elected_delegates().await.contains(miner) {
                    Ok(())
                } else {
                    Err(ConsensusError::NotElected(miner.clone()))
                }
            }
            other => Err(kind_mismatch(block, other, "delegate")),
        }
    }
}

fn elect(stakes: &StakeTable, delegate_count: usize) -> Vec<Address> {
    stakes
        .ranked()
        .into_iter()
        .take(delegate_count)
        .map(|v| v.address)
        .collect()
}
