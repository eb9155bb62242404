// concord/core/src/consensus/mod.rs

pub mod config;
pub mod dpos;
pub mod hybrid;
pub mod pos;
pub mod pow;
pub mod quorum;
pub mod registry;
pub mod selection;
pub mod validator;

pub use config::{ConsensusConfig, StakeEntry};
pub use dpos::DelegatedProofOfStake;
pub use hybrid::Hybrid;
pub use pos::ProofOfStake;
pub use pow::ProofOfWork;
pub use quorum::{LedgerVoter, QuorumVoting, VoteCollector};
pub use registry::{StakeTable, ValidatorInfo};
pub use selection::LeaderSelection;

use crate::block::{Block, BlockTemplate};
use config::{delegate_table, stake_table};
use crate::error::{ConsensusError, MiningAbort};
use crate::transaction::Transaction;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Outcome of a production attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sealed {
    Block(Block),
    /// A peer's block for the same index was accepted while mining.
    Aborted(MiningAbort),
}

/// The closed set of consensus mechanisms a node can run.
#[derive(Debug)]
pub enum ConsensusEngine {
    ProofOfWork(ProofOfWork),
    ProofOfStake(ProofOfStake),
    DelegatedProofOfStake(DelegatedProofOfStake),
    QuorumVoting(QuorumVoting),
    Hybrid(Hybrid),
}

impl ConsensusEngine {
    /// `collector` is only used by quorum voting.
    pub fn from_config(
        config: &ConsensusConfig,
        collector: Arc<dyn VoteCollector>,
    ) -> Result<Self, ConsensusError> {
        let engine = match config {
            ConsensusConfig::ProofOfWork { difficulty } => {
                ConsensusEngine::ProofOfWork(ProofOfWork::new(*difficulty))
            }
            ConsensusConfig::ProofOfStake { selection, stakes } => {
                ConsensusEngine::ProofOfStake(ProofOfStake::new(stake_table(stakes), *selection))
            }
            ConsensusConfig::DelegatedProofOfStake {
                delegate_count,
                delegates,
            } => ConsensusEngine::DelegatedProofOfStake(DelegatedProofOfStake::new(
                *delegate_count,
                delegate_table(delegates)?,
            )),
            ConsensusConfig::QuorumVoting {
                validators,
                vote_timeout_ms,
            } => {
                let mut members = BTreeSet::new();
                for validator in validators {
                    if !members.insert(validator.clone()) {
                        return Err(ConsensusError::AlreadyRegistered(validator.clone()));
                    }
                }
                ConsensusEngine::QuorumVoting(QuorumVoting::new(
                    members,
                    Duration::from_millis(*vote_timeout_ms),
                    collector,
                ))
            }
            ConsensusConfig::Hybrid {
                difficulty,
                selection,
                stakes,
            } => ConsensusEngine::Hybrid(Hybrid::new(
                ProofOfStake::new(stake_table(stakes), *selection),
                ProofOfWork::new(*difficulty),
            )),
        };
        Ok(engine)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ConsensusEngine::ProofOfWork(_) => "proof-of-work",
            ConsensusEngine::ProofOfStake(_) => "proof-of-stake",
            ConsensusEngine::DelegatedProofOfStake(_) => "delegated-proof-of-stake",
            ConsensusEngine::QuorumVoting(_) => "quorum-voting",
            ConsensusEngine::Hybrid(_) => "hybrid",
        }
    }

    /// Seals `transactions` into a block extending `parent` on behalf of `producer`.
    pub async fn propose_block(
        &self,
        producer: &str,
        parent: &Block,
        transactions: Vec<Transaction>,
        chain_len: watch::Receiver<usize>,
    ) -> Result<Sealed, ConsensusError> {
        let template = BlockTemplate::extending(parent, transactions);
        match self {
            ConsensusEngine::ProofOfWork(pow) => pow.seal(template, chain_len).await,
            ConsensusEngine::ProofOfStake(pos) => {
                pos.propose(producer, template).await.map(Sealed::Block)
            }
            ConsensusEngine::DelegatedProofOfStake(dpos) => {
                dpos.propose(producer, template).await.map(Sealed::Block)
            }
            ConsensusEngine::QuorumVoting(quorum) => {
                quorum.propose(producer, template).await.map(Sealed::Block)
            }
            ConsensusEngine::Hybrid(hybrid) => hybrid.propose(producer, template, chain_len).await,
        }
    }

    /// Checks that a block received from a peer carries a proof this engine accepts.
    pub async fn verify_seal(&self, block: &Block) -> Result<(), ConsensusError> {
        match self {
            ConsensusEngine::ProofOfWork(pow) => pow.verify(block),
            ConsensusEngine::ProofOfStake(pos) => pos.verify(block).await,
            ConsensusEngine::DelegatedProofOfStake(dpos) => dpos.verify(block).await,
            ConsensusEngine::QuorumVoting(quorum) => quorum.verify(block).await,
            ConsensusEngine::Hybrid(hybrid) => hybrid.verify(block).await,
        }
    }
}
