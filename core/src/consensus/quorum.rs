// concord/core/src/consensus/quorum.rs

use crate::block::{Block, BlockTemplate, ProducerMetadata};
use crate::chain::AppState;
use crate::consensus::pow::kind_mismatch;
use crate::consensus::validator;
use crate::error::ConsensusError;
use crate::transaction::Address;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub const DEFAULT_VOTE_TIMEOUT: Duration = Duration::from_secs(2);

/// Asks one validator for its verdict on a candidate block.
#[async_trait]
pub trait VoteCollector: Send + Sync {
    async fn request_vote(&self, validator: &str, candidate: &Block) -> bool;
}

/// Votes by checking the candidate against the local chain tip: it must link,
/// rehash, carry only structurally valid transactions and commit none twice.
#[derive(Clone)]
pub struct LedgerVoter {
    chain: AppState,
}

impl LedgerVoter {
    pub fn new(chain: AppState) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl VoteCollector for LedgerVoter {
    async fn request_vote(&self, validator: &str, candidate: &Block) -> bool {
        let chain = self.chain.lock().await;
        if let Err(e) = validator::validate_block(candidate, chain.last_block()) {
            debug!(%validator, index = candidate.index, error = %e, "voting no");
            return false;
        }
        candidate
            .transactions
            .iter()
            .all(|tx| tx.validate().is_ok() && !chain.contains_transaction(&tx.id))
    }
}

/// Majority required for `n` validators.
pub fn quorum_for(n: usize) -> usize {
    n.div_ceil(2)
}

/// A block commits only when at least `ceil(n / 2)` validators vote yes.
pub struct QuorumVoting {
    validators: RwLock<BTreeSet<Address>>,
    vote_timeout: Duration,
    collector: Arc<dyn VoteCollector>,
}

impl fmt::Debug for QuorumVoting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuorumVoting")
            .field("validators", &self.validators)
            .field("vote_timeout", &self.vote_timeout)
            .finish_non_exhaustive()
    }
}

impl QuorumVoting {
    pub fn new(
        validators: BTreeSet<Address>,
        vote_timeout: Duration,
        collector: Arc<dyn VoteCollector>,
    ) -> Self {
        Self {
            validators: RwLock::new(validators),
            vote_timeout,
            collector,
        }
    }

    pub async fn register_validator(
        &self,
        address: impl Into<Address>,
    ) -> Result<(), ConsensusError> {
        let address = address.into();
        if !self.validators.write().await.insert(address.clone()) {
            return Err(ConsensusError::AlreadyRegistered(address));
        }
        info!(%address, "validator registered");
        Ok(())
    }

    pub async fn validators(&self) -> Vec<Address> {
        self.validators.read().await.iter().cloned().collect()
    }

    /// Fans the candidate out to every validator and seals it with the tally.
    /// A validator that does not answer within the vote timeout counts as "no".
    pub async fn propose(
        &self,
        producer: &str,
        template: BlockTemplate,
    ) -> Result<Block, ConsensusError> {
        let validators = self.validators().await;
        if validators.is_empty() {
            return Err(ConsensusError::EmptyValidatorSet);
        }

        let candidate = template.clone().seal(ProducerMetadata::Quorum {
            proposer: producer.to_string(),
            yes: 0,
            no: 0,
        });

        let ballots = validators.iter().map(|validator| {
            let candidate = &candidate;
            async move {
                let vote = self.collector.request_vote(validator, candidate);
                match timeout(self.vote_timeout, vote).await {
                    Ok(vote) => vote,
                    Err(_) => {
                        warn!(%validator, index = candidate.index, "vote timed out");
                        false
                    }
                }
            }
        });
        let votes = join_all(ballots).await;

        let total = votes.len();
        let yes = votes.into_iter().filter(|v| *v).count();
        let quorum = quorum_for(total);
        info!(index = template.index, yes, total, quorum, "votes collected");

        if yes < quorum {
            return Err(ConsensusError::QuorumNotReached { yes, quorum });
        }
        Ok(template.seal(ProducerMetadata::Quorum {
            proposer: producer.to_string(),
            yes,
            no: total - yes,
        }))
    }

    /// Checks the recorded tally against the current validator set.
    pub async fn verify(&self, block: &Block) -> Result<(), ConsensusError> {
        let (yes, no) = match &block.producer_metadata {
            ProducerMetadata::Quorum { yes, no, .. } => (*yes, *no),
            other => return Err(kind_mismatch(block, other, "quorum")),
        };
        let members = self.validators.read().await.len();
        let cast = yes + no;
        if cast == 0 || cast != members {
            return Err(ConsensusError::InvalidSeal {
                index: block.index,
                reason: format!("tally covers {cast} votes, validator set has {members}"),
            });
        }
        let quorum = quorum_for(cast);
        if yes < quorum {
            return Err(ConsensusError::QuorumNotReached { yes, quorum });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Blockchain;
    use crate::genesis::genesis_block;
    use std::collections::HashSet;
    use tokio::sync::Mutex;

    struct Scripted {
        approve: HashSet<String>,
    }

    #[async_trait]
    impl VoteCollector for Scripted {
        async fn request_vote(&self, validator: &str, _candidate: &Block) -> bool {
            self.approve.contains(validator)
        }
    }

    struct Silent;

    #[async_trait]
    impl VoteCollector for Silent {
        async fn request_vote(&self, _validator: &str, _candidate: &Block) -> bool {
            tokio::time::sleep(Duration::from_secs(30)).await;
            true
        }
    }

    fn four_validators() -> BTreeSet<Address> {
        ["v1", "v2", "v3", "v4"].into_iter().map(String::from).collect()
    }

    fn scripted(approve: &[&str]) -> Arc<dyn VoteCollector> {
        Arc::new(Scripted {
            approve: approve.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn quorum_is_ceiling_of_half() {
        assert_eq!(quorum_for(1), 1);
        assert_eq!(quorum_for(3), 2);
        assert_eq!(quorum_for(4), 2);
        assert_eq!(quorum_for(5), 3);
    }

    #[tokio::test]
    async fn two_of_four_commits() {
        let voting =
            QuorumVoting::new(four_validators(), DEFAULT_VOTE_TIMEOUT, scripted(&["v1", "v3"]));
        let block = voting
            .propose("v1", BlockTemplate::extending(&genesis_block(), Vec::new()))
            .await
            .unwrap();

        assert_eq!(
            block.producer_metadata,
            ProducerMetadata::Quorum { proposer: "v1".into(), yes: 2, no: 2 }
        );
        assert!(block.has_valid_hash());
        assert!(voting.verify(&block).await.is_ok());
    }

    #[tokio::test]
    async fn one_of_four_is_rejected() {
        let voting = QuorumVoting::new(four_validators(), DEFAULT_VOTE_TIMEOUT, scripted(&["v2"]));
        let result = voting
            .propose("v2", BlockTemplate::extending(&genesis_block(), Vec::new()))
            .await;
        assert_eq!(result, Err(ConsensusError::QuorumNotReached { yes: 1, quorum: 2 }));
    }

    #[tokio::test]
    async fn empty_validator_set_fails() {
        let voting = QuorumVoting::new(BTreeSet::new(), DEFAULT_VOTE_TIMEOUT, scripted(&[]));
        let result = voting
            .propose("v1", BlockTemplate::extending(&genesis_block(), Vec::new()))
            .await;
        assert_eq!(result, Err(ConsensusError::EmptyValidatorSet));
    }

    #[tokio::test]
    async fn timeouts_count_as_no() {
        let voting =
            QuorumVoting::new(four_validators(), Duration::from_millis(20), Arc::new(Silent));
        let result = voting
            .propose("v1", BlockTemplate::extending(&genesis_block(), Vec::new()))
            .await;
        assert_eq!(result, Err(ConsensusError::QuorumNotReached { yes: 0, quorum: 2 }));
    }

    #[tokio::test]
    async fn duplicate_validator_is_refused() {
        let voting = QuorumVoting::new(four_validators(), DEFAULT_VOTE_TIMEOUT, scripted(&[]));
        assert_eq!(
            voting.register_validator("v1").await,
            Err(ConsensusError::AlreadyRegistered("v1".into()))
        );
        voting.register_validator("v5").await.unwrap();
        assert_eq!(voting.validators().await.len(), 5);
    }

    #[tokio::test]
    async fn verify_rejects_tally_for_a_different_set() {
        let voting = QuorumVoting::new(four_validators(), DEFAULT_VOTE_TIMEOUT, scripted(&[]));
        let forged =
            BlockTemplate::extending(&genesis_block(), Vec::new()).seal(ProducerMetadata::Quorum {
                proposer: "v1".into(),
                yes: 1,
                no: 0,
            });
        assert!(matches!(voting.verify(&forged).await, Err(ConsensusError::InvalidSeal { .. })));
    }

    #[tokio::test]
    async fn ledger_voter_rejects_blocks_off_the_tip() {
        let chain: AppState = Arc::new(Mutex::new(Blockchain::new()));
        let voter = LedgerVoter::new(chain);
        let genesis = genesis_block();

        let good = BlockTemplate::extending(&genesis, Vec::new()).seal(ProducerMetadata::Genesis);
        assert!(voter.request_vote("v1", &good).await);

        let mut stale = good.clone();
        stale.previous_hash = "f".repeat(64);
        assert!(!voter.request_vote("v1", &stale).await);
    }
}
