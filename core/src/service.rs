// concord/core/src/service.rs

use crate::block::{Block, ProducerMetadata};
use crate::chain::{AppState, Blockchain};
use crate::consensus::{ConsensusConfig, ConsensusEngine, LedgerVoter, Sealed, VoteCollector};
use crate::error::{ChainIntegrityError, ConsensusError, MiningAbort, ValidationError};
use crate::events::{LedgerEvent, Source};
use crate::mempool::Mempool;
use crate::state::{self, Balances};
use crate::transaction::Transaction;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 1024;

/// Result of one block-production attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Committed(Block),
    Aborted(MiningAbort),
    /// Nothing to produce: the mempool was empty and empty blocks are disabled.
    Idle,
}

/// What happened to a block received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    Appended,
    /// Already have a block at this height.
    Stale,
}

/// The ledger's public face: chain, mempool and consensus engine behind one handle.
///
/// Chain and mempool sit behind separate mutexes, always locked in that order.
#[derive(Clone)]
pub struct LedgerService {
    chain: AppState,
    mempool: Arc<Mutex<Mempool>>,
    engine: Arc<ConsensusEngine>,
    events: broadcast::Sender<LedgerEvent>,
    chain_len: Arc<watch::Sender<usize>>,
    allow_empty_blocks: bool,
}

impl LedgerService {
    /// A fresh ledger at genesis whose quorum votes are cast against the local chain.
    pub fn new(config: &ConsensusConfig) -> Result<Self, ConsensusError> {
        let chain: AppState = Arc::new(Mutex::new(Blockchain::new()));
        let voter = Arc::new(LedgerVoter::new(chain.clone()));
        let engine = ConsensusEngine::from_config(config, voter)?;
        Ok(Self::assemble(chain, engine))
    }

    /// A fresh ledger at genesis with a caller-supplied vote transport.
    pub fn with_voter(
        config: &ConsensusConfig,
        collector: Arc<dyn VoteCollector>,
    ) -> Result<Self, ConsensusError> {
        let engine = ConsensusEngine::from_config(config, collector)?;
        Ok(Self::with_engine(engine))
    }

    pub fn with_engine(engine: ConsensusEngine) -> Self {
        Self::assemble(Arc::new(Mutex::new(Blockchain::new())), engine)
    }

    fn assemble(chain: AppState, engine: ConsensusEngine) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (chain_len, _) = watch::channel(1);
        Self {
            chain,
            mempool: Arc::new(Mutex::new(Mempool::new())),
            engine: Arc::new(engine),
            events,
            chain_len: Arc::new(chain_len),
            allow_empty_blocks: false,
        }
    }

    pub fn allow_empty_blocks(mut self, allow: bool) -> Self {
        self.allow_empty_blocks = allow;
        self
    }

    pub fn engine(&self) -> &ConsensusEngine {
        &self.engine
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Tracks the chain length; proof-of-work watches it to abandon stale work.
    pub fn chain_len_watch(&self) -> watch::Receiver<usize> {
        self.chain_len.subscribe()
    }

    /// Validates a locally submitted transaction and queues it for the next block.
    pub async fn submit_transaction(&self, tx: Transaction) -> Result<(), ValidationError> {
        self.accept_transaction(tx, Source::Local).await
    }

    /// Same checks as [`LedgerService::submit_transaction`] for a transaction gossiped by a peer.
    pub async fn accept_remote_transaction(&self, tx: Transaction) -> Result<(), ValidationError> {
        self.accept_transaction(tx, Source::Peer).await
    }

    async fn accept_transaction(
        &self,
        tx: Transaction,
        source: Source,
    ) -> Result<(), ValidationError> {
        tx.validate()?;
        {
            let chain = self.chain.lock().await;
            if chain.contains_transaction(&tx.id) {
                return Err(ValidationError::AlreadyCommitted(tx.id));
            }
            self.mempool.lock().await.insert(tx.clone())?;
        }
        debug!(id = %tx.id, ?source, "transaction accepted");
        self.publish(LedgerEvent::TransactionAccepted { transaction: tx, source });
        Ok(())
    }

    pub async fn get_chain(&self) -> Vec<Block> {
        self.chain.lock().await.blocks().to_vec()
    }

    pub async fn chain_len(&self) -> usize {
        self.chain.lock().await.len()
    }

    pub async fn last_block(&self) -> Block {
        self.chain.lock().await.last_block().clone()
    }

    pub async fn get_pending_transactions(&self) -> Vec<Transaction> {
        self.mempool.lock().await.snapshot()
    }

    pub async fn get_balance(&self, address: &str) -> i128 {
        state::balance_of(self.chain.lock().await.blocks(), address)
    }

    pub async fn get_balances(&self) -> Balances {
        state::project_balances(self.chain.lock().await.blocks())
    }

    /// Runs one `Idle -> Proposing -> {Committed | Rejected | Aborted}` attempt.
    ///
    /// No lock is held while the engine works. The mempool snapshot is removed
    /// only once the block is appended; a rejected or aborted attempt leaves it.
    pub async fn produce_block(&self, producer: &str) -> Result<Attempt, ConsensusError> {
        let parent = self.last_block().await;
        let snapshot = self.get_pending_transactions().await;
        if snapshot.is_empty() && !self.allow_empty_blocks {
            return Ok(Attempt::Idle);
        }

        debug!(%producer, index = parent.index + 1, txs = snapshot.len(), "proposing block");
        let sealed = self
            .engine
            .propose_block(producer, &parent, snapshot, self.chain_len_watch())
            .await?;

        match sealed {
            Sealed::Block(block) => self.settle(&parent, block).await,
            Sealed::Aborted(abort) => Ok(Attempt::Aborted(abort)),
        }
    }

    /// Commits a freshly sealed block. A peer block or chain that landed while
    /// the engine worked turns the failed append into an abort.
    async fn settle(&self, parent: &Block, block: Block) -> Result<Attempt, ConsensusError> {
        let Err(e) = self.commit(block.clone(), Source::Local).await else {
            return Ok(Attempt::Committed(block));
        };
        let overtaken = *self.chain_len.borrow() > parent.index as usize + 1;
        if !overtaken {
            return Err(e.into());
        }
        let nonces_tried = match block.producer_metadata {
            ProducerMetadata::Work { nonce, .. } => nonce.saturating_add(1),
            _ => 0,
        };
        info!(index = block.index, error = %e, "sealed block lost the race to a peer");
        Ok(Attempt::Aborted(MiningAbort {
            index: block.index,
            nonces_tried,
        }))
    }

    /// Verifies a peer's block seal and appends it to the local tip.
    pub async fn accept_block(&self, block: Block) -> Result<BlockOutcome, ConsensusError> {
        if (block.index as usize) < self.chain_len().await {
            return Ok(BlockOutcome::Stale);
        }
        self.engine.verify_seal(&block).await?;
        self.commit(block, Source::Peer).await?;
        Ok(BlockOutcome::Appended)
    }

    async fn commit(&self, block: Block, source: Source) -> Result<(), ChainIntegrityError> {
        let len = {
            let mut chain = self.chain.lock().await;
            chain.append_block(block.clone())?;
            let removed = self
                .mempool
                .lock()
                .await
                .remove_committed(block.transactions.iter().map(|tx| &tx.id));
            info!(
                index = block.index,
                hash = %block.hash,
                txs = block.transactions.len(),
                removed,
                ?source,
                "block committed"
            );
            chain.len()
        };
        self.chain_len.send_replace(len);
        self.publish(LedgerEvent::BlockCommitted { block, source });
        Ok(())
    }

    /// Adopts `candidate` if it is longer and valid, then drops pending
    /// transactions the new chain already commits.
    pub async fn replace_chain(&self, candidate: Vec<Block>) -> Result<(), ChainIntegrityError> {
        let length = {
            let mut chain = self.chain.lock().await;
            chain.replace_chain(candidate)?;
            let mut pool = self.mempool.lock().await;
            let before = pool.len();
            pool.retain(|tx| !chain.contains_transaction(&tx.id));
            let pruned = before - pool.len();
            if pruned > 0 {
                info!(pruned, "pruned pending transactions committed by the new chain");
            }
            chain.len()
        };
        self.chain_len.send_replace(length);
        self.publish(LedgerEvent::ChainReplaced { length });
        Ok(())
    }

    fn publish(&self, event: LedgerEvent) {
        // No subscribers is not an error.
        if self.events.receiver_count() > 0 && self.events.send(event).is_err() {
            warn!("event feed closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockTemplate;
    use crate::consensus::{LeaderSelection, StakeEntry};

    fn pow(difficulty: u32) -> LedgerService {
        LedgerService::new(&ConsensusConfig::ProofOfWork { difficulty }).unwrap()
    }

    #[tokio::test]
    async fn submitted_transaction_is_pending_then_committed() {
        let ledger = pow(1);
        let tx = Transaction::new("alice", "bob", 5);
        ledger.submit_transaction(tx.clone()).await.unwrap();
        assert_eq!(ledger.get_pending_transactions().await, vec![tx.clone()]);

        let Attempt::Committed(block) = ledger.produce_block("miner").await.unwrap() else {
            panic!("expected a committed block");
        };
        assert_eq!(block.transactions, vec![tx.clone()]);
        assert!(ledger.get_pending_transactions().await.is_empty());
        assert_eq!(ledger.chain_len().await, 2);
        assert_eq!(*ledger.chain_len_watch().borrow(), 2);
        assert_eq!(ledger.get_balance("bob").await, 5);
    }

    #[tokio::test]
    async fn committed_transaction_cannot_be_resubmitted() {
        let ledger = pow(0);
        let tx = Transaction::new("alice", "bob", 5);
        ledger.submit_transaction(tx.clone()).await.unwrap();
        ledger.produce_block("miner").await.unwrap();

        assert_eq!(
            ledger.submit_transaction(tx.clone()).await,
            Err(ValidationError::AlreadyCommitted(tx.id))
        );
    }

    #[tokio::test]
    async fn empty_mempool_stays_idle_unless_allowed() {
        let ledger = pow(0);
        assert_eq!(ledger.produce_block("miner").await.unwrap(), Attempt::Idle);

        let ledger = pow(0).allow_empty_blocks(true);
        assert!(matches!(ledger.produce_block("miner").await.unwrap(), Attempt::Committed(_)));
    }

    #[tokio::test]
    async fn rejected_attempt_leaves_the_mempool() {
        let ledger = LedgerService::new(&ConsensusConfig::DelegatedProofOfStake {
            delegate_count: 1,
            delegates: vec![StakeEntry { address: "d1".into(), stake: 10 }],
        })
        .unwrap();
        ledger.submit_transaction(Transaction::new("a", "b", 1)).await.unwrap();

        assert_eq!(
            ledger.produce_block("outsider").await,
            Err(ConsensusError::NotElected("outsider".into()))
        );
        assert_eq!(ledger.get_pending_transactions().await.len(), 1);
        assert!(matches!(ledger.produce_block("d1").await.unwrap(), Attempt::Committed(_)));
    }

    #[tokio::test]
    async fn events_carry_their_source() {
        let ledger = pow(0);
        let mut events = ledger.subscribe();
        let tx = Transaction::new("a", "b", 1);
        ledger.submit_transaction(tx.clone()).await.unwrap();
        ledger.produce_block("miner").await.unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            LedgerEvent::TransactionAccepted { transaction: tx, source: Source::Local }
        );
        assert!(matches!(
            events.recv().await.unwrap(),
            LedgerEvent::BlockCommitted { source: Source::Local, .. }
        ));
    }

    #[tokio::test]
    async fn peer_block_with_bad_seal_is_refused() {
        let ledger = pow(64);
        let forged = BlockTemplate::extending(&ledger.last_block().await, Vec::new())
            .seal(ProducerMetadata::Work { nonce: 0, difficulty: 64 });
        assert!(matches!(
            ledger.accept_block(forged).await,
            Err(ConsensusError::InvalidSeal { .. })
        ));
        assert_eq!(ledger.chain_len().await, 1);
    }

    #[tokio::test]
    async fn peer_block_clears_matching_pending_transactions() {
        let producer = pow(0);
        let follower = pow(0);
        let tx = Transaction::new("a", "b", 2);
        producer.submit_transaction(tx.clone()).await.unwrap();
        follower.accept_remote_transaction(tx.clone()).await.unwrap();

        let Attempt::Committed(block) = producer.produce_block("miner").await.unwrap() else {
            panic!("expected a committed block");
        };
        assert_eq!(follower.accept_block(block.clone()).await, Ok(BlockOutcome::Appended));
        assert!(follower.get_pending_transactions().await.is_empty());
        assert_eq!(follower.accept_block(block).await, Ok(BlockOutcome::Stale));
    }

    #[tokio::test]
    async fn replacement_prunes_the_mempool_and_reports_length() {
        let ahead = pow(0).allow_empty_blocks(true);
        let behind = pow(0);
        let tx = Transaction::new("a", "b", 3);
        ahead.submit_transaction(tx.clone()).await.unwrap();
        behind.submit_transaction(tx.clone()).await.unwrap();
        for _ in 0..3 {
            ahead.produce_block("miner").await.unwrap();
        }

        let mut events = behind.subscribe();
        behind.replace_chain(ahead.get_chain().await).await.unwrap();
        assert_eq!(behind.chain_len().await, 4);
        assert!(behind.get_pending_transactions().await.is_empty());
        assert_eq!(events.recv().await.unwrap(), LedgerEvent::ChainReplaced { length: 4 });
        assert_eq!(behind.get_balances().await, ahead.get_balances().await);
    }

    #[tokio::test]
    async fn block_overtaken_before_commit_is_an_abort() {
        let ledger = pow(0).allow_empty_blocks(true);
        let tx = Transaction::new("a", "b", 1);
        ledger.submit_transaction(tx.clone()).await.unwrap();

        let parent = ledger.last_block().await;
        let late = BlockTemplate::extending(&parent, vec![tx.clone()])
            .seal(ProducerMetadata::Work { nonce: 6, difficulty: 0 });
        let peer = pow(0).allow_empty_blocks(true);
        let Attempt::Committed(winner) = peer.produce_block("peer").await.unwrap() else {
            panic!("expected a committed block");
        };
        ledger.accept_block(winner).await.unwrap();

        assert_eq!(
            ledger.settle(&parent, late).await,
            Ok(Attempt::Aborted(MiningAbort { index: 1, nonces_tried: 7 }))
        );
        assert_eq!(ledger.chain_len().await, 2);
        assert_eq!(ledger.get_pending_transactions().await, vec![tx]);
    }

    #[tokio::test]
    async fn invalid_block_on_an_unmoved_tip_is_still_an_error() {
        let ledger = pow(0);
        let parent = ledger.last_block().await;
        let mut broken = BlockTemplate::extending(&parent, Vec::new())
            .seal(ProducerMetadata::Work { nonce: 0, difficulty: 0 });
        broken.previous_hash = "f".repeat(64);

        assert!(matches!(
            ledger.settle(&parent, broken).await,
            Err(ConsensusError::Integrity(_))
        ));
    }

    #[tokio::test]
    async fn stake_engine_commits_only_for_the_leader() {
        let ledger = LedgerService::new(&ConsensusConfig::ProofOfStake {
            selection: LeaderSelection::SeededByParent,
            stakes: vec![StakeEntry { address: "solo".into(), stake: 1 }],
        })
        .unwrap()
        .allow_empty_blocks(true);

        assert!(matches!(ledger.produce_block("solo").await.unwrap(), Attempt::Committed(_)));
        assert_eq!(
            ledger.produce_block("other").await,
            Err(ConsensusError::Ineligible("other".into()))
        );
    }
}
