// concord/core/src/lib.rs

pub mod block;
pub mod chain;
pub mod consensus;
pub mod error;
pub mod events;
pub mod genesis;
pub mod mempool;
pub mod service;
pub mod state;
pub mod transaction;

pub use block::{Block, BlockTemplate, ProducerMetadata};
pub use chain::{AppState, Blockchain};
pub use consensus::{ConsensusConfig, ConsensusEngine, Sealed};
pub use error::{ChainIntegrityError, ConsensusError, MiningAbort, ValidationError};
pub use events::{LedgerEvent, Source};
pub use mempool::Mempool;
pub use service::{Attempt, BlockOutcome, LedgerService};
pub use state::{balance_of, project_balances, Balances};
pub use transaction::{Address, Transaction, TxId};
