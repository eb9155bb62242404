// concord/core/src/consensus/config.rs

use crate::consensus::dpos::DEFAULT_DELEGATE_COUNT;
use crate::consensus::quorum::DEFAULT_VOTE_TIMEOUT;
use crate::consensus::registry::{StakeTable, ValidatorInfo};
use crate::consensus::selection::LeaderSelection;
use crate::error::ConsensusError;
use crate::transaction::Address;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DIFFICULTY: u32 = 3;

/// One `{ address, stake }` row of a stake table in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeEntry {
    pub address: Address,
    pub stake: u64,
}

/// The `[consensus]` table, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ConsensusConfig {
    ProofOfWork {
        #[serde(default = "default_difficulty")]
        difficulty: u32,
    },
    ProofOfStake {
        #[serde(default)]
        selection: LeaderSelection,
        #[serde(default)]
        stakes: Vec<StakeEntry>,
    },
    DelegatedProofOfStake {
        #[serde(default = "default_delegate_count")]
        delegate_count: usize,
        #[serde(default)]
        delegates: Vec<StakeEntry>,
    },
    QuorumVoting {
        #[serde(default)]
        validators: Vec<Address>,
        #[serde(default = "default_vote_timeout_ms")]
        vote_timeout_ms: u64,
    },
    Hybrid {
        #[serde(default = "default_difficulty")]
        difficulty: u32,
        #[serde(default)]
        selection: LeaderSelection,
        #[serde(default)]
        stakes: Vec<StakeEntry>,
    },
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        ConsensusConfig::ProofOfWork {
            difficulty: DEFAULT_DIFFICULTY,
        }
    }
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_delegate_count() -> usize {
    DEFAULT_DELEGATE_COUNT
}

fn default_vote_timeout_ms() -> u64 {
    DEFAULT_VOTE_TIMEOUT.as_millis() as u64
}

/// Builds a stake table where later rows for the same address win.
pub(crate) fn stake_table(entries: &[StakeEntry]) -> StakeTable {
    entries
        .iter()
        .map(|e| ValidatorInfo {
            address: e.address.clone(),
            stake: e.stake,
        })
        .collect()
}

/// Builds a delegate table, refusing addresses listed twice.
pub(crate) fn delegate_table(entries: &[StakeEntry]) -> Result<StakeTable, ConsensusError> {
    let mut table = StakeTable::new();
    for entry in entries {
        table.register_new(entry.address.clone(), entry.stake)?;
    }
    Ok(table)
}
