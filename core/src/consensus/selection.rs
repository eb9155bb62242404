// concord/core/src/consensus/selection.rs

use crate::consensus::registry::StakeTable;
use crate::transaction::Address;
use concord_crypto::seed_to_u64;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a stake-weighted producer is chosen for the next block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeaderSelection {
    /// Weighted draw seeded by the parent block hash. Every honest node computes
    /// the same leader for the same parent.
    #[default]
    SeededByParent,
    /// Independent per-node draw with probability `stake / total`. Not
    /// reproducible across nodes; useful only where agreement is not required.
    LocalDraw,
}

impl LeaderSelection {
    pub fn is_eligible(&self, producer: &str, parent_hash: &str, stakes: &StakeTable) -> bool {
        match self {
            LeaderSelection::SeededByParent => {
                select_proposer(parent_hash, stakes).as_deref() == Some(producer)
            }
            LeaderSelection::LocalDraw => local_draw(producer, stakes, &mut rand::thread_rng()),
        }
    }
}

/// Picks a proposer by stake weight using `seed` as the source of randomness.
pub fn select_proposer(seed: &str, stakes: &StakeTable) -> Option<Address> {
    let total_stake = stakes.total_stake();
    if total_stake == 0 {
        return None;
    }

    let target = u128::from(seed_to_u64(seed)) % total_stake;
    let mut cumulative = 0u128;
    for validator in stakes.iter() {
        cumulative += u128::from(validator.stake);
        if cumulative > target {
            debug!(
                proposer = %validator.address,
                stake = validator.stake,
                %target,
                "selected proposer"
            );
            return Some(validator.address);
        }
    }
    None
}

fn local_draw<R: Rng + ?Sized>(producer: &str, stakes: &StakeTable, rng: &mut R) -> bool {
    let stake = stakes.stake_of(producer);
    let total = stakes.total_stake();
    if stake == 0 || total == 0 {
        return false;
    }
    let probability = stake as f64 / total as f64;
    rng.gen::<f64>() < probability
}
