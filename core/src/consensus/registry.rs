// concord/core/src/consensus/registry.rs

use crate::error::ConsensusError;
use crate::transaction::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One registered participant and its stake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub address: Address,
    pub stake: u64,
}

/// Stake per address. Ordered by address so every node iterates it identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StakeTable {
    stakes: BTreeMap<Address, u64>,
}

impl StakeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a participant or updates its stake.
    pub fn register(&mut self, address: impl Into<Address>, stake: u64) {
        self.stakes.insert(address.into(), stake);
    }

    /// Adds a participant, refusing addresses that are already present.
    pub fn register_new(
        &mut self,
        address: impl Into<Address>,
        stake: u64,
    ) -> Result<(), ConsensusError> {
        let address = address.into();
        if self.stakes.contains_key(&address) {
            return Err(ConsensusError::AlreadyRegistered(address));
        }
        self.stakes.insert(address, stake);
        Ok(())
    }

    pub fn stake_of(&self, address: &str) -> u64 {
        self.stakes.get(address).copied().unwrap_or(0)
    }

    pub fn total_stake(&self) -> u128 {
        self.stakes.values().map(|s| u128::from(*s)).sum()
    }

    pub fn len(&self) -> usize {
        self.stakes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stakes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ValidatorInfo> + '_ {
        self.stakes.iter().map(|(address, stake)| ValidatorInfo {
            address: address.clone(),
            stake: *stake,
        })
    }

    /// Participants by descending stake; equal stakes fall back to address order.
    pub fn ranked(&self) -> Vec<ValidatorInfo> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|a, b| b.stake.cmp(&a.stake).then_with(|| a.address.cmp(&b.address)));
        ranked
    }
}

impl FromIterator<ValidatorInfo> for StakeTable {
    fn from_iter<I: IntoIterator<Item = ValidatorInfo>>(iter: I) -> Self {
        let mut table = StakeTable::new();
        for info in iter {
            table.register(info.address, info.stake);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_upserts() {
        let mut table = StakeTable::new();
        table.register("alice", 10);
        table.register("alice", 25);
        assert_eq!(table.len(), 1);
        assert_eq!(table.stake_of("alice"), 25);
        assert_eq!(table.stake_of("bob"), 0);
    }

    #[test]
    fn register_new_refuses_duplicates() {
        let mut table = StakeTable::new();
        table.register_new("alice", 10).unwrap();
        assert_eq!(
            table.register_new("alice", 99),
            Err(ConsensusError::AlreadyRegistered("alice".into()))
        );
        assert_eq!(table.stake_of("alice"), 10);
    }

    #[test]
    fn ranking_is_descending_with_address_tiebreak() {
        let mut table = StakeTable::new();
        table.register("carol", 5);
        table.register("bob", 50);
        table.register("alice", 5);
        let order: Vec<_> = table.ranked().into_iter().map(|v| v.address).collect();
        assert_eq!(order, ["bob", "alice", "carol"]);
        assert_eq!(table.total_stake(), 60);
    }
}
