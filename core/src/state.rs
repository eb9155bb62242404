// concord/core/src/state.rs

//! Account balances derived from the chain.
//!
//! Balances are never stored as ground truth. They are a fold over committed
//! transactions and are rebuilt from the blocks alone after chain replacement.

use crate::block::Block;
use crate::transaction::Address;
use std::collections::BTreeMap;

pub type Balances = BTreeMap<Address, i128>;

/// Folds every committed transaction: the sender is debited, the recipient credited.
pub fn project_balances(chain: &[Block]) -> Balances {
    let mut balances = Balances::new();
    for tx in chain.iter().flat_map(|block| &block.transactions) {
        let amount = i128::from(tx.amount);
        *balances.entry(tx.sender.clone()).or_insert(0) -= amount;
        *balances.entry(tx.recipient.clone()).or_insert(0) += amount;
    }
    balances
}

/// Balance of one address; unknown addresses hold zero.
pub fn balance_of(chain: &[Block], address: &str) -> i128 {
    chain
        .iter()
        .flat_map(|block| &block.transactions)
        .fold(0i128, |acc, tx| {
            let amount = i128::from(tx.amount);
            let debit = if tx.sender == address { amount } else { 0 };
            let credit = if tx.recipient == address { amount } else { 0 };
            acc - debit + credit
        })
}
