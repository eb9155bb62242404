// concord/core/src/mempool.rs

use crate::error::ValidationError;
use crate::transaction::{Transaction, TxId};
use std::collections::{HashSet, VecDeque};

/// Transactions waiting for a block, in arrival order.
#[derive(Debug, Default, Clone)]
pub struct Mempool {
    queue: VecDeque<Transaction>,
    ids: HashSet<TxId>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, id: &TxId) -> bool {
        self.ids.contains(id)
    }

    /// Validates and enqueues `tx`. A transaction already pending is refused.
    pub fn insert(&mut self, tx: Transaction) -> Result<(), ValidationError> {
        tx.validate()?;
        if !self.ids.insert(tx.id) {
            return Err(ValidationError::AlreadyPending(tx.id));
        }
        self.queue.push_back(tx);
        Ok(())
    }

    /// A copy of every pending transaction, oldest first.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.queue.iter().cloned().collect()
    }

    /// Drops every pending transaction whose id is in `ids`; returns how many went.
    pub fn remove_committed<'a>(&mut self, ids: impl IntoIterator<Item = &'a TxId>) -> usize {
        let gone: HashSet<TxId> = ids
            .into_iter()
            .filter(|id| self.ids.remove(*id))
            .copied()
            .collect();
        if gone.is_empty() {
            return 0;
        }
        self.queue.retain(|tx| !gone.contains(&tx.id));
        gone.len()
    }

    /// Keeps only transactions for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&Transaction) -> bool) {
        let ids = &mut self.ids;
        self.queue.retain(|tx| {
            let kept = keep(tx);
            if !kept {
                ids.remove(&tx.id);
            }
            kept
        });
    }
}
