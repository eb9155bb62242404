// concord/p2p/src/seen.rs

use concord_core::TxId;
use lru::LruCache;
use std::num::NonZeroUsize;

pub const DEFAULT_SEEN_CAPACITY: usize = 4096;

/// Something that has already travelled through this node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Seen {
    Transaction(TxId),
    Block(String),
}

/// Bounded memory of recently gossiped items, so a message is relayed once.
#[derive(Debug)]
pub struct SeenCache {
    entries: LruCache<Seen, ()>,
}

impl SeenCache {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Records `item`; returns false if it was already known.
    pub fn insert(&mut self, item: Seen) -> bool {
        self.entries.put(item, ()).is_none()
    }

    pub fn contains(&self, item: &Seen) -> bool {
        self.entries.contains(item)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SeenCache {
    fn default() -> Self {
        Self::new(DEFAULT_SEEN_CAPACITY)
    }
}
