//! Live Merge Registry
//!
//! Holds records tracked by the live subscriber and substitutes them for stale
//! historical ones.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;
use tokio::sync::RwLock;

use crate::model::{CanonicalTransaction, ChainIds, LiveKey};
use crate::transform::sort_by_recency;

/// Immutable view of the registry at one instant.
pub type LiveSnapshot = Arc<HashMap<LiveKey, CanonicalTransaction>>;

/// Copy-on-write map: writers clone the map only while a snapshot is alive, so
/// a reader never sees a half-applied update.
#[derive(Default)]
pub struct LiveMergeRegistry {
    entries: RwLock<LiveSnapshot>,
}

impl LiveMergeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track or refresh a record
    pub async fn insert(&self, record: CanonicalTransaction) {
        let mut entries = self.entries.write().await;
        Arc::make_mut(&mut *entries).insert(record.key(), record);
    }

    /// Stop tracking a record
    pub async fn remove(&self, key: &LiveKey) -> Option<CanonicalTransaction> {
        let mut entries = self.entries.write().await;
        Arc::make_mut(&mut *entries).remove(key)
    }

    pub async fn get(&self, key: &LiveKey) -> Option<CanonicalTransaction> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn snapshot(&self) -> LiveSnapshot {
        Arc::clone(&*self.entries.read().await)
    }

    /// Records sent by `wallet` on the configured chain pair, newest first.
    /// Records without an L2 chain id match on the L1 id alone.
    pub async fn for_wallet(&self, wallet: Address, chains: ChainIds) -> Vec<CanonicalTransaction> {
        let snapshot = self.snapshot().await;
        let mut records: Vec<_> = snapshot
            .values()
            .filter(|r| r.sender == Some(wallet))
            .filter(|r| r.l1_chain_id == Some(chains.l1))
            .filter(|r| r.l2_chain_id.map_or(true, |id| id == chains.l2))
            .cloned()
            .collect();
        sort_by_recency(&mut records);
        records
    }
}

/// Replaces every non-terminal record that has a live counterpart; everything
/// else passes through unchanged and in order.
pub fn merge(
    records: Vec<CanonicalTransaction>,
    live: &HashMap<LiveKey, CanonicalTransaction>,
) -> Vec<CanonicalTransaction> {
    if live.is_empty() {
        return records;
    }

    records
        .into_iter()
        .map(|record| {
            if record.is_terminal() {
                return record;
            }
            match live.get(&record.key()) {
                Some(fresher) => fresher.clone(),
                None => record,
            }
        })
        .collect()
}
