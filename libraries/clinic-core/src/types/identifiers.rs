/// Identifier resolution table and the persisted queue snapshot
use super::ids::{ItemId, ServerId};
use super::queue_item::QueueItem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Local item id -> server-assigned id
///
/// An entry exists only once the producing item has completed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierTable(BTreeMap<ItemId, ServerId>);

impl IdentifierTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the server id recorded for a producing item
    pub fn get(&self, local: &ItemId) -> Option<&ServerId> {
        self.0.get(local)
    }

    /// Record a mapping; returns the previous value if any
    pub fn insert(&mut self, local: ItemId, server: ServerId) -> Option<ServerId> {
        self.0.insert(local, server)
    }

    /// Keep only the entries for which the predicate returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&ItemId, &ServerId) -> bool) {
        self.0.retain(|k, v| keep(k, v));
    }

    /// Remove all entries
    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate mappings in key order
    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &ServerId)> {
        self.0.iter()
    }
}

/// Everything the durable store persists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub items: Vec<QueueItem>,
    #[serde(default)]
    pub identifiers: IdentifierTable,
}

impl QueueSnapshot {
    /// Whether there is nothing to persist
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.identifiers.is_empty()
    }
}
