//! Dependency resolution
//!
//! Replaces `temp:<item-id>` placeholders with the server identifiers the
//! named items produced. The queued payload is never touched; resolution
//! works on a copy so every attempt sees the current table.

use crate::state::QueueState;
use clinic_core::{IdentifierTable, ItemId, ItemStatus, Placeholder, QueueItem};
use serde_json::Value;

/// Whether an item can be transmitted now
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Every placeholder resolved; the payload to send
    Ready(Value),
    /// Waiting on an item that has not synced yet
    Deferred { waiting_on: ItemId },
    /// The producing item can no longer supply an identifier
    Blocked { parent: ItemId, reason: String },
}

/// Resolve an item's placeholders against the current queue state
pub fn resolve(item: &QueueItem, state: &QueueState) -> Resolution {
    let table = state.identifiers();

    for placeholder in item.dependencies() {
        let parent = placeholder.item_id();
        if table.get(parent).is_some() {
            continue;
        }
        if parent == &item.id {
            return Resolution::Blocked {
                parent: parent.clone(),
                reason: "item refers to itself".into(),
            };
        }

        return match state.get(parent) {
            Some(producer) => match producer.status {
                ItemStatus::Pending | ItemStatus::Syncing => Resolution::Deferred {
                    waiting_on: parent.clone(),
                },
                ItemStatus::Failed => Resolution::Blocked {
                    parent: parent.clone(),
                    reason: format!("parent item {} failed", parent),
                },
                ItemStatus::Completed => Resolution::Blocked {
                    parent: parent.clone(),
                    reason: format!("parent item {} completed without an identifier", parent),
                },
            },
            None => Resolution::Blocked {
                parent: parent.clone(),
                reason: format!("parent item {} was removed from the queue", parent),
            },
        };
    }

    Resolution::Ready(substitute(&item.payload, table))
}

/// Copy of `payload` with every resolvable placeholder replaced
pub fn substitute(payload: &Value, table: &IdentifierTable) -> Value {
    match payload {
        Value::String(s) => Placeholder::parse(s)
            .and_then(|p| table.get(p.item_id()))
            .map_or_else(|| payload.clone(), |server_id| server_id.to_json()),
        Value::Array(values) => Value::Array(values.iter().map(|v| substitute(v, table)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, table)))
                .collect(),
        ),
        _ => payload.clone(),
    }
}
