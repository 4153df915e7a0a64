//! Versioned on-disk layout shared by every backend

use crate::error::{Result, StorageError};
use chrono::{DateTime, Utc};
use clinic_core::{IdentifierTable, QueueItem, QueueSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Newest layout this build writes
pub const CURRENT_VERSION: u32 = 1;

/// The persisted blob
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedQueue {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub items: Vec<QueueItem>,
    #[serde(default)]
    pub identifiers: IdentifierTable,
}

impl PersistedQueue {
    fn from_snapshot(snapshot: &QueueSnapshot) -> Self {
        Self {
            version: CURRENT_VERSION,
            saved_at: Utc::now(),
            items: snapshot.items.clone(),
            identifiers: snapshot.identifiers.clone(),
        }
    }

    fn into_snapshot(self) -> QueueSnapshot {
        QueueSnapshot {
            items: self.items,
            identifiers: self.identifiers,
        }
    }
}

/// Serialize a snapshot into the current envelope
pub fn encode(snapshot: &QueueSnapshot) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&PersistedQueue::from_snapshot(snapshot))?)
}

/// Decode any known envelope version into a snapshot
///
/// # Errors
///
/// Returns `StorageError::Serialization` for unreadable bytes and
/// `StorageError::UnsupportedVersion` for blobs from a newer build.
pub fn decode(bytes: &[u8]) -> Result<QueueSnapshot> {
    let raw: Value = serde_json::from_slice(bytes)?;
    let version = raw
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| StorageError::Serialization("missing format version".into()))?;

    let current = upgrade(version, raw)?;
    let persisted: PersistedQueue = serde_json::from_value(current)?;
    Ok(persisted.into_snapshot())
}

/// Bring an older envelope up to `CURRENT_VERSION`
///
/// Each future layout change adds one arm here that rewrites version N into
/// N + 1, so queued work written by an older build is never discarded.
fn upgrade(version: u64, raw: Value) -> Result<Value> {
    match version {
        v if v == u64::from(CURRENT_VERSION) => Ok(raw),
        found => Err(StorageError::UnsupportedVersion {
            found,
            supported: CURRENT_VERSION,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_core::{Operation, Resource, ServerId};
    use serde_json::json;

    fn sample() -> QueueSnapshot {
        let item = QueueItem::new(Resource::Patient, Operation::Create, json!({"nombre": "Ana"}));
        let mut identifiers = IdentifierTable::new();
        identifiers.insert(item.id.clone(), ServerId::Int(77));
        QueueSnapshot {
            items: vec![item],
            identifiers,
        }
    }

    #[test]
    fn test_encoded_blob_carries_version() {
        let snapshot = sample();
        let bytes = encode(&snapshot).unwrap();
        let raw: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(raw["version"], json!(CURRENT_VERSION));
        assert_eq!(decode(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn test_garbage_is_serialization_error() {
        let err = decode(b"{not json").unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_missing_version_is_corruption() {
        let err = decode(br#"{"items": []}"#).unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn test_future_version_is_rejected() {
        let err = decode(br#"{"version": 99, "saved_at": "2024-01-01T00:00:00Z", "items": []}"#)
            .unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedVersion { found: 99, .. }));
        assert!(err.is_corruption());
    }
}
