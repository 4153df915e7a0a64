//! Test helpers and fixtures for store integration tests
//!
//! Stores are backed by REAL files in a temp directory (NOT in-memory
//! `SQLite`) so the rename and transaction paths run the way they do on a device.

use clinic_core::{
    ErrorKind, IdentifierTable, ItemError, ItemStatus, Operation, Placeholder, QueueItem,
    QueueSnapshot, Resource, ServerId,
};
use clinic_storage::{FileQueueStore, SqliteQueueStore};
use serde_json::json;
use tempfile::TempDir;

/// Temp directory that cleans up on drop
pub struct TestDir {
    pub dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn file_store(&self) -> FileQueueStore {
        FileQueueStore::new(self.dir.path().join("queue").join("outbox.json"))
    }

    pub async fn sqlite_store(&self) -> SqliteQueueStore {
        let url = format!("sqlite://{}", self.dir.path().join("outbox.db").display());
        SqliteQueueStore::open(&url)
            .await
            .expect("Failed to open sqlite store")
    }
}

/// Fixture: a patient create, a dependent appointment, and a failed vital sign
pub fn sample_snapshot() -> QueueSnapshot {
    let mut patient =
        QueueItem::new(Resource::Patient, Operation::Create, json!({"nombre": "Ana"}));
    patient.status = ItemStatus::Completed;
    patient.server_id = Some(ServerId::Int(77));

    let appointment = QueueItem::new(
        Resource::Appointment,
        Operation::Create,
        json!({
            "id_paciente": Placeholder::for_item(&patient.id).to_string(),
            "motivo": "control"
        }),
    );

    let mut vital = QueueItem::new(
        Resource::VitalSign,
        Operation::Create,
        json!({"id_paciente": 12, "presion": "120/80"}),
    );
    vital.status = ItemStatus::Failed;
    vital.retry_count = 3;
    vital.last_error = Some(
        ItemError::new(ErrorKind::RequestRejected, "presion invalida").with_status(Some(422)),
    );

    let mut identifiers = IdentifierTable::new();
    identifiers.insert(patient.id.clone(), ServerId::Int(77));

    QueueSnapshot {
        items: vec![patient, appointment, vital],
        identifiers,
    }
}
