/// Queue item domain types
use super::ids::{ItemId, ServerId};
use super::placeholder::{collect_placeholders, Placeholder};
use super::resource::{validate_payload, Operation, Resource};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle status of a queued intent
///
/// `pending -> syncing -> (completed | failed)`; a failed item returns to
/// `pending` only through an explicit retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Syncing,
    Completed,
    Failed,
}

impl ItemStatus {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification of the last failure recorded on an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transient; the item is still pending and will be retried
    NetworkError,
    /// 4xx from the server; terminal
    RequestRejected,
    /// The producing item is terminally failed or gone; terminal
    UnresolvedDependency,
    /// Too many consecutive transient failures; terminal
    RetriesExhausted,
}

impl ErrorKind {
    /// Whether an item carrying this error is in a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::NetworkError)
    }

    /// Display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "NetworkError",
            Self::RequestRejected => "RequestRejected",
            Self::UnresolvedDependency => "UnresolvedDependency",
            Self::RetriesExhausted => "RetriesExhausted",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Last failure recorded on an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP status, when the server answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub occurred_at: DateTime<Utc>,
}

impl ItemError {
    /// New error stamped with the current time
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            occurred_at: Utc::now(),
        }
    }

    /// Attach the HTTP status the server answered with
    #[must_use]
    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }
}

/// A single pending intent in the offline queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Client-generated, immutable, globally unique
    pub id: ItemId,
    pub resource: Resource,
    pub operation: Operation,
    /// As enqueued; never rewritten by placeholder resolution
    pub payload: Value,
    pub status: ItemStatus,
    /// Creation time and FIFO ordering key
    pub timestamp: DateTime<Utc>,
    /// Attempts made so far (transient failures plus manual retries)
    #[serde(default)]
    pub retry_count: u32,
    /// Transient failures since the last success or manual reset; drives backoff
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default)]
    pub last_error: Option<ItemError>,
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Earliest time the next attempt may run (backoff)
    #[serde(default)]
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// Server id returned by a completed create
    #[serde(default)]
    pub server_id: Option<ServerId>,
}

impl QueueItem {
    /// Create a new pending item with a fresh id and the current timestamp
    pub fn new(resource: Resource, operation: Operation, payload: Value) -> Self {
        Self {
            id: ItemId::generate(),
            resource,
            operation,
            payload,
            status: ItemStatus::Pending,
            timestamp: Utc::now(),
            retry_count: 0,
            consecutive_failures: 0,
            last_error: None,
            last_attempt_at: None,
            next_attempt_at: None,
            server_id: None,
        }
    }

    /// Validate the payload against its resource/operation shape
    pub fn validate(&self) -> Result<()> {
        validate_payload(self.resource, self.operation, &self.payload)
    }

    /// Placeholders this item's payload depends on
    pub fn dependencies(&self) -> Vec<Placeholder> {
        collect_placeholders(&self.payload)
    }

    /// Whether this item references the given producing item
    pub fn depends_on(&self, producer: &ItemId) -> bool {
        self.dependencies().iter().any(|p| p.item_id() == producer)
    }

    /// Whether the backoff window has elapsed
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at.map_or(true, |at| at <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_new_item_is_pending_and_due() {
        let item = QueueItem::new(Resource::Patient, Operation::Create, json!({"nombre": "Ana"}));
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.retry_count, 0);
        assert!(item.last_error.is_none());
        assert!(item.is_due(Utc::now()));
    }

    #[test]
    fn test_backoff_window() {
        let mut item =
            QueueItem::new(Resource::Patient, Operation::Create, json!({"nombre": "Ana"}));
        let now = Utc::now();
        item.next_attempt_at = Some(now + Duration::seconds(10));
        assert!(!item.is_due(now));
        assert!(item.is_due(now + Duration::seconds(10)));
    }

    #[test]
    fn test_depends_on() {
        let patient =
            QueueItem::new(Resource::Patient, Operation::Create, json!({"nombre": "Ana"}));
        let appt = QueueItem::new(
            Resource::Appointment,
            Operation::Create,
            json!({"id_paciente": Placeholder::for_item(&patient.id).to_string()}),
        );
        assert!(appt.depends_on(&patient.id));
        assert!(!patient.depends_on(&appt.id));
    }

    #[test]
    fn test_error_kind_terminality() {
        assert!(!ErrorKind::NetworkError.is_terminal());
        assert!(ErrorKind::RequestRejected.is_terminal());
        assert!(ErrorKind::UnresolvedDependency.is_terminal());
        assert!(ErrorKind::RetriesExhausted.is_terminal());
    }

    #[test]
    fn test_item_serde_defaults_for_older_blobs() {
        let raw = json!({
            "id": "Q1",
            "resource": "patient",
            "operation": "create",
            "payload": {"nombre": "Ana"},
            "status": "pending",
            "timestamp": "2024-01-01T00:00:00Z"
        });
        let item: QueueItem = serde_json::from_value(raw).unwrap();
        assert_eq!(item.id.as_str(), "Q1");
        assert_eq!(item.retry_count, 0);
        assert!(item.next_attempt_at.is_none());
    }
}
