/// Request/response types exchanged with the `RemoteApi` seam
use super::ids::{ItemId, ServerId};
use super::resource::{Operation, Resource};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One resolved queue item, ready to transmit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRequest {
    /// The queue item id, sent as the idempotency token
    pub idempotency_key: ItemId,
    pub resource: Resource,
    pub operation: Operation,
    /// Payload with every placeholder replaced by a server id
    pub payload: Value,
}

/// Successful answer from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteReceipt {
    pub status: u16,
    /// Identifier assigned by the server (creates only)
    pub server_id: Option<ServerId>,
}
