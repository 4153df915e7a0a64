mod identifiers;
mod ids;
mod placeholder;
mod queue_item;
mod remote;
mod resource;
mod status;

pub use identifiers::{IdentifierTable, QueueSnapshot};
pub use ids::{ItemId, ServerId};
pub use placeholder::{collect_placeholders, Placeholder, PLACEHOLDER_PREFIX};
pub use queue_item::{ErrorKind, ItemError, ItemStatus, QueueItem};
pub use remote::{RemoteReceipt, RemoteRequest};
pub use resource::{validate_payload, Operation, Resource};
pub use status::QueueStatus;
