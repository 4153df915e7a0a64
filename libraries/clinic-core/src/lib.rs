//! Clinic Core
//!
//! Platform-agnostic types, traits, and error handling for the clinic
//! client's offline operation queue.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `QueueItem`, `Resource`, `Operation`, `QueueStatus`,
//!   `IdentifierTable`, placeholder references
//! - **Core Traits**: `QueueStore`, `RemoteApi`, `ReachabilityProbe`
//! - **Error Handling**: Unified `ClinicError` and `Result` types, plus the
//!   `RemoteError` transport classification
//!
//! # Example
//!
//! ```rust
//! use clinic_core::types::{Operation, Placeholder, QueueItem, Resource};
//! use serde_json::json;
//!
//! let patient = QueueItem::new(Resource::Patient, Operation::Create, json!({ "nombre": "Ana" }));
//! let appointment = QueueItem::new(
//!     Resource::Appointment,
//!     Operation::Create,
//!     json!({ "id_paciente": Placeholder::for_item(&patient.id).to_string() }),
//! );
//! assert!(appointment.validate().is_ok());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{ClinicError, RemoteError, Result};
pub use traits::{QueueStore, ReachabilityProbe, RemoteApi};

pub use types::{
    ErrorKind, IdentifierTable, ItemError, ItemId, ItemStatus, Operation, Placeholder,
    QueueItem, QueueSnapshot, QueueStatus, RemoteReceipt, RemoteRequest, Resource, ServerId,
};
