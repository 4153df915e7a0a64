//! Clinic Server Client
//!
//! HTTP client for the clinic records REST API, as seen by the offline queue.
//!
//! # Features
//!
//! - **Routing**: `(resource, operation)` mapped to a REST verb and path
//!   (`create patient -> POST /patients`, `update appointment -> PUT /appointments/{id}`)
//! - **Idempotency**: every call carries the queue item id in an
//!   `Idempotency-Key` header
//! - **Classification**: responses sorted into transient and terminal
//!   failures for the sync engine's retry policy
//! - **Reachability**: `GET /health` probe for the connectivity monitor
//!
//! # Example
//!
//! ```ignore
//! use clinic_core::{ItemId, Operation, RemoteApi, RemoteRequest, Resource};
//! use clinic_server_client::{ClinicServerClient, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::with_token("https://clinic.example.com", "token");
//!     let client = ClinicServerClient::new(config)?;
//!
//!     let receipt = client
//!         .submit(&RemoteRequest {
//!             idempotency_key: ItemId::generate(),
//!             resource: Resource::Patient,
//!             operation: Operation::Create,
//!             payload: serde_json::json!({ "nombre": "Ana" }),
//!         })
//!         .await?;
//!     println!("Created patient {:?}", receipt.server_id);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod routes;
mod types;

// Re-export main types
pub use client::ClinicServerClient;
pub use error::{Result, ServerClientError};
pub use routes::{collection_path, Route, IDEMPOTENCY_HEADER};
pub use types::ServerConfig;
