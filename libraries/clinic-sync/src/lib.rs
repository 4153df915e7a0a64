//! Clinic Sync
//!
//! Offline operation queue for the clinic client: intents are persisted
//! locally, then replayed against the records API when connectivity allows.
//!
//! # Components
//!
//! - [`QueueManager`]: the application-facing API (enqueue, status,
//!   inspection, retry/discard, manual sync)
//! - [`ConnectivityMonitor`]: online/offline state with debounced online events
//! - Sync engine: single-flight FIFO drain with retry and backoff
//! - [`resolver`]: `temp:<item-id>` placeholders rewritten to server ids
//! - Status publisher: cached [`QueueStatus`](clinic_core::QueueStatus)
//!   behind a `watch` channel

mod config;
mod connectivity;
mod engine;
mod error;
mod ledger;
mod manager;
pub mod resolver;
pub mod retry;
pub mod state;
mod status;
mod types;

// Public exports
pub use config::{RetryConfig, SyncConfig};
pub use connectivity::{ConnectivityMonitor, ConnectivityState, OnlineEvents};
pub use error::{Result, SyncError};
pub use manager::{QueueManager, QueueManagerBuilder};
pub use resolver::Resolution;
pub use retry::{Disposition, RetryPolicy};
pub use state::QueueState;
pub use types::{QueueInspection, SyncOutcome, SyncReport, SyncTrigger};
