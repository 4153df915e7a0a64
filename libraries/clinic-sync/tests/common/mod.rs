//! Shared fixtures for the sync integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use clinic_core::{
    ItemId, Operation, QueueStore, RemoteApi, RemoteError, RemoteReceipt, RemoteRequest, ServerId,
};
use clinic_sync::{ConnectivityMonitor, QueueManager, RetryConfig, SyncConfig};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted stand-in for the records API.
///
/// Calls consume scripted responses first; once the script is empty every
/// call succeeds, creates getting ids counting up from 77. Creates are
/// deduplicated by idempotency key the way a well-behaved server would.
#[derive(Default)]
pub struct FakeRemote {
    script: Mutex<VecDeque<Result<RemoteReceipt, RemoteError>>>,
    requests: Mutex<Vec<RemoteRequest>>,
    created: Mutex<HashMap<ItemId, ServerId>>,
    delay: Mutex<Duration>,
    next_id: Mutex<i64>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: Mutex::new(77),
            ..Self::default()
        })
    }

    pub fn push(&self, response: Result<RemoteReceipt, RemoteError>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn fail_network(&self, times: usize) {
        for _ in 0..times {
            self.push(Err(RemoteError::Network("connection refused".into())));
        }
    }

    pub fn reject(&self, status: u16) {
        self.push(Err(RemoteError::Rejected {
            status,
            message: "validation failed".into(),
        }));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn requests(&self) -> Vec<RemoteRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Distinct records created server-side
    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn submit(&self, request: &RemoteRequest) -> Result<RemoteReceipt, RemoteError> {
        self.requests.lock().unwrap().push(request.clone());

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(scripted) = self.script.lock().unwrap().pop_front() {
            return scripted;
        }

        let server_id = match request.operation {
            Operation::Create => {
                let mut created = self.created.lock().unwrap();
                let id = created
                    .entry(request.idempotency_key.clone())
                    .or_insert_with(|| {
                        let mut next = self.next_id.lock().unwrap();
                        let id = ServerId::Int(*next);
                        *next += 1;
                        id
                    })
                    .clone();
                Some(id)
            }
            Operation::Update | Operation::Delete => None,
        };

        Ok(RemoteReceipt {
            status: if server_id.is_some() { 201 } else { 200 },
            server_id,
        })
    }
}

/// Config with short backoff so retries are due again within a test
pub fn fast_config() -> SyncConfig {
    SyncConfig {
        connectivity_debounce_ms: 3_000,
        probe_interval_ms: None,
        retry: RetryConfig {
            max_retries: 3,
            base_delay_ms: 20,
            max_delay_ms: 1_000,
        },
        ..SyncConfig::default()
    }
}

pub fn manager(store: Arc<dyn QueueStore>, remote: Arc<FakeRemote>) -> QueueManager {
    QueueManager::builder(store, remote)
        .config(fast_config())
        .build()
}

pub fn manager_with_monitor(
    store: Arc<dyn QueueStore>,
    remote: Arc<FakeRemote>,
    monitor: Arc<ConnectivityMonitor>,
) -> QueueManager {
    QueueManager::builder(store, remote)
        .config(fast_config())
        .monitor(monitor)
        .build()
}

/// Longer than the first few backoff steps of `fast_config`
pub async fn wait_out_backoff() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}
