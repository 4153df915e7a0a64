//! Ledger: the single owner of the in-memory queue state.
//!
//! Mutations are persisted before they count. User-facing changes go through
//! [`Ledger::commit`], which keeps the previous state if the save fails. The
//! sync engine records remote outcomes with [`Ledger::record`]: the server has
//! already acted, so the in-memory state keeps the outcome even if the save
//! fails, and the next successful save catches the store up.

use crate::state::QueueState;
use crate::status::StatusPublisher;
use clinic_core::{ClinicError, QueueStore, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// What `load` found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub items: usize,
    /// Items found mid-sync and put back to pending
    pub recovered: usize,
    /// The persisted state was unreadable and was replaced by an empty queue
    pub discarded_corrupt: bool,
}

pub(crate) struct Ledger {
    state: Mutex<QueueState>,
    store: Arc<dyn QueueStore>,
    status: Arc<StatusPublisher>,
    /// In-memory state is ahead of the store
    dirty: AtomicBool,
}

impl Ledger {
    pub fn new(store: Arc<dyn QueueStore>, status: Arc<StatusPublisher>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            store,
            status,
            dirty: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> &StatusPublisher {
        &self.status
    }

    /// Replace the in-memory state with what the store holds.
    ///
    /// Corrupt persisted state is not fatal: the queue starts empty and a
    /// warning is published. Read failures are returned.
    pub async fn load(&self) -> Result<LoadReport> {
        let (snapshot, discarded_corrupt) = match self.store.load().await {
            Ok(snapshot) => (snapshot, false),
            Err(ClinicError::StoreCorruption(reason)) => {
                error!(error = %reason, "Persisted queue is corrupt, starting empty");
                self.status
                    .warn(format!("Persisted queue was unreadable and was reset: {}", reason));
                (Default::default(), true)
            }
            Err(e) => return Err(e),
        };

        let (loaded, recovered) = QueueState::from_snapshot(snapshot);
        let report = LoadReport {
            items: loaded.items().len(),
            recovered,
            discarded_corrupt,
        };

        let mut state = self.state.lock().await;
        *state = loaded;

        if recovered > 0 {
            warn!(recovered, "Items were interrupted mid-sync, returning them to pending");
            self.persist_best_effort(&state).await;
        }
        self.status.publish_counts(&state.status(false, false));

        info!(
            items = report.items,
            identifiers = state.identifiers().len(),
            "Queue loaded"
        );
        Ok(report)
    }

    /// Apply `f` to a copy of the state and persist it; the change only
    /// becomes visible if the save succeeds.
    pub async fn commit<T>(&self, f: impl FnOnce(&mut QueueState) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let out = f(&mut next)?;

        if let Err(e) = self.store.save(&next.to_snapshot()).await {
            error!(error = %e, "Failed to persist queue change");
            self.status.warn(format!("Queue change was not saved: {}", e));
            return Err(e);
        }
        self.mark_clean();

        *state = next;
        self.status.publish_counts(&state.status(false, false));
        Ok(out)
    }

    /// Apply `f` in place and try to persist.
    ///
    /// The change is kept even when the save fails; the error is returned so
    /// the caller can stop work that would pile more unsaved changes on top.
    pub async fn record<T>(&self, f: impl FnOnce(&mut QueueState) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock().await;
        let out = f(&mut state)?;

        let saved = self.store.save(&state.to_snapshot()).await;
        self.status.publish_counts(&state.status(false, false));

        match saved {
            Ok(()) => {
                self.mark_clean();
                Ok(out)
            }
            Err(e) => {
                self.dirty.store(true, Ordering::SeqCst);
                error!(error = %e, "Failed to persist sync outcome, keeping it in memory");
                self.status
                    .warn(format!("Sync outcome kept in memory only: {}", e));
                Err(e)
            }
        }
    }

    pub async fn read<T>(&self, f: impl FnOnce(&QueueState) -> T) -> T {
        let state = self.state.lock().await;
        f(&state)
    }

    /// Recompute the published counts
    pub async fn refresh(&self) {
        let state = self.state.lock().await;
        self.status.publish_counts(&state.status(false, false));
        self.status.refresh_online();
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    async fn persist_best_effort(&self, state: &QueueState) {
        match self.store.save(&state.to_snapshot()).await {
            Ok(()) => self.mark_clean(),
            Err(e) => {
                self.dirty.store(true, Ordering::SeqCst);
                self.status.warn(format!("Queue change was not saved: {}", e));
            }
        }
    }

    fn mark_clean(&self) {
        if self.dirty.swap(false, Ordering::SeqCst) {
            info!("Store caught up with in-memory queue");
        }
    }
}
