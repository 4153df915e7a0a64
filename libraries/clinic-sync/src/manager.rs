use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityMonitor, OnlineEvents};
use crate::engine::SyncEngine;
use crate::error::{Result, SyncError};
use crate::ledger::Ledger;
use crate::retry::RetryPolicy;
use crate::status::StatusPublisher;
use crate::types::{QueueInspection, SyncOutcome, SyncTrigger};
use chrono::Utc;
use clinic_core::{
    ItemId, Operation, QueueItem, QueueStatus, QueueStore, ReachabilityProbe, RemoteApi, Resource,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The application's entry point to the offline queue.
///
/// Cloning is cheap and every clone drives the same queue.
///
/// # Example
///
/// ```ignore
/// let manager = QueueManager::builder(store, remote).config(config).build();
/// manager.initialize().await?;
///
/// let id = manager
///     .enqueue(Resource::Patient, Operation::Create, json!({ "nombre": "Ana" }))
///     .await?;
/// let status = manager.get_status().await;
/// ```
#[derive(Clone)]
pub struct QueueManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: SyncConfig,
    ledger: Arc<Ledger>,
    engine: Arc<SyncEngine>,
    monitor: Arc<ConnectivityMonitor>,
    probe: Option<Arc<dyn ReachabilityProbe>>,
    shutdown: CancellationToken,
    loaded: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
}

enum Lifecycle {
    Created,
    Running(Vec<JoinHandle<()>>),
    Stopped,
}

/// Builder for [`QueueManager`]
pub struct QueueManagerBuilder {
    store: Arc<dyn QueueStore>,
    remote: Arc<dyn RemoteApi>,
    config: SyncConfig,
    monitor: Option<Arc<ConnectivityMonitor>>,
    probe: Option<Arc<dyn ReachabilityProbe>>,
}

impl QueueManagerBuilder {
    #[must_use]
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an existing monitor, e.g. one the platform layer already feeds.
    /// Without one the manager starts out assuming it is online.
    #[must_use]
    pub fn monitor(mut self, monitor: Arc<ConnectivityMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Poll `probe` on `probe_interval_ms` and feed the result to the monitor
    #[must_use]
    pub fn probe(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn build(self) -> QueueManager {
        let monitor = self.monitor.unwrap_or_else(|| {
            Arc::new(ConnectivityMonitor::new(
                true,
                self.config.connectivity_debounce(),
            ))
        });
        let status = Arc::new(StatusPublisher::new(monitor.watch()));
        let ledger = Arc::new(Ledger::new(self.store, status));
        let shutdown = CancellationToken::new();
        let engine = Arc::new(SyncEngine::new(
            ledger.clone(),
            self.remote,
            RetryPolicy::from_config(&self.config.retry),
            self.config.request_timeout(),
            shutdown.clone(),
        ));

        QueueManager {
            inner: Arc::new(Inner {
                config: self.config,
                ledger,
                engine,
                monitor,
                probe: self.probe,
                shutdown,
                loaded: AtomicBool::new(false),
                lifecycle: Mutex::new(Lifecycle::Created),
            }),
        }
    }
}

impl QueueManager {
    pub fn builder(store: Arc<dyn QueueStore>, remote: Arc<dyn RemoteApi>) -> QueueManagerBuilder {
        QueueManagerBuilder {
            store,
            remote,
            config: SyncConfig::default(),
            monitor: None,
            probe: None,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// The monitor the platform layer reports reachability to
    pub fn connectivity(&self) -> Arc<ConnectivityMonitor> {
        self.inner.monitor.clone()
    }

    /// Load persisted state and start the background timers.
    ///
    /// Calling it again is a no-op; the timers are only started once.
    pub async fn initialize(&self) -> Result<()> {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::Running(_) => {
                debug!("Queue manager already initialized");
                return Ok(());
            }
            Lifecycle::Stopped => return Err(SyncError::ShutDown),
            Lifecycle::Created => {}
        }

        let report = self.inner.ledger.load().await?;
        self.inner.loaded.store(true, Ordering::SeqCst);
        self.inner.ledger.refresh().await;

        // Subscribe before the probe can report, so no transition is missed
        let mut tasks = vec![tokio::spawn(
            Supervisor {
                engine: self.inner.engine.clone(),
                ledger: self.inner.ledger.clone(),
                online_events: self.inner.monitor.online_events(),
                connectivity: self.inner.monitor.watch(),
                monitor: self.inner.monitor.clone(),
                config: self.inner.config.clone(),
                shutdown: self.inner.shutdown.clone(),
            }
            .run(),
        )];

        if let (Some(probe), Some(every)) =
            (&self.inner.probe, self.inner.config.probe_interval())
        {
            tasks.push(tokio::spawn(probe_loop(
                probe.clone(),
                self.inner.monitor.clone(),
                every,
                self.inner.shutdown.clone(),
            )));
        }

        *lifecycle = Lifecycle::Running(tasks);
        info!(
            items = report.items,
            recovered = report.recovered,
            discarded_corrupt = report.discarded_corrupt,
            "Queue manager initialized"
        );
        Ok(())
    }

    /// Queue an intent. Returns as soon as it is persisted; never waits on
    /// the network.
    pub async fn enqueue(
        &self,
        resource: Resource,
        operation: Operation,
        payload: Value,
    ) -> Result<ItemId> {
        self.ensure_loaded()?;
        let item = QueueItem::new(resource, operation, payload);
        let id = self.inner.ledger.commit(|s| s.push(item)).await?;
        debug!(item_id = %id, resource = %resource, operation = %operation, "Enqueued");
        Ok(id)
    }

    /// Freshly computed status
    pub async fn get_status(&self) -> QueueStatus {
        self.inner.ledger.refresh().await;
        let mut status = self.inner.ledger.status().current();
        status.syncing = self.inner.engine.is_syncing();
        status
    }

    /// Status changes as they are published
    pub fn subscribe(&self) -> watch::Receiver<QueueStatus> {
        self.inner.ledger.status().subscribe()
    }

    /// Every item in FIFO order
    pub async fn get_queue(&self) -> Vec<QueueItem> {
        self.inner.ledger.read(|s| s.items().to_vec()).await
    }

    pub async fn get_item(&self, id: &ItemId) -> Option<QueueItem> {
        self.inner.ledger.read(|s| s.get(id).cloned()).await
    }

    /// Debug view: items, identifier table and status together
    pub async fn inspect(&self) -> QueueInspection {
        let status = self.get_status().await;
        let (items, identifiers) = self
            .inner
            .ledger
            .read(|s| (s.items().to_vec(), s.identifiers().clone()))
            .await;
        QueueInspection {
            status,
            items,
            identifiers,
            unsaved_changes: self.inner.ledger.is_dirty(),
            inspected_at: Utc::now(),
        }
    }

    /// Remove every item, failed ones included, and the identifier table.
    /// Only ever called on explicit user request.
    pub async fn clear_queue(&self) -> Result<usize> {
        self.ensure_loaded()?;
        let removed = self.inner.ledger.commit(|s| Ok(s.clear())).await?;
        warn!(removed, "Queue cleared");
        Ok(removed)
    }

    /// Discard one item. Items that depend on it fail on the next pass.
    pub async fn remove_item(&self, id: &ItemId) -> Result<QueueItem> {
        self.ensure_loaded()?;
        let removed = self.inner.ledger.commit(|s| s.remove(id)).await?;
        info!(item_id = %id, status = %removed.status, "Queue item discarded");
        Ok(removed)
    }

    /// Put a failed item back in line
    pub async fn retry_item(&self, id: &ItemId) -> Result<()> {
        self.ensure_loaded()?;
        self.inner.ledger.commit(|s| s.retry(id)).await?;
        info!(item_id = %id, "Queue item reset for retry");
        Ok(())
    }

    pub async fn retry_failed(&self) -> Result<usize> {
        self.ensure_loaded()?;
        let count = self.inner.ledger.commit(|s| Ok(s.retry_failed())).await?;
        info!(count, "Failed items reset for retry");
        Ok(count)
    }

    /// Drop completed items
    pub async fn compact(&self) -> Result<usize> {
        self.ensure_loaded()?;
        let removed = self.inner.ledger.commit(|s| Ok(s.compact())).await?;
        info!(removed, "Queue compacted");
        Ok(removed)
    }

    /// Run a sync pass now
    pub async fn sync_queue(&self) -> Result<SyncOutcome> {
        self.ensure_loaded()?;
        if !self.inner.monitor.is_online() {
            debug!("Offline, not syncing");
            return Ok(SyncOutcome::Offline);
        }
        self.inner.engine.spawn_run(SyncTrigger::Manual).await
    }

    /// Abort the running pass after its current item. Returns false if
    /// nothing was running.
    pub async fn cancel_sync(&self) -> bool {
        self.inner.engine.cancel().await
    }

    /// Stop the timers, abort any pass and wait for it to let go
    pub async fn shutdown(&self) {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        self.inner.shutdown.cancel();

        if let Lifecycle::Running(tasks) = std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            for task in tasks {
                if let Err(e) = task.await {
                    warn!(error = %e, "Background task ended abnormally");
                }
            }
        }
        self.inner.engine.wait_idle().await;
        info!("Queue manager shut down");
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.inner.loaded.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::NotInitialized)
        }
    }
}

/// Background loop: periodic passes, status refresh, and a pass whenever
/// connectivity settles back online
struct Supervisor {
    engine: Arc<SyncEngine>,
    ledger: Arc<Ledger>,
    monitor: Arc<ConnectivityMonitor>,
    online_events: OnlineEvents,
    connectivity: watch::Receiver<bool>,
    config: SyncConfig,
    shutdown: CancellationToken,
}

impl Supervisor {
    async fn run(mut self) {
        debug!("Queue supervisor started");

        let mut sync_tick = interval(self.config.sync_interval());
        sync_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        sync_tick.tick().await; // skip immediate tick

        let mut refresh_tick = interval(self.config.status_refresh_interval());
        refresh_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,

                _ = sync_tick.tick() => {
                    if self.monitor.is_online() {
                        self.spawn_pass(SyncTrigger::Scheduled);
                    }
                }

                _ = refresh_tick.tick() => self.ledger.refresh().await,

                Some(()) = self.online_events.next() => {
                    info!("Back online, syncing");
                    self.spawn_pass(SyncTrigger::ConnectivityRestored);
                }

                Ok(()) = self.connectivity.changed() => self.ledger.refresh().await,
            }
        }

        debug!("Queue supervisor stopped");
    }

    fn spawn_pass(&self, trigger: SyncTrigger) {
        let engine = self.engine.clone();
        tokio::spawn(async move {
            match engine.run(trigger).await {
                Ok(outcome) => debug!(?trigger, ?outcome, "Background sync finished"),
                Err(SyncError::ShutDown) => {}
                Err(e) => warn!(?trigger, error = %e, "Background sync failed"),
            }
        });
    }
}

async fn probe_loop(
    probe: Arc<dyn ReachabilityProbe>,
    monitor: Arc<ConnectivityMonitor>,
    every: Duration,
    shutdown: CancellationToken,
) {
    let mut tick = interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = tick.tick() => {
                let reachable = probe.probe().await;
                monitor.report(reachable);
            }
        }
    }
}
