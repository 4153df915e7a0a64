//! Sync engine
//!
//! Drains the queue against the remote API. One pass at a time: a trigger
//! that arrives mid-pass is folded into a single follow-up pass. Items are
//! visited oldest first; an item waiting on a parent is skipped without
//! holding up the rest.

use crate::error::{Result, SyncError};
use crate::ledger::Ledger;
use crate::resolver::{self, Resolution};
use crate::retry::{Disposition, RetryPolicy};
use crate::state::QueueState;
use crate::types::{SyncOutcome, SyncReport, SyncTrigger};
use chrono::{DateTime, Utc};
use clinic_core::{
    ErrorKind, ItemError, ItemId, ItemStatus, Operation, QueueItem, RemoteApi, RemoteError,
    RemoteRequest,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub(crate) struct SyncEngine {
    ledger: Arc<Ledger>,
    remote: Arc<dyn RemoteApi>,
    policy: RetryPolicy,
    request_timeout: Duration,
    /// Held for the duration of a run
    flight: Mutex<()>,
    /// A trigger arrived while a pass was running
    rerun: AtomicBool,
    shutdown: CancellationToken,
    current: Mutex<Option<CancellationToken>>,
}

impl SyncEngine {
    pub fn new(
        ledger: Arc<Ledger>,
        remote: Arc<dyn RemoteApi>,
        policy: RetryPolicy,
        request_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            ledger,
            remote,
            policy,
            request_timeout,
            flight: Mutex::new(()),
            rerun: AtomicBool::new(false),
            shutdown,
            current: Mutex::new(None),
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.flight.try_lock().is_err()
    }

    /// Run a pass on a task of its own.
    ///
    /// Dropping the returned future leaves the pass running to the end, so an
    /// item is never stranded in `syncing` by a caller that gave up waiting.
    pub async fn spawn_run(self: &Arc<Self>, trigger: SyncTrigger) -> Result<SyncOutcome> {
        let engine = Arc::clone(self);
        match tokio::spawn(async move { engine.run(trigger).await }).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(SyncError::ShutDown),
        }
    }

    /// Run a sync pass, or coalesce into the one already running
    pub async fn run(&self, trigger: SyncTrigger) -> Result<SyncOutcome> {
        if self.shutdown.is_cancelled() {
            return Err(SyncError::ShutDown);
        }

        let Ok(mut flight) = self.flight.try_lock() else {
            self.rerun.store(true, Ordering::SeqCst);
            debug!(?trigger, "Sync pass already running, coalescing trigger");
            return Ok(SyncOutcome::Coalesced);
        };

        let started = Instant::now();
        info!(?trigger, "Sync pass started");

        let mut total = SyncReport::default();
        let result = loop {
            self.ledger.status().set_syncing(true);
            let result = self.passes(&mut total).await;
            *self.current.lock().await = None;
            self.ledger.status().set_syncing(false);
            drop(flight);

            if matches!(result, Ok(true)) {
                if let Some(next) = self.reclaim_for_rerun() {
                    debug!("Running coalesced follow-up pass");
                    flight = next;
                    continue;
                }
            }
            break result;
        };
        total.duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(finished) => {
                self.ledger.status().set_last_sync(Utc::now());
                info!(
                    attempted = total.attempted,
                    completed = total.completed,
                    rescheduled = total.rescheduled,
                    failed = total.failed,
                    deferred = total.deferred,
                    duration_ms = total.duration_ms,
                    "Sync pass {}",
                    if finished { "finished" } else { "cancelled" }
                );
                Ok(if finished {
                    SyncOutcome::Completed(total)
                } else {
                    SyncOutcome::Cancelled(total)
                })
            }
            Err(e) => {
                error!(error = %e, "Sync pass aborted");
                Err(e)
            }
        }
    }

    /// Take the flight back for a trigger that was coalesced after the last
    /// check but before the release. `None` if nothing is waiting or another
    /// run already holds it, in which case that run serves the trigger.
    fn reclaim_for_rerun(&self) -> Option<MutexGuard<'_, ()>> {
        if self.rerun.load(Ordering::SeqCst) {
            self.flight.try_lock().ok()
        } else {
            None
        }
    }

    /// Drain until no trigger is waiting. Returns false if cancelled.
    async fn passes(&self, total: &mut SyncReport) -> Result<bool> {
        loop {
            self.rerun.store(false, Ordering::SeqCst);
            let token = self.shutdown.child_token();
            *self.current.lock().await = Some(token.clone());

            let report = self.drain(&token).await?;
            total.absorb(&report);

            if token.is_cancelled() {
                return Ok(false);
            }
            if !self.rerun.swap(false, Ordering::SeqCst) {
                return Ok(true);
            }
            debug!("Running coalesced follow-up pass");
        }
    }

    /// Abort the running pass after the item in flight. Returns false if no
    /// pass was running.
    pub async fn cancel(&self) -> bool {
        match self.current.lock().await.as_ref() {
            Some(token) => {
                info!("Cancelling sync pass");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Wait until no pass is running
    pub async fn wait_idle(&self) {
        let _flight = self.flight.lock().await;
    }

    async fn drain(&self, token: &CancellationToken) -> Result<SyncReport> {
        let now = Utc::now();
        let (plan, backing_off) = self
            .ledger
            .read(|s| (s.due_items(now), s.backing_off(now)))
            .await;

        let mut report = SyncReport {
            backing_off,
            passes: 1,
            ..SyncReport::default()
        };
        debug!(due = plan.len(), backing_off, "Planned sync pass");

        for id in plan {
            if token.is_cancelled() {
                info!("Sync pass cancelled between items");
                break;
            }

            // Re-read: the item may have been removed or changed since planning
            let step = self
                .ledger
                .read(|s| {
                    s.get(&id)
                        .filter(|item| item.status == ItemStatus::Pending)
                        .map(|item| (item.clone(), resolver::resolve(item, s)))
                })
                .await;
            let Some((item, resolution)) = step else {
                continue;
            };

            match resolution {
                Resolution::Deferred { waiting_on } => {
                    debug!(item_id = %id, waiting_on = %waiting_on, "Waiting on parent item");
                    report.deferred += 1;
                }
                Resolution::Blocked { parent, reason } => {
                    warn!(
                        item_id = %id,
                        parent = %parent,
                        reason = %reason,
                        "Dependency can never resolve"
                    );
                    let error = ItemError::new(ErrorKind::UnresolvedDependency, reason);
                    self.settle(&id, |s| s.fail(&id, error)).await?;
                    report.failed += 1;
                }
                Resolution::Ready(payload) => {
                    self.transmit(item, payload, &mut report).await?;
                }
            }
        }

        Ok(report)
    }

    async fn transmit(
        &self,
        item: QueueItem,
        payload: Value,
        report: &mut SyncReport,
    ) -> Result<()> {
        let id = item.id.clone();
        self.ledger
            .commit(|s| s.mark_syncing(&id, Utc::now()))
            .await?;
        report.attempted += 1;

        debug!(
            item_id = %id,
            resource = %item.resource,
            operation = %item.operation,
            attempt = item.retry_count + 1,
            "Sending queue item"
        );

        let request = RemoteRequest {
            idempotency_key: id.clone(),
            resource: item.resource,
            operation: item.operation,
            payload,
        };
        let result = self.call(&request).await;

        match result {
            Ok(server_id) => {
                debug!(item_id = %id, server_id = ?server_id, "Queue item synced");
                self.settle(&id, |s| s.complete(&id, server_id)).await?;
                report.completed += 1;
            }
            Err(err) => match self.policy.decide(item.consecutive_failures, &err) {
                Disposition::Retry { delay } => {
                    warn!(
                        item_id = %id,
                        error = %err,
                        retry_in_ms = delay.as_millis() as u64,
                        "Transient failure, will retry"
                    );
                    let next_attempt_at = after(Utc::now(), delay);
                    let error = item_error(ErrorKind::NetworkError, &err, err.to_string());
                    self.settle(&id, |s| s.reschedule(&id, error, next_attempt_at))
                        .await?;
                    report.rescheduled += 1;
                }
                Disposition::Fail(kind) => {
                    let message = match kind {
                        ErrorKind::RetriesExhausted => format!(
                            "gave up after {} consecutive failures: {}",
                            item.consecutive_failures + 1,
                            err
                        ),
                        _ => err.to_string(),
                    };
                    warn!(item_id = %id, error = %err, kind = %kind, "Queue item failed");
                    let error = item_error(kind, &err, message);
                    self.settle(&id, |s| s.fail(&id, error)).await?;
                    report.failed += 1;
                }
            },
        }
        Ok(())
    }

    /// One remote call under the engine's own timeout
    async fn call(
        &self,
        request: &RemoteRequest,
    ) -> std::result::Result<Option<clinic_core::ServerId>, RemoteError> {
        let limit = self.request_timeout;
        let receipt = tokio::time::timeout(limit, self.remote.submit(request))
            .await
            .unwrap_or_else(|_| Err(RemoteError::Timeout(limit.as_millis() as u64)))?;

        if request.operation == Operation::Create && receipt.server_id.is_none() {
            return Err(RemoteError::InvalidResponse(
                "create response carried no identifier".into(),
            ));
        }
        Ok(receipt.server_id)
    }

    /// Record an outcome for an item that may have been cleared meanwhile
    async fn settle(
        &self,
        id: &ItemId,
        f: impl FnOnce(&mut QueueState) -> clinic_core::Result<()>,
    ) -> Result<()> {
        let applied = self
            .ledger
            .record(|s| {
                if s.get(id).is_some() {
                    f(s).map(|()| true)
                } else {
                    Ok(false)
                }
            })
            .await?;
        if !applied {
            debug!(item_id = %id, "Item left the queue while in flight, outcome dropped");
        }
        Ok(())
    }
}

fn after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn item_error(kind: ErrorKind, err: &RemoteError, message: String) -> ItemError {
    let status = match err {
        RemoteError::Server { status, .. } | RemoteError::Rejected { status, .. } => Some(*status),
        _ => None,
    };
    ItemError::new(kind, message).with_status(status)
}
