//! Connectivity monitor
//!
//! The platform feeds reachability into [`ConnectivityMonitor::report`]
//! (or a [`ReachabilityProbe`](clinic_core::ReachabilityProbe) does it on a
//! timer). Consumers either read the current state or wait for debounced
//! online events.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::info;

/// Result of `get_state`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub is_online: bool,
}

pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
    /// Offline-to-online transitions so far. `tx` only keeps the latest
    /// value, so a quick offline/online pair is invisible there.
    reconnects: watch::Sender<u64>,
    debounce: Duration,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool, debounce: Duration) -> Self {
        let (tx, _) = watch::channel(initially_online);
        let (reconnects, _) = watch::channel(0);
        Self {
            tx,
            reconnects,
            debounce,
        }
    }

    /// Record a reachability observation; repeats of the current state are
    /// ignored
    pub fn report(&self, is_online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            let changed = *current != is_online;
            *current = is_online;
            changed
        });
        if changed {
            if is_online {
                self.reconnects.send_modify(|count| *count += 1);
            }
            info!(is_online, "Connectivity changed");
        }
    }

    pub fn get_state(&self) -> ConnectivityState {
        ConnectivityState {
            is_online: self.is_online(),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Raw state changes, undebounced
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Debounced offline-to-online transitions
    pub fn online_events(&self) -> OnlineEvents {
        let mut state = self.tx.subscribe();
        let mut reconnects = self.reconnects.subscribe();
        state.mark_unchanged();
        let seen = *reconnects.borrow_and_update();
        OnlineEvents {
            state,
            reconnects,
            seen,
            debounce: self.debounce,
            deadline: None,
        }
    }
}

/// Stream of settled online transitions.
///
/// An event fires once the state has stayed online for the whole debounce
/// window after coming back from offline. Going offline inside the window
/// cancels it. The wait state lives in the struct, so dropping a pending
/// `next()` (e.g. in a `select!`) loses nothing.
pub struct OnlineEvents {
    state: watch::Receiver<bool>,
    reconnects: watch::Receiver<u64>,
    /// Last reconnect count acted on
    seen: u64,
    debounce: Duration,
    deadline: Option<Instant>,
}

impl OnlineEvents {
    /// Wait for the next event. Returns `None` once the monitor is dropped.
    pub async fn next(&mut self) -> Option<()> {
        loop {
            let deadline = self.deadline;
            let settled = async move {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                () = settled => {
                    self.deadline = None;
                    return Some(());
                }
                changed = self.state.changed() => {
                    changed.ok()?;
                    self.observe();
                }
                changed = self.reconnects.changed() => {
                    changed.ok()?;
                    self.observe();
                }
            }
        }
    }

    fn observe(&mut self) {
        let online = *self.state.borrow_and_update();
        let count = *self.reconnects.borrow_and_update();
        let reconnected = count != self.seen;
        self.seen = count;

        if !online {
            self.deadline = None;
        } else if reconnected {
            // Restart the window from the latest reconnect
            self.deadline = Some(Instant::now() + self.debounce);
        }
    }
}
