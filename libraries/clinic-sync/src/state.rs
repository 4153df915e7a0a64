//! In-memory queue state and its transitions
//!
//! Every transition the queue manager or sync engine makes goes through a
//! method here. Nothing in this module performs I/O; the ledger persists the
//! result.

use chrono::{DateTime, Utc};
use clinic_core::{
    ClinicError, ErrorKind, IdentifierTable, ItemError, ItemId, ItemStatus, Operation, QueueItem,
    QueueSnapshot, QueueStatus, Result, ServerId,
};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueState {
    items: Vec<QueueItem>,
    identifiers: IdentifierTable,
}

impl QueueState {
    /// Rebuild state from a persisted snapshot.
    ///
    /// Items left in `syncing` by a crash are returned to `pending`; the
    /// second value counts them.
    pub fn from_snapshot(snapshot: QueueSnapshot) -> (Self, usize) {
        let QueueSnapshot {
            mut items,
            identifiers,
        } = snapshot;

        let mut recovered = 0;
        for item in &mut items {
            if item.status == ItemStatus::Syncing {
                item.status = ItemStatus::Pending;
                recovered += 1;
            }
        }
        items.sort_by_key(|item| item.timestamp);

        (Self { items, identifiers }, recovered)
    }

    pub fn to_snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            items: self.items.clone(),
            identifiers: self.identifiers.clone(),
        }
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn identifiers(&self) -> &IdentifierTable {
        &self.identifiers
    }

    pub fn get(&self, id: &ItemId) -> Option<&QueueItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    fn get_mut(&mut self, id: &ItemId) -> Result<&mut QueueItem> {
        self.items
            .iter_mut()
            .find(|item| &item.id == id)
            .ok_or_else(|| ClinicError::ItemNotFound(id.clone()))
    }

    pub fn status(&self, syncing: bool, is_online: bool) -> QueueStatus {
        QueueStatus::from_items(&self.items, syncing, is_online)
    }

    /// Append a validated item.
    ///
    /// Timestamps never go backwards, so insertion order and FIFO order
    /// agree even if the wall clock steps back.
    pub fn push(&mut self, mut item: QueueItem) -> Result<ItemId> {
        item.validate()?;
        self.check_references(&item)?;

        if let Some(last) = self.items.last() {
            if item.timestamp < last.timestamp {
                item.timestamp = last.timestamp;
            }
        }

        let id = item.id.clone();
        self.items.push(item);
        Ok(id)
    }

    /// Placeholders must point at a `create` still in the queue or one whose
    /// identifier is already known.
    fn check_references(&self, item: &QueueItem) -> Result<()> {
        for placeholder in item.dependencies() {
            let producer_id = placeholder.item_id();
            if self.identifiers.get(producer_id).is_some() {
                continue;
            }

            let reason = match self.get(producer_id) {
                Some(producer) if producer.operation == Operation::Create => continue,
                Some(producer) => format!(
                    "`{}` refers to a {} item, which produces no identifier",
                    placeholder, producer.operation
                ),
                None => format!("`{}` does not name a queued item", placeholder),
            };

            return Err(ClinicError::InvalidPayload {
                resource: item.resource.to_string(),
                operation: item.operation.to_string(),
                reason,
            });
        }
        Ok(())
    }

    /// Pending items whose backoff has elapsed, oldest first
    pub fn due_items(&self, now: DateTime<Utc>) -> Vec<ItemId> {
        let mut due: Vec<&QueueItem> = self
            .items
            .iter()
            .filter(|item| item.status == ItemStatus::Pending && item.is_due(now))
            .collect();
        due.sort_by_key(|item| item.timestamp);
        due.into_iter().map(|item| item.id.clone()).collect()
    }

    /// Pending items still inside their backoff window
    pub fn backing_off(&self, now: DateTime<Utc>) -> usize {
        self.items
            .iter()
            .filter(|item| item.status == ItemStatus::Pending && !item.is_due(now))
            .count()
    }

    pub fn mark_syncing(&mut self, id: &ItemId, now: DateTime<Utc>) -> Result<()> {
        if let Some(other) = self
            .items
            .iter()
            .find(|item| item.status == ItemStatus::Syncing && &item.id != id)
        {
            return Err(ClinicError::invalid_state(format!(
                "item {} is already syncing",
                other.id
            )));
        }

        let item = self.get_mut(id)?;
        if item.status != ItemStatus::Pending {
            return Err(ClinicError::invalid_state(format!(
                "item {} is {}, not pending",
                id, item.status
            )));
        }
        item.status = ItemStatus::Syncing;
        item.last_attempt_at = Some(now);
        Ok(())
    }

    /// Record a successful transmission.
    ///
    /// A create's identifier goes into the resolution table in the same step,
    /// so the table never names an item that is not completed.
    pub fn complete(&mut self, id: &ItemId, server_id: Option<ServerId>) -> Result<()> {
        let item = self.get_mut(id)?;
        item.status = ItemStatus::Completed;
        item.consecutive_failures = 0;
        item.last_error = None;
        item.next_attempt_at = None;

        if item.operation == Operation::Create {
            if let Some(server_id) = server_id {
                item.server_id = Some(server_id.clone());
                self.identifiers.insert(id.clone(), server_id);
            }
        }
        Ok(())
    }

    /// Transient failure: back to `pending` until `next_attempt_at`
    pub fn reschedule(
        &mut self,
        id: &ItemId,
        error: ItemError,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<()> {
        let item = self.get_mut(id)?;
        item.status = ItemStatus::Pending;
        item.retry_count += 1;
        item.consecutive_failures += 1;
        item.last_error = Some(error);
        item.next_attempt_at = Some(next_attempt_at);
        Ok(())
    }

    /// Terminal failure
    pub fn fail(&mut self, id: &ItemId, error: ItemError) -> Result<()> {
        let item = self.get_mut(id)?;
        // The exhausting failure is itself a counted attempt
        if error.kind == ErrorKind::RetriesExhausted {
            item.retry_count += 1;
            item.consecutive_failures += 1;
        }
        item.status = ItemStatus::Failed;
        item.next_attempt_at = None;
        item.last_error = Some(error);
        Ok(())
    }

    /// Undo `mark_syncing` when no attempt was made
    pub fn release(&mut self, id: &ItemId) -> Result<()> {
        let item = self.get_mut(id)?;
        if item.status == ItemStatus::Syncing {
            item.status = ItemStatus::Pending;
        }
        Ok(())
    }

    /// Manual reset of a failed item
    pub fn retry(&mut self, id: &ItemId) -> Result<()> {
        let item = self.get_mut(id)?;
        if item.status != ItemStatus::Failed {
            return Err(ClinicError::invalid_state(format!(
                "only failed items can be retried; {} is {}",
                id, item.status
            )));
        }
        reset(item);
        Ok(())
    }

    pub fn retry_failed(&mut self) -> usize {
        let mut count = 0;
        for item in self
            .items
            .iter_mut()
            .filter(|item| item.status == ItemStatus::Failed)
        {
            reset(item);
            count += 1;
        }
        count
    }

    /// Discard one item. An item mid-transmission cannot be removed.
    pub fn remove(&mut self, id: &ItemId) -> Result<QueueItem> {
        let index = self
            .items
            .iter()
            .position(|item| &item.id == id)
            .ok_or_else(|| ClinicError::ItemNotFound(id.clone()))?;

        if self.items[index].status == ItemStatus::Syncing {
            return Err(ClinicError::invalid_state(format!(
                "item {} is being synced",
                id
            )));
        }
        Ok(self.items.remove(index))
    }

    /// Drop completed items and the identifier mappings nothing refers to
    /// any more. Returns the number of items removed.
    pub fn compact(&mut self) -> usize {
        let before = self.items.len();
        self.items
            .retain(|item| item.status != ItemStatus::Completed);

        let referenced: HashSet<ItemId> = self
            .items
            .iter()
            .flat_map(|item| item.dependencies())
            .map(|placeholder| placeholder.item_id().clone())
            .collect();
        self.identifiers
            .retain(|local, _| referenced.contains(local));

        before - self.items.len()
    }

    /// Remove every item and mapping. Returns the number of items removed.
    pub fn clear(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        self.identifiers.clear();
        count
    }
}

fn reset(item: &mut QueueItem) {
    item.status = ItemStatus::Pending;
    item.retry_count += 1;
    item.consecutive_failures = 0;
    item.last_error = None;
    item.next_attempt_at = None;
}
