//! Idempotent event sink.
//!
//! Check-then-insert against the event store. The store's insert carries the
//! conflict-ignore contract of a unique `(connection_id, external_id)` index,
//! so a duplicate slipping past the existence check (two overlapping cycles
//! observing the same transition) degrades to a skip, never a duplicate row
//! and never an error.

use event_store::{ChangeEventStore, InsertOutcome, StoreError};
use std::sync::Arc;
use tracing::debug;

/// Result of persisting one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The event was stored
    Stored,
    /// An event with the same external id already exists; nothing written
    Skipped,
}

/// Writes canonical events exactly once per external id.
#[derive(Clone)]
pub struct IdempotentSink {
    store: Arc<dyn ChangeEventStore>,
}

impl IdempotentSink {
    /// Wrap a persistence backend
    pub fn new(store: Arc<dyn ChangeEventStore>) -> Self {
        Self { store }
    }

    /// Persist an event at most once.
    ///
    /// Events are immutable once stored; a duplicate is a no-op, not an
    /// update.
    pub async fn persist(&self, event: event_store::ChangeEvent) -> Result<PersistOutcome, StoreError> {
        let external_id = event.external_id.clone();
        if self
            .store
            .exists_by_external_id(event.connection_id, &external_id)
            .await?
        {
            debug!("Event already recorded, skipping: {external_id}");
            return Ok(PersistOutcome::Skipped);
        }
        match self.store.insert(event).await? {
            InsertOutcome::Inserted => Ok(PersistOutcome::Stored),
            InsertOutcome::AlreadyExists => {
                debug!("Lost insert race for {external_id}, skipping");
                Ok(PersistOutcome::Skipped)
            }
        }
    }
}

impl std::fmt::Debug for IdempotentSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotentSink").finish_non_exhaustive()
    }
}
