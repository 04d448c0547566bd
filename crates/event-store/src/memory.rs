//! In-memory ChangeEventStore
//!
//! Mutex-guarded map keyed by `(connection_id, external_id)`. Serves as the
//! reference implementation of the conflict-ignore contract and as the test
//! double for connector unit tests.

use crate::error::StoreError;
use crate::models::ChangeEvent;
use crate::store_trait::{ChangeEventStore, InsertOutcome};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory event store
///
/// Cloning is cheap and clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventStore {
    events: Arc<Mutex<HashMap<(i64, String), ChangeEvent>>>,
}

impl MemoryEventStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether the store holds no events
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all stored events, in no particular order
    #[must_use]
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events
            .lock()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Fetch one stored event by its storage key
    #[must_use]
    pub fn get(&self, connection_id: i64, external_id: &str) -> Option<ChangeEvent> {
        self.events
            .lock()
            .ok()
            .and_then(|m| m.get(&(connection_id, external_id.to_string())).cloned())
    }
}

#[async_trait::async_trait]
impl ChangeEventStore for MemoryEventStore {
    async fn exists_by_external_id(
        &self,
        connection_id: i64,
        external_id: &str,
    ) -> Result<bool, StoreError> {
        let events = self
            .events
            .lock()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))?;
        Ok(events.contains_key(&(connection_id, external_id.to_string())))
    }

    async fn insert(&self, event: ChangeEvent) -> Result<InsertOutcome, StoreError> {
        if event.external_id.is_empty() {
            return Err(StoreError::InvalidEvent("empty external_id".to_string()));
        }
        let mut events = self
            .events
            .lock()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))?;
        // Check and insert under one lock; this is the uniqueness constraint.
        match events.entry(event.storage_key()) {
            std::collections::hash_map::Entry::Occupied(_) => Ok(InsertOutcome::AlreadyExists),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(event);
                Ok(InsertOutcome::Inserted)
            }
        }
    }
}
