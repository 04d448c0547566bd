//! ChangeEventStore trait for persistence backends
//!
//! This trait abstracts the event store so connectors can be unit tested
//! against an in-memory implementation. A relational backend implements the
//! same contract with a unique index on `(connection_id, external_id)` and a
//! conflict-ignoring insert.

use crate::error::StoreError;
use crate::models::ChangeEvent;

/// Result of a conflict-ignoring insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The event was stored
    Inserted,
    /// A record with the same `(connection_id, external_id)` already exists;
    /// the insert was a no-op
    AlreadyExists,
}

/// Trait for change-event persistence
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ChangeEventStore: Send + Sync {
    /// Check whether an event with this external id was already stored
    /// through the given connection.
    async fn exists_by_external_id(
        &self,
        connection_id: i64,
        external_id: &str,
    ) -> Result<bool, StoreError>;

    /// Insert an event, ignoring duplicates.
    ///
    /// Implementations must treat `(connection_id, external_id)` as unique
    /// and report a duplicate as `InsertOutcome::AlreadyExists`, never as an
    /// error and never as an update of the stored record.
    async fn insert(&self, event: ChangeEvent) -> Result<InsertOutcome, StoreError>;
}
