//! Event store errors

use thiserror::Error;

/// Errors that can occur when persisting change events
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying storage backend failed
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Event is missing a field the store requires
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
}
