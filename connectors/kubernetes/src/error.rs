//! Connector-specific error types.
//!
//! Setup and authentication failures are fatal to a whole ingestion cycle;
//! everything downstream of an open watch session is handled locally and
//! never surfaces through these.

use event_store::StoreError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the Kubernetes connector.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Client configuration could not be built or inferred
    #[error("Kubernetes configuration error: {0}")]
    KubeConfig(String),

    /// Invalid connector configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Event store error
    #[error("Event store error: {0}")]
    Store(#[from] StoreError),
}
