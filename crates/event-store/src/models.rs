//! Canonical change-event model
//!
//! Every connector source (source control, CI, clusters) is normalized into
//! this single record shape before persistence. The `external_id` is the
//! idempotency key: deterministic for a given observed resource version, so
//! re-delivery from the upstream API dedupes naturally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single normalized change event on the incident timeline.
///
/// Constructed once per accepted transition and immutable afterwards.
/// Persisted at most once per `(connection_id, external_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Deterministic dedup key derived from resource identity and version
    pub external_id: String,
    /// Originating connector family, e.g. `kubernetes`
    pub source: String,
    /// Resource kind the event describes, e.g. `Pod`, `Deployment`
    pub kind: String,
    /// Human-readable one-line title, e.g. `[Pod CrashLoopBackOff] api-7f9d`
    pub title: String,
    /// Structured detail body (kind-specific shape)
    pub description: serde_json::Value,
    /// When the change happened upstream
    pub timestamp: DateTime<Utc>,
    /// Stable locator for the resource, e.g. `k8s://prod/default/pods/api-7f9d`
    pub url: String,
    /// Coarse lifecycle status: `added`, `modified`, `deleted`, `warning`, ...
    pub status: String,
    /// Flat, query-friendly tags (cluster, namespace, resource type).
    /// Kept small so existence/filter queries stay cheap.
    pub metadata: serde_json::Value,
    /// Rich structured detail for diagnostics; never queried, only displayed.
    pub event_metadata: serde_json::Value,
    /// The connection this event was ingested through
    pub connection_id: i64,
}

impl ChangeEvent {
    /// Storage key under the `(connection_id, external_id)` uniqueness
    /// constraint.
    #[must_use]
    pub fn storage_key(&self) -> (i64, String) {
        (self.connection_id, self.external_id.clone())
    }
}
