//! Consume-classify-transform-persist pipeline.
//!
//! One pipeline instance is shared by every watch session of a cycle. Each
//! raw transition is diffed against the fingerprint cache, gated by the
//! significance classifier, normalized by the canonical transformer, and
//! handed to the idempotent sink.

use crate::cache::FingerprintCache;
use crate::classify::{CacheUpdate, SERVICE_ACCOUNT_TOKEN_TYPE, classify};
use crate::error::ConnectorError;
use crate::sink::{IdempotentSink, PersistOutcome};
use crate::snapshot::{ChangeKind, ResourceIdentity, ResourceSnapshot};
use crate::transform::{TransformContext, transform};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared per-connection ingestion pipeline.
pub struct Pipeline {
    ctx: TransformContext,
    cache: Arc<dyn FingerprintCache>,
    sink: IdempotentSink,
}

impl Pipeline {
    /// Assemble a pipeline for one connection to one cluster.
    pub fn new(
        cluster: impl Into<String>,
        connection_id: i64,
        cache: Arc<dyn FingerprintCache>,
        sink: IdempotentSink,
    ) -> Self {
        Self {
            ctx: TransformContext {
                cluster: cluster.into(),
                connection_id,
            },
            cache,
            sink,
        }
    }

    /// Process one raw transition.
    ///
    /// Returns `None` when the transition was suppressed, otherwise the sink
    /// outcome for the emitted event.
    pub async fn process(
        &self,
        change: ChangeKind,
        snapshot: &ResourceSnapshot,
    ) -> Result<Option<PersistOutcome>, ConnectorError> {
        // Service account tokens churn constantly and carry credentials.
        if let ResourceSnapshot::Secret(secret) = snapshot {
            if secret.type_.as_deref() == Some(SERVICE_ACCOUNT_TOKEN_TYPE) {
                return Ok(None);
            }
        }

        let identity = ResourceIdentity::from_snapshot(&self.ctx.cluster, snapshot);
        let prior = self.cache.get(&identity);
        let verdict = classify(change, snapshot, prior.as_ref());
        match verdict.cache {
            CacheUpdate::Store(fingerprint) => self.cache.set(identity.clone(), fingerprint),
            CacheUpdate::Remove => self.cache.remove(&identity),
            CacheUpdate::Keep => {}
        }
        if !verdict.emit {
            debug!("Suppressed {} {}", change.as_str(), identity);
            return Ok(None);
        }

        let event = transform(change, snapshot, prior.as_ref(), &self.ctx);
        let outcome = self.sink.persist(event).await?;
        if outcome == PersistOutcome::Stored {
            info!("Stored {} event: {} {}", snapshot.kind(), change.as_str(), identity);
        }
        Ok(Some(outcome))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("cluster", &self.ctx.cluster)
            .field("connection_id", &self.ctx.connection_id)
            .finish_non_exhaustive()
    }
}
