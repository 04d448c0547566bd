//! Canonical event transformers.
//!
//! Converts an accepted raw snapshot of any supported kind into one
//! normalized `ChangeEvent`. Each kind has its own transformer module,
//! selected by pattern matching on the snapshot variant:
//!
//! - `pod.rs` — container status decoding
//! - `workload.rs` — Deployment/StatefulSet/DaemonSet image diffs and rollout status
//! - `helm.rs` — Helm release payload extraction from release secrets
//! - `config.rs` — ConfigMap key diffs and value-free Secret records
//! - `cluster_event.rs` — cluster Event objects
//! - `generic.rs` — Service/Ingress/Role/RoleBinding
//!
//! Every transformer populates two metadata tiers: a flat `metadata` object
//! the sink can filter on cheaply, and a rich `event_metadata` object with
//! full structured detail.

pub mod cluster_event;
pub mod config;
pub mod generic;
pub mod helm;
pub mod pod;
pub mod workload;

use crate::cache::Fingerprint;
use crate::classify::HELM_RELEASE_SECRET_TYPE;
use crate::snapshot::{ChangeKind, ResourceKind, ResourceSnapshot};
use chrono::{DateTime, Utc};
use event_store::ChangeEvent;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{Value, json};

/// Connection-scoped inputs every transformer needs.
#[derive(Debug, Clone)]
pub struct TransformContext {
    /// Cluster display name used in external ids and URLs
    pub cluster: String,
    /// Connection the resulting events belong to
    pub connection_id: i64,
}

/// Build the canonical event for an accepted transition.
///
/// `prior` is the fingerprint cached before this snapshot was applied; the
/// workload and ConfigMap transformers diff against it for change summaries.
#[must_use]
pub fn transform(
    change: ChangeKind,
    snapshot: &ResourceSnapshot,
    prior: Option<&Fingerprint>,
    ctx: &TransformContext,
) -> ChangeEvent {
    match snapshot {
        ResourceSnapshot::Pod(p) => pod::transform(change, p, ctx),
        ResourceSnapshot::Deployment(d) => workload::transform_deployment(change, d, prior, ctx),
        ResourceSnapshot::StatefulSet(s) => workload::transform_statefulset(change, s, prior, ctx),
        ResourceSnapshot::DaemonSet(d) => workload::transform_daemonset(change, d, prior, ctx),
        ResourceSnapshot::Service(s) => generic::transform_service(change, s, ctx),
        ResourceSnapshot::ConfigMap(cm) => config::transform_config_map(change, cm, prior, ctx),
        ResourceSnapshot::Secret(s) => {
            let release = (s.type_.as_deref() == Some(HELM_RELEASE_SECRET_TYPE))
                .then(|| helm::parse_release_name(s.metadata.name.as_deref().unwrap_or_default()))
                .flatten();
            match release {
                Some(parsed) => helm::transform(change, s, parsed, ctx),
                None => config::transform_secret(change, s, ctx),
            }
        }
        ResourceSnapshot::Ingress(i) => generic::transform_ingress(change, i, ctx),
        ResourceSnapshot::Role(r) => generic::transform_role(change, r, ctx),
        ResourceSnapshot::RoleBinding(rb) => generic::transform_role_binding(change, rb, ctx),
        ResourceSnapshot::Event(e) => cluster_event::transform(e, ctx),
    }
}

/// Deterministic dedup key for versioned resources:
/// `{cluster}:{namespace|cluster}:{kind}:{name}:{resourceVersion}`.
pub(crate) fn versioned_external_id(ctx: &TransformContext, kind: ResourceKind, meta: &ObjectMeta) -> String {
    format!(
        "{}:{}:{}:{}:{}",
        ctx.cluster,
        meta.namespace.as_deref().unwrap_or("cluster"),
        kind.label(),
        meta.name.as_deref().unwrap_or_default(),
        meta.resource_version.as_deref().unwrap_or_default(),
    )
}

/// Stable locator: `k8s://{cluster}/{namespace}/{plural}/{name}`.
pub(crate) fn resource_url(ctx: &TransformContext, kind: ResourceKind, meta: &ObjectMeta) -> String {
    format!(
        "k8s://{}/{}/{}/{}",
        ctx.cluster,
        meta.namespace.as_deref().unwrap_or("cluster"),
        kind.plural(),
        meta.name.as_deref().unwrap_or_default(),
    )
}

/// Creation timestamp of the resource, falling back to ingestion time.
pub(crate) fn timestamp_of(meta: &ObjectMeta) -> DateTime<Utc> {
    meta.creation_timestamp
        .as_ref()
        .map_or_else(Utc::now, |t| t.0)
}

/// Flat, query-friendly metadata tier.
pub(crate) fn flat_metadata(ctx: &TransformContext, kind: ResourceKind, meta: &ObjectMeta) -> Value {
    json!({
        "cluster": ctx.cluster,
        "namespace": meta.namespace.as_deref().unwrap_or("cluster-wide"),
        "resource_type": kind.label(),
    })
}

/// Title synthesis: explicit lifecycle verb first, then a detected primary
/// issue, then a generic `Updated` with an optional one-line summary.
pub(crate) fn title_for(
    kind: ResourceKind,
    change: ChangeKind,
    name: &str,
    issue: Option<&str>,
    update_summary: Option<&str>,
) -> String {
    match change {
        ChangeKind::Added => format!("[{} Created] {}", kind.as_str(), name),
        ChangeKind::Deleted => format!("[{} Deleted] {}", kind.as_str(), name),
        ChangeKind::Modified => match (issue, update_summary) {
            (Some(issue), _) => format!("[{} {}] {}", kind.as_str(), issue, name),
            (None, Some(summary)) => format!("[{} Updated] {} ({})", kind.as_str(), name, summary),
            (None, None) => format!("[{} Updated] {}", kind.as_str(), name),
        },
    }
}

/// Labels as a JSON object, `{}` when absent.
pub(crate) fn labels_of(meta: &ObjectMeta) -> Value {
    json!(meta.labels.clone().unwrap_or_default())
}

/// Annotations as a JSON object, `{}` when absent.
pub(crate) fn annotations_of(meta: &ObjectMeta) -> Value {
    json!(meta.annotations.clone().unwrap_or_default())
}
