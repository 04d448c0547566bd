//! Workload transformers: Deployment, StatefulSet, DaemonSet.
//!
//! Computes the `images_changed` list by diffing current container-to-image
//! pairs against the cached pairs, keyed by container name. Only names
//! present on both sides with a differing image are reported as changed;
//! container additions and removals show up solely in the full current image
//! list.

use super::{
    TransformContext, flat_metadata, labels_of, resource_url, timestamp_of, title_for,
    versioned_external_id,
};
use crate::cache::Fingerprint;
use crate::classify::image_map;
use crate::snapshot::{ChangeKind, ResourceKind};
use event_store::ChangeEvent;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Kind-agnostic view of one workload snapshot.
struct WorkloadView<'a> {
    kind: ResourceKind,
    meta: &'a ObjectMeta,
    images: BTreeMap<String, String>,
    replicas: Option<i32>,
    strategy: Option<String>,
    rollout_status: String,
}

/// Build the canonical event for a Deployment transition.
#[must_use]
pub fn transform_deployment(
    change: ChangeKind,
    deployment: &Deployment,
    prior: Option<&Fingerprint>,
    ctx: &TransformContext,
) -> ChangeEvent {
    let spec = deployment.spec.as_ref();
    let status = deployment.status.as_ref();
    let desired = spec.and_then(|s| s.replicas).unwrap_or(1);
    let view = WorkloadView {
        kind: ResourceKind::Deployment,
        meta: &deployment.metadata,
        images: image_map(spec.and_then(|s| s.template.spec.as_ref())),
        replicas: spec.and_then(|s| s.replicas),
        strategy: spec
            .and_then(|s| s.strategy.as_ref())
            .and_then(|s| s.type_.clone())
            .or_else(|| Some("RollingUpdate".to_string())),
        rollout_status: rollout_line(
            desired,
            status.and_then(|s| s.ready_replicas),
            status.and_then(|s| s.updated_replicas),
        ),
    };
    build(change, &view, prior, ctx)
}

/// Build the canonical event for a StatefulSet transition.
#[must_use]
pub fn transform_statefulset(
    change: ChangeKind,
    set: &StatefulSet,
    prior: Option<&Fingerprint>,
    ctx: &TransformContext,
) -> ChangeEvent {
    let spec = set.spec.as_ref();
    let status = set.status.as_ref();
    let desired = spec.and_then(|s| s.replicas).unwrap_or(1);
    let view = WorkloadView {
        kind: ResourceKind::StatefulSet,
        meta: &set.metadata,
        images: image_map(spec.and_then(|s| s.template.spec.as_ref())),
        replicas: spec.and_then(|s| s.replicas),
        strategy: None,
        rollout_status: rollout_line(
            desired,
            status.and_then(|s| s.ready_replicas),
            status.and_then(|s| s.updated_replicas),
        ),
    };
    build(change, &view, prior, ctx)
}

/// Build the canonical event for a DaemonSet transition.
#[must_use]
pub fn transform_daemonset(
    change: ChangeKind,
    set: &DaemonSet,
    prior: Option<&Fingerprint>,
    ctx: &TransformContext,
) -> ChangeEvent {
    let status = set.status.as_ref();
    let view = WorkloadView {
        kind: ResourceKind::DaemonSet,
        meta: &set.metadata,
        images: image_map(set.spec.as_ref().and_then(|s| s.template.spec.as_ref())),
        replicas: None,
        strategy: None,
        rollout_status: rollout_line(
            status.map_or(0, |s| s.desired_number_scheduled),
            status.map(|s| s.number_ready),
            None,
        ),
    };
    build(change, &view, prior, ctx)
}

fn build(
    change: ChangeKind,
    view: &WorkloadView<'_>,
    prior: Option<&Fingerprint>,
    ctx: &TransformContext,
) -> ChangeEvent {
    let name = view.meta.name.as_deref().unwrap_or_default();
    let images_changed = images_changed(&view.images, prior);

    let images: Vec<Value> = view
        .images
        .iter()
        .map(|(container, image)| json!({"name": container, "image": image}))
        .collect();

    let mut description = json!({
        "event_type": change.as_str(),
        "namespace": view.meta.namespace.as_deref().unwrap_or_default(),
        "images": images,
        "replicas": view.replicas,
        "rollout_status": view.rollout_status,
        "labels": labels_of(view.meta),
    });
    if !images_changed.is_empty() {
        description["images_changed"] = json!(images_changed);
    }
    if let Some(strategy) = view.strategy.as_deref() {
        description["strategy"] = json!(strategy);
    }

    let summary = if images_changed.is_empty() {
        format!("rollout status: {}", view.rollout_status)
    } else {
        let n = images_changed.len();
        format!("{n} image{} changed", if n == 1 { "" } else { "s" })
    };
    let title = title_for(view.kind, change, name, None, Some(&summary));

    ChangeEvent {
        external_id: versioned_external_id(ctx, view.kind, view.meta),
        source: "kubernetes".to_string(),
        kind: view.kind.as_str().to_string(),
        title,
        description,
        timestamp: timestamp_of(view.meta),
        url: resource_url(ctx, view.kind, view.meta),
        status: change.status_label().to_string(),
        metadata: flat_metadata(ctx, view.kind, view.meta),
        event_metadata: json!({
            "labels": labels_of(view.meta),
            "rollout_status": view.rollout_status,
            "images_changed": images_changed,
        }),
        connection_id: ctx.connection_id,
    }
}

/// Name-keyed image diff against the cached fingerprint.
fn images_changed(current: &BTreeMap<String, String>, prior: Option<&Fingerprint>) -> Vec<Value> {
    let Some(Fingerprint::Workload { images: cached, .. }) = prior else {
        return Vec::new();
    };
    current
        .iter()
        .filter_map(|(container, image)| {
            cached
                .get(container)
                .filter(|old| *old != image)
                .map(|old| json!({"name": container, "from": old, "to": image}))
        })
        .collect()
}

/// One-line rollout summary, e.g. `5 desired, 3 ready, 3 updated`.
fn rollout_line(desired: i32, ready: Option<i32>, updated: Option<i32>) -> String {
    let mut parts = vec![format!("{desired} desired")];
    if let Some(ready) = ready {
        parts.push(format!("{ready} ready"));
    }
    if let Some(updated) = updated {
        parts.push(format!("{updated} updated"));
    }
    parts.join(", ")
}
