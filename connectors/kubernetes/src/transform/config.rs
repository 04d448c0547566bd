//! ConfigMap and Secret transformers.
//!
//! ConfigMap events carry the data itself plus a key-level diff against the
//! cached fingerprint. Secret events are value-free by construction: only key
//! names and the secret type are ever recorded.

use super::{
    TransformContext, annotations_of, flat_metadata, labels_of, resource_url, timestamp_of,
    title_for, versioned_external_id,
};
use crate::cache::Fingerprint;
use crate::snapshot::{ChangeKind, ResourceKind};
use event_store::ChangeEvent;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use serde_json::json;
use std::collections::BTreeMap;

/// Build the canonical event for a ConfigMap transition.
#[must_use]
pub fn transform_config_map(
    change: ChangeKind,
    cm: &ConfigMap,
    prior: Option<&Fingerprint>,
    ctx: &TransformContext,
) -> ChangeEvent {
    let meta = &cm.metadata;
    let name = meta.name.as_deref().unwrap_or_default();
    let data = cm.data.clone().unwrap_or_default();
    let keys: Vec<&String> = data.keys().collect();

    let mut description = json!({
        "event_type": change.as_str(),
        "namespace": meta.namespace.as_deref().unwrap_or_default(),
        "data": data,
        "keys": keys,
        "binary_data": cm
            .binary_data
            .as_ref()
            .map(|b| b.keys().collect::<Vec<_>>())
            .unwrap_or_default(),
        "labels": labels_of(meta),
        "annotations": annotations_of(meta),
    });

    let mut summary = None;
    if let Some(Fingerprint::ConfigMap { data: cached }) = prior {
        let diff = key_diff(cached, &data);
        if !diff.added.is_empty() {
            description["keys_added"] = json!(diff.added);
        }
        if !diff.removed.is_empty() {
            description["keys_removed"] = json!(diff.removed);
        }
        if !diff.changed.is_empty() {
            description["keys_changed"] = json!(diff.changed);
        }
        summary = diff.summary();
    }

    ChangeEvent {
        external_id: versioned_external_id(ctx, ResourceKind::ConfigMap, meta),
        source: "kubernetes".to_string(),
        kind: ResourceKind::ConfigMap.as_str().to_string(),
        title: title_for(ResourceKind::ConfigMap, change, name, None, summary.as_deref()),
        description: description.clone(),
        timestamp: timestamp_of(meta),
        url: resource_url(ctx, ResourceKind::ConfigMap, meta),
        status: change.status_label().to_string(),
        metadata: flat_metadata(ctx, ResourceKind::ConfigMap, meta),
        event_metadata: json!({
            "labels": labels_of(meta),
            "keys_added": description.get("keys_added").cloned(),
            "keys_removed": description.get("keys_removed").cloned(),
            "keys_changed": description.get("keys_changed").cloned(),
        }),
        connection_id: ctx.connection_id,
    }
}

/// Build the canonical event for a generic (non-Helm) Secret transition.
///
/// Secret data values never leave this function's input: the record holds
/// key names and the type only.
#[must_use]
pub fn transform_secret(change: ChangeKind, secret: &Secret, ctx: &TransformContext) -> ChangeEvent {
    let meta = &secret.metadata;
    let name = meta.name.as_deref().unwrap_or_default();
    let data_keys: Vec<&String> = secret
        .data
        .as_ref()
        .map(|d| d.keys().collect())
        .unwrap_or_default();

    ChangeEvent {
        external_id: versioned_external_id(ctx, ResourceKind::Secret, meta),
        source: "kubernetes".to_string(),
        kind: ResourceKind::Secret.as_str().to_string(),
        title: title_for(ResourceKind::Secret, change, name, None, None),
        description: json!({
            "event_type": change.as_str(),
            "namespace": meta.namespace.as_deref().unwrap_or_default(),
            "data_keys": data_keys,
            "type": secret.type_.as_deref().unwrap_or_default(),
            "labels": labels_of(meta),
        }),
        timestamp: timestamp_of(meta),
        url: resource_url(ctx, ResourceKind::Secret, meta),
        status: change.status_label().to_string(),
        metadata: flat_metadata(ctx, ResourceKind::Secret, meta),
        event_metadata: json!({
            "labels": labels_of(meta),
            "key_count": data_keys.len(),
        }),
        connection_id: ctx.connection_id,
    }
}

struct KeyDiff {
    added: Vec<String>,
    removed: Vec<String>,
    changed: Vec<String>,
}

impl KeyDiff {
    fn summary(&self) -> Option<String> {
        let mut parts = Vec::new();
        if !self.added.is_empty() {
            parts.push(format!("{} added", self.added.len()));
        }
        if !self.removed.is_empty() {
            parts.push(format!("{} removed", self.removed.len()));
        }
        if !self.changed.is_empty() {
            parts.push(format!("{} changed", self.changed.len()));
        }
        if parts.is_empty() {
            None
        } else {
            Some(format!("keys: {}", parts.join(", ")))
        }
    }
}

fn key_diff(cached: &BTreeMap<String, String>, current: &BTreeMap<String, String>) -> KeyDiff {
    KeyDiff {
        added: current
            .keys()
            .filter(|k| !cached.contains_key(*k))
            .cloned()
            .collect(),
        removed: cached
            .keys()
            .filter(|k| !current.contains_key(*k))
            .cloned()
            .collect(),
        changed: current
            .iter()
            .filter(|(k, v)| cached.get(*k).is_some_and(|old| old != *v))
            .map(|(k, _)| k.clone())
            .collect(),
    }
}
