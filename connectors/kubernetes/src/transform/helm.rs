//! Helm release transformer.
//!
//! Helm 3 stores one secret per release revision, typed
//! `helm.sh/release.v1` and named `sh.helm.release.v1.<release>.v<revision>`.
//! The payload is a base64 string wrapping a gzip-compressed JSON document.
//! Decoding is best effort: a malformed payload is logged and the event is
//! still emitted with whatever was extracted, at minimum the release name and
//! revision parsed from the secret name.

use super::{TransformContext, flat_metadata, resource_url, timestamp_of};
use crate::snapshot::{ChangeKind, ResourceKind};
use anyhow::{Context as _, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use event_store::ChangeEvent;
use flate2::read::GzDecoder;
use k8s_openapi::api::core::v1::Secret;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::io::Read as _;
use tracing::warn;

/// Secret data key holding the release payload.
const RELEASE_DATA_KEY: &str = "release";
/// Helm's secret-name prefix; some tools store the bare `<name>.v<rev>` form.
const RELEASE_NAME_PREFIX: &str = "sh.helm.release.v1.";
/// Notes are kept to one screenful.
const NOTES_LIMIT: usize = 500;
/// Cap on reported top-level value keys.
const VALUE_KEYS_LIMIT: usize = 20;

/// Parse `releaseName` and `revision` from the release secret name.
///
/// Accepts both `sh.helm.release.v1.myrelease.v2` and `myrelease.v2`.
#[must_use]
pub fn parse_release_name(secret_name: &str) -> Option<(String, u32)> {
    let bare = secret_name
        .strip_prefix(RELEASE_NAME_PREFIX)
        .unwrap_or(secret_name);
    let (release, revision) = bare.rsplit_once(".v")?;
    if release.is_empty() {
        return None;
    }
    let revision: u32 = revision.parse().ok()?;
    Some((release.to_string(), revision))
}

/// Build the canonical event for a Helm release secret transition.
#[must_use]
pub fn transform(
    change: ChangeKind,
    secret: &Secret,
    (release_name, revision): (String, u32),
    ctx: &TransformContext,
) -> ChangeEvent {
    let meta = &secret.metadata;
    let namespace = meta.namespace.as_deref().unwrap_or_default();

    let verb = match change {
        ChangeKind::Deleted => "Uninstall",
        _ if revision <= 1 => "Install",
        _ => "Upgrade",
    };
    let title = format!("[Helm {verb}] {release_name} (v{revision})");

    let mut description = json!({
        "event_type": change.as_str(),
        "namespace": namespace,
        "release_name": release_name,
        "revision": revision,
    });

    // The payload of a deleted revision is gone; only decode live ones.
    if change != ChangeKind::Deleted {
        match decode_release_payload(secret) {
            Ok(release) => {
                for (key, value) in extract_detail(&release) {
                    description[key] = value;
                }
            }
            Err(e) => {
                warn!(
                    "Failed to decode Helm release payload for {namespace}/{release_name} v{revision}: {e:#}"
                );
            }
        }
    }

    let mut metadata = flat_metadata(ctx, ResourceKind::Secret, meta);
    metadata["resource_type"] = json!("helm-release");
    metadata["release_name"] = json!(release_name);

    ChangeEvent {
        external_id: format!(
            "{}:{}:helm:{}:{}",
            ctx.cluster,
            namespace,
            meta.name.as_deref().unwrap_or_default(),
            meta.resource_version.as_deref().unwrap_or_default(),
        ),
        source: "kubernetes".to_string(),
        kind: "HelmRelease".to_string(),
        title,
        description: description.clone(),
        timestamp: timestamp_of(meta),
        url: resource_url(ctx, ResourceKind::Secret, meta),
        status: change.status_label().to_string(),
        metadata,
        event_metadata: json!({
            "release_name": description["release_name"],
            "revision": revision,
            "chart": description.get("chart").cloned(),
            "release_status": description.get("release_status").cloned(),
        }),
        connection_id: ctx.connection_id,
    }
}

/// Decode the embedded payload: inner base64, then gzip, then JSON.
fn decode_release_payload(secret: &Secret) -> Result<Value> {
    let raw = secret
        .data
        .as_ref()
        .and_then(|d| d.get(RELEASE_DATA_KEY))
        .context("secret has no release payload")?;
    let compressed = BASE64
        .decode(&raw.0)
        .context("release payload is not valid base64")?;
    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut body = String::new();
    decoder
        .read_to_string(&mut body)
        .context("release payload is not valid gzip")?;
    serde_json::from_str(&body).context("release payload is not valid JSON")
}

/// Pull the operationally interesting fields out of the release document.
fn extract_detail(release: &Value) -> Vec<(&'static str, Value)> {
    let mut detail = Vec::new();
    let chart_meta = release.pointer("/chart/metadata");
    if let Some(name) = chart_meta.and_then(|m| m.get("name")) {
        detail.push(("chart", name.clone()));
    }
    if let Some(version) = chart_meta.and_then(|m| m.get("version")) {
        detail.push(("chart_version", version.clone()));
    }
    if let Some(app_version) = chart_meta.and_then(|m| m.get("appVersion")) {
        detail.push(("app_version", app_version.clone()));
    }
    if let Some(status) = release.pointer("/info/status") {
        detail.push(("release_status", status.clone()));
    }
    if let Some(notes) = release.pointer("/info/notes").and_then(Value::as_str) {
        let truncated: String = notes.chars().take(NOTES_LIMIT).collect();
        detail.push(("notes", json!(truncated)));
    }
    // User-supplied values only; key names, never the values themselves.
    if let Some(config) = release.get("config").and_then(Value::as_object) {
        let keys: Vec<&String> = config.keys().take(VALUE_KEYS_LIMIT).collect();
        detail.push(("value_keys", json!(keys)));
    }
    if let Some(manifest) = release.get("manifest").and_then(Value::as_str) {
        detail.push(("manifest_kinds", json!(manifest_kinds(manifest))));
    }
    detail
}

/// Kinds present in the embedded manifest, found by scanning for `kind:`
/// lines rather than parsing the full YAML.
fn manifest_kinds(manifest: &str) -> Vec<String> {
    let kinds: BTreeSet<String> = manifest
        .lines()
        .filter_map(|line| line.strip_prefix("kind:"))
        .map(|kind| kind.trim().to_string())
        .filter(|kind| !kind.is_empty())
        .collect();
    kinds.into_iter().collect()
}
