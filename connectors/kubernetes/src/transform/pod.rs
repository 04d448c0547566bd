//! Pod transformer.
//!
//! Decodes container statuses into a structured record: per-container state
//! with reason/message/exit code, plus the container specs and volumes the
//! pod was running with. Non-zero exits carry a diagnostic follow-up command
//! reference; the connector never fetches or stores live log content itself.

use super::{
    TransformContext, annotations_of, flat_metadata, labels_of, resource_url, timestamp_of,
    title_for, versioned_external_id,
};
use crate::snapshot::{ChangeKind, ResourceKind};
use event_store::ChangeEvent;
use k8s_openapi::api::core::v1::{ContainerStatus, Pod, Volume};
use serde_json::{Value, json};

/// Build the canonical event for a pod transition.
#[must_use]
pub fn transform(change: ChangeKind, pod: &Pod, ctx: &TransformContext) -> ChangeEvent {
    let meta = &pod.metadata;
    let name = meta.name.as_deref().unwrap_or_default();
    let namespace = meta.namespace.as_deref().unwrap_or_default();
    let phase = pod
        .status
        .as_ref()
        .and_then(|s| s.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let mut description = json!({
        "event_type": change.as_str(),
        "namespace": namespace,
        "phase": phase,
        "node": pod.spec.as_ref().and_then(|s| s.node_name.clone()),
        "labels": labels_of(meta),
        "annotations": annotations_of(meta),
    });

    if let Some(spec) = pod.spec.as_ref() {
        let container_specs: Vec<Value> = spec
            .containers
            .iter()
            .map(|c| {
                let mut entry = json!({
                    "name": c.name,
                    "image": c.image.as_deref().unwrap_or_default(),
                    "ports": c.ports.as_ref().map(|ports| {
                        ports
                            .iter()
                            .map(|p| json!({
                                "container_port": p.container_port,
                                "protocol": p.protocol.as_deref().unwrap_or("TCP"),
                            }))
                            .collect::<Vec<_>>()
                    }).unwrap_or_default(),
                });
                if let Some(resources) = c.resources.as_ref() {
                    if let Some(requests) = resources.requests.as_ref() {
                        entry["requests"] = json!(quantities(requests));
                    }
                    if let Some(limits) = resources.limits.as_ref() {
                        entry["limits"] = json!(quantities(limits));
                    }
                }
                // Count only; env values may hold credentials.
                if let Some(env) = c.env.as_ref() {
                    entry["env_count"] = json!(env.len());
                }
                entry
            })
            .collect();
        description["container_specs"] = json!(container_specs);

        if let Some(volumes) = spec.volumes.as_ref() {
            description["volumes"] = json!(
                volumes
                    .iter()
                    .map(|v| json!({"name": v.name, "type": volume_type(v)}))
                    .collect::<Vec<_>>()
            );
        }
    }

    let statuses = pod
        .status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref());
    if let Some(statuses) = statuses {
        description["containers"] = json!(
            statuses
                .iter()
                .map(|cs| container_detail(cs, name, namespace))
                .collect::<Vec<_>>()
        );
    }

    let issue = primary_issue(pod);
    let title = title_for(ResourceKind::Pod, change, name, issue.as_deref(), None);

    let mut metadata = flat_metadata(ctx, ResourceKind::Pod, meta);
    metadata["phase"] = json!(phase);

    ChangeEvent {
        external_id: versioned_external_id(ctx, ResourceKind::Pod, meta),
        source: "kubernetes".to_string(),
        kind: ResourceKind::Pod.as_str().to_string(),
        title,
        description,
        timestamp: timestamp_of(meta),
        url: resource_url(ctx, ResourceKind::Pod, meta),
        status: change.status_label().to_string(),
        metadata,
        event_metadata: json!({
            "labels": labels_of(meta),
            "primary_issue": issue,
            "restart_total": statuses
                .map(|s| s.iter().map(|cs| i64::from(cs.restart_count)).sum::<i64>())
                .unwrap_or(0),
        }),
        connection_id: ctx.connection_id,
    }
}

/// Decode one container status into name, image, readiness, restarts, and
/// current state with reason/message/exit code.
fn container_detail(cs: &ContainerStatus, pod_name: &str, namespace: &str) -> Value {
    let mut detail = json!({
        "name": cs.name,
        "image": cs.image,
        "ready": cs.ready,
        "restart_count": cs.restart_count,
        "state": "unknown",
    });
    let Some(state) = cs.state.as_ref() else {
        return detail;
    };
    if let Some(waiting) = state.waiting.as_ref() {
        detail["state"] = json!("waiting");
        detail["reason"] = json!(waiting.reason);
        detail["message"] = json!(waiting.message);
    } else if let Some(terminated) = state.terminated.as_ref() {
        detail["state"] = json!("terminated");
        detail["reason"] = json!(terminated.reason);
        detail["message"] = json!(terminated.message);
        detail["exit_code"] = json!(terminated.exit_code);
        if terminated.exit_code != 0 {
            detail["logs_hint"] = json!(format!(
                "kubectl logs {pod_name} -n {namespace} -c {} --previous",
                cs.name
            ));
        }
    } else if state.running.is_some() {
        detail["state"] = json!("running");
    }
    detail
}

/// Most interesting container reason, surfaced in Modified titles.
fn primary_issue(pod: &Pod) -> Option<String> {
    let statuses = pod
        .status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())?;
    for cs in statuses {
        let Some(state) = cs.state.as_ref() else {
            continue;
        };
        if let Some(reason) = state.waiting.as_ref().and_then(|w| w.reason.clone()) {
            return Some(reason);
        }
        if let Some(reason) = state.terminated.as_ref().and_then(|t| t.reason.clone()) {
            return Some(reason);
        }
    }
    None
}

fn volume_type(volume: &Volume) -> String {
    if let Some(cm) = volume.config_map.as_ref() {
        format!("configMap:{}", cm.name)
    } else if let Some(secret) = volume.secret.as_ref() {
        format!("secret:{}", secret.secret_name.as_deref().unwrap_or_default())
    } else if let Some(pvc) = volume.persistent_volume_claim.as_ref() {
        format!("pvc:{}", pvc.claim_name)
    } else if volume.empty_dir.is_some() {
        "emptyDir".to_string()
    } else if let Some(host_path) = volume.host_path.as_ref() {
        format!("hostPath:{}", host_path.path)
    } else {
        "other".to_string()
    }
}

fn quantities(
    map: &std::collections::BTreeMap<
        String,
        k8s_openapi::apimachinery::pkg::api::resource::Quantity,
    >,
) -> std::collections::BTreeMap<String, String> {
    map.iter().map(|(k, v)| (k.clone(), v.0.clone())).collect()
}
