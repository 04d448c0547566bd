//! Service, Ingress, Role, and RoleBinding transformers.
//!
//! These kinds only surface on creation and deletion; the record captures the
//! shape of the object at that moment.

use super::{
    TransformContext, annotations_of, flat_metadata, labels_of, resource_url, timestamp_of,
    title_for, versioned_external_id,
};
use crate::snapshot::{ChangeKind, ResourceKind};
use event_store::ChangeEvent;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde_json::{Value, json};

/// Build the canonical event for a Service transition.
#[must_use]
pub fn transform_service(change: ChangeKind, service: &Service, ctx: &TransformContext) -> ChangeEvent {
    let spec = service.spec.as_ref();
    let detail = json!({
        "type": spec.and_then(|s| s.type_.as_deref()),
        "cluster_ip": spec.and_then(|s| s.cluster_ip.as_deref()),
        "ports": spec
            .and_then(|s| s.ports.as_ref())
            .map(|ports| {
                ports
                    .iter()
                    .map(|p| json!({
                        "port": p.port,
                        "target_port": p.target_port.as_ref().map(int_or_string),
                        "protocol": p.protocol.as_deref().unwrap_or("TCP"),
                    }))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default(),
        "selector": spec.and_then(|s| s.selector.clone()).unwrap_or_default(),
    });
    build(change, ResourceKind::Service, &service.metadata, detail, ctx)
}

/// Build the canonical event for an Ingress transition.
#[must_use]
pub fn transform_ingress(change: ChangeKind, ingress: &Ingress, ctx: &TransformContext) -> ChangeEvent {
    let rules: Vec<Value> = ingress
        .spec
        .as_ref()
        .and_then(|s| s.rules.as_ref())
        .map(|rules| {
            rules
                .iter()
                .map(|rule| {
                    json!({
                        "host": rule.host.as_deref(),
                        "paths": rule
                            .http
                            .as_ref()
                            .map(|http| {
                                http.paths
                                    .iter()
                                    .map(|p| json!({
                                        "path": p.path.as_deref().unwrap_or("/"),
                                        "backend": p
                                            .backend
                                            .service
                                            .as_ref()
                                            .map(|svc| format!(
                                                "{}:{}",
                                                svc.name,
                                                svc.port
                                                    .as_ref()
                                                    .and_then(|port| port.number)
                                                    .unwrap_or_default()
                                            )),
                                    }))
                                    .collect::<Vec<_>>()
                            })
                            .unwrap_or_default(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    build(
        change,
        ResourceKind::Ingress,
        &ingress.metadata,
        json!({"rules": rules}),
        ctx,
    )
}

/// Build the canonical event for a Role transition.
#[must_use]
pub fn transform_role(change: ChangeKind, role: &Role, ctx: &TransformContext) -> ChangeEvent {
    let rules: Vec<Value> = role
        .rules
        .as_ref()
        .map(|rules| {
            rules
                .iter()
                .map(|rule| {
                    json!({
                        "api_groups": rule.api_groups.clone().unwrap_or_default(),
                        "resources": rule.resources.clone().unwrap_or_default(),
                        "verbs": rule.verbs,
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    build(
        change,
        ResourceKind::Role,
        &role.metadata,
        json!({"rules": rules}),
        ctx,
    )
}

/// Build the canonical event for a RoleBinding transition.
#[must_use]
pub fn transform_role_binding(
    change: ChangeKind,
    binding: &RoleBinding,
    ctx: &TransformContext,
) -> ChangeEvent {
    let detail = json!({
        "role_ref": {
            "kind": binding.role_ref.kind,
            "name": binding.role_ref.name,
        },
        "subjects": binding
            .subjects
            .as_ref()
            .map(|subjects| {
                subjects
                    .iter()
                    .map(|s| json!({
                        "kind": s.kind,
                        "name": s.name,
                        "namespace": s.namespace.as_deref(),
                    }))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default(),
    });
    build(change, ResourceKind::RoleBinding, &binding.metadata, detail, ctx)
}

fn build(
    change: ChangeKind,
    kind: ResourceKind,
    meta: &ObjectMeta,
    detail: Value,
    ctx: &TransformContext,
) -> ChangeEvent {
    let name = meta.name.as_deref().unwrap_or_default();
    let mut description = json!({
        "event_type": change.as_str(),
        "namespace": meta.namespace.as_deref().unwrap_or("cluster-wide"),
        "resource_kind": kind.as_str(),
        "labels": labels_of(meta),
        "annotations": annotations_of(meta),
    });
    if let Some(map) = detail.as_object() {
        for (key, value) in map {
            description[key] = value.clone();
        }
    }

    ChangeEvent {
        external_id: versioned_external_id(ctx, kind, meta),
        source: "kubernetes".to_string(),
        kind: kind.as_str().to_string(),
        title: title_for(kind, change, name, None, None),
        description,
        timestamp: timestamp_of(meta),
        url: resource_url(ctx, kind, meta),
        status: change.status_label().to_string(),
        metadata: flat_metadata(ctx, kind, meta),
        event_metadata: json!({"labels": labels_of(meta)}),
        connection_id: ctx.connection_id,
    }
}

fn int_or_string(value: &IntOrString) -> String {
    match value {
        IntOrString::Int(i) => i.to_string(),
        IntOrString::String(s) => s.clone(),
    }
}
