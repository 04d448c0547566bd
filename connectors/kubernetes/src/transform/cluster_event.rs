//! Cluster Event transformer.
//!
//! Event objects are not versioned observations of a resource; the same Event
//! is re-delivered with an incremented occurrence count. The external id
//! therefore uses the count instead of the resourceVersion.

use super::{TransformContext, flat_metadata, resource_url};
use crate::snapshot::ResourceKind;
use chrono::Utc;
use event_store::ChangeEvent;
use k8s_openapi::api::core::v1::Event;
use serde_json::json;

/// Build the canonical record for a cluster Event occurrence.
#[must_use]
pub fn transform(event: &Event, ctx: &TransformContext) -> ChangeEvent {
    let meta = &event.metadata;
    let namespace = meta.namespace.as_deref().unwrap_or("cluster");
    let reason = event.reason.as_deref().unwrap_or("Unknown");
    let count = event.count.unwrap_or(1);
    let involved_name = event
        .involved_object
        .name
        .as_deref()
        .unwrap_or_else(|| meta.name.as_deref().unwrap_or_default());
    let event_type = event.type_.as_deref().unwrap_or("Normal");

    let timestamp = event
        .last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| event.event_time.as_ref().map(|t| t.0))
        .or_else(|| meta.creation_timestamp.as_ref().map(|t| t.0))
        .unwrap_or_else(Utc::now);

    let mut metadata = flat_metadata(ctx, ResourceKind::Event, meta);
    metadata["reason"] = json!(reason);
    metadata["event_type"] = json!(event_type);

    ChangeEvent {
        external_id: format!(
            "{}:{}:event:{}:{}",
            ctx.cluster,
            namespace,
            meta.name.as_deref().unwrap_or_default(),
            count,
        ),
        source: "kubernetes".to_string(),
        kind: ResourceKind::Event.as_str().to_string(),
        title: format!("[Event {reason}] {involved_name}"),
        description: json!({
            "namespace": namespace,
            "reason": reason,
            "message": event.message.as_deref().unwrap_or_default(),
            "type": event_type,
            "count": count,
            "involved_object": {
                "kind": event.involved_object.kind.as_deref().unwrap_or_default(),
                "name": involved_name,
                "namespace": event.involved_object.namespace.as_deref(),
            },
            "source_component": event
                .source
                .as_ref()
                .and_then(|s| s.component.as_deref()),
        }),
        timestamp,
        url: resource_url(ctx, ResourceKind::Event, meta),
        status: event_type.to_ascii_lowercase(),
        metadata,
        event_metadata: json!({
            "count": count,
            "message": event.message.as_deref(),
            "reporting_component": event.reporting_component.as_deref(),
        }),
        connection_id: ctx.connection_id,
    }
}
