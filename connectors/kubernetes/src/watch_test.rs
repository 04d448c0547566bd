use crate::cache::MemoryFingerprintCache;
use crate::pipeline::Pipeline;
use crate::sink::IdempotentSink;
use crate::snapshot::ResourceKind;
use crate::watch::{SessionEnd, drain};
use event_store::MemoryEventStore;
use futures::StreamExt;
use futures::stream;
use k8s_openapi::api::core::v1::{Pod, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::WatchEvent;
use kube::core::ErrorResponse;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn pipeline() -> (Arc<Pipeline>, MemoryEventStore) {
    let store = MemoryEventStore::new();
    let pipeline = Pipeline::new(
        "prod",
        1,
        Arc::new(MemoryFingerprintCache::new()),
        IdempotentSink::new(Arc::new(store.clone())),
    );
    (Arc::new(pipeline), store)
}

fn pod(name: &str, resource_version: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            resource_version: Some(resource_version.to_string()),
            ..ObjectMeta::default()
        },
        status: Some(PodStatus {
            phase: Some("Running".to_string()),
            ..PodStatus::default()
        }),
        ..Pod::default()
    }
}

fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(300)
}

fn error_frame(code: u16, message: &str) -> ErrorResponse {
    ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: String::new(),
        code,
    }
}

#[tokio::test]
async fn closed_stream_reports_count_and_last_version() {
    let (pipeline, store) = pipeline();
    let frames = stream::iter(vec![
        Ok(WatchEvent::Added(pod("api-1", "5"))),
        Ok(WatchEvent::Modified(pod("api-1", "9"))),
    ]);

    let outcome = drain(frames, ResourceKind::Pod, pipeline, deadline(), None).await;

    assert_eq!(outcome.end, SessionEnd::StreamClosed);
    assert_eq!(outcome.processed, 2);
    assert_eq!(outcome.resource_version.as_deref(), Some("9"));
    // The Added transition reached the sink.
    assert!(store.get(1, "prod:default:pod:api-1:5").is_some());
}

#[tokio::test(start_paused = true)]
async fn wall_clock_bound_ends_the_session_with_its_partial_count() {
    let (pipeline, _store) = pipeline();
    let frames = stream::iter(vec![Ok(WatchEvent::Added(pod("api-1", "5")))])
        .chain(stream::pending())
        .boxed();

    let outcome = drain(
        frames,
        ResourceKind::Pod,
        pipeline,
        Instant::now() + Duration::from_secs(300),
        None,
    )
    .await;

    assert_eq!(outcome.end, SessionEnd::Timeout);
    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.resource_version.as_deref(), Some("5"));
}

#[tokio::test]
async fn transport_error_resolves_to_an_outcome_with_the_partial_count() {
    let (pipeline, _store) = pipeline();
    let frames = stream::iter(vec![
        Ok(WatchEvent::Added(pod("api-1", "5"))),
        Err(kube::Error::Api(error_frame(500, "connection reset"))),
    ]);

    let outcome = drain(frames, ResourceKind::Pod, pipeline, deadline(), None).await;

    assert_eq!(outcome.end, SessionEnd::Error);
    assert_eq!(outcome.processed, 1);
    // The resume point survives a transport failure.
    assert_eq!(outcome.resource_version.as_deref(), Some("5"));
}

#[tokio::test]
async fn expired_watch_history_clears_the_resume_version() {
    let (pipeline, _store) = pipeline();
    let frames = stream::iter(vec![Ok(WatchEvent::Error::<Pod>(error_frame(
        410,
        "too old resource version",
    )))]);

    let outcome = drain(
        frames,
        ResourceKind::Pod,
        pipeline,
        deadline(),
        Some("41231".to_string()),
    )
    .await;

    assert_eq!(outcome.end, SessionEnd::Error);
    assert_eq!(outcome.resource_version, None);
}

#[tokio::test]
async fn non_gone_error_frame_keeps_the_resume_version() {
    let (pipeline, _store) = pipeline();
    let frames = stream::iter(vec![Ok(WatchEvent::Error::<Pod>(error_frame(
        500,
        "internal error",
    )))]);

    let outcome = drain(
        frames,
        ResourceKind::Pod,
        pipeline,
        deadline(),
        Some("41231".to_string()),
    )
    .await;

    assert_eq!(outcome.end, SessionEnd::Error);
    assert_eq!(outcome.resource_version.as_deref(), Some("41231"));
}
