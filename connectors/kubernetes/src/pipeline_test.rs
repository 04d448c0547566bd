use crate::cache::MemoryFingerprintCache;
use crate::pipeline::Pipeline;
use crate::sink::{IdempotentSink, PersistOutcome};
use crate::snapshot::{ChangeKind, ResourceSnapshot};
use event_store::MemoryEventStore;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, ContainerState, ContainerStateWaiting, ContainerStatus, Pod, PodSpec,
    PodStatus, PodTemplateSpec, Secret,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::json;
use std::sync::Arc;

fn pipeline() -> (Pipeline, MemoryEventStore) {
    let store = MemoryEventStore::new();
    let pipeline = Pipeline::new(
        "prod",
        1,
        Arc::new(MemoryFingerprintCache::new()),
        IdempotentSink::new(Arc::new(store.clone())),
    );
    (pipeline, store)
}

fn meta(name: &str, resource_version: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some("default".to_string()),
        resource_version: Some(resource_version.to_string()),
        ..ObjectMeta::default()
    }
}

fn pod(resource_version: &str, phase: &str, statuses: Vec<ContainerStatus>) -> ResourceSnapshot {
    ResourceSnapshot::from(Pod {
        metadata: meta("api-1", resource_version),
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            container_statuses: Some(statuses),
            ..PodStatus::default()
        }),
        ..Pod::default()
    })
}

fn crash_looping(name: &str, restart_count: i32) -> ContainerStatus {
    ContainerStatus {
        name: name.to_string(),
        restart_count,
        state: Some(ContainerState {
            waiting: Some(ContainerStateWaiting {
                reason: Some("CrashLoopBackOff".to_string()),
                ..ContainerStateWaiting::default()
            }),
            ..ContainerState::default()
        }),
        ..ContainerStatus::default()
    }
}

#[tokio::test]
async fn pending_pod_is_silent_until_it_crashes() {
    let (pipeline, store) = pipeline();

    let created = pod("1", "Pending", vec![]);
    let outcome = pipeline.process(ChangeKind::Added, &created).await.unwrap();
    assert_eq!(outcome, None);
    assert!(store.is_empty());

    let crashed = pod("2", "Running", vec![crash_looping("api", 1)]);
    let outcome = pipeline.process(ChangeKind::Modified, &crashed).await.unwrap();
    assert_eq!(outcome, Some(PersistOutcome::Stored));

    let events = store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "[Pod CrashLoopBackOff] api-1");
}

#[tokio::test]
async fn redelivered_snapshot_is_stored_once() {
    let (pipeline, store) = pipeline();

    let created = pod("1", "Running", vec![]);
    let first = pipeline.process(ChangeKind::Added, &created).await.unwrap();
    assert_eq!(first, Some(PersistOutcome::Stored));

    // A new watch session replays the same resource version at startup.
    let second = pipeline.process(ChangeKind::Added, &created).await.unwrap();
    assert_eq!(second, Some(PersistOutcome::Skipped));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn service_account_tokens_are_never_ingested() {
    let (pipeline, store) = pipeline();

    let token = ResourceSnapshot::from(Secret {
        metadata: meta("default-token-abc12", "1"),
        type_: Some("kubernetes.io/service-account-token".to_string()),
        ..Secret::default()
    });
    for change in [ChangeKind::Added, ChangeKind::Modified, ChangeKind::Deleted] {
        let outcome = pipeline.process(change, &token).await.unwrap();
        assert_eq!(outcome, None);
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn config_map_first_modification_seeds_then_diffs() {
    let (pipeline, store) = pipeline();

    let initial = ResourceSnapshot::from(ConfigMap {
        metadata: meta("app-config", "1"),
        data: Some([("max_connections".to_string(), "100".to_string())].into()),
        ..ConfigMap::default()
    });
    let outcome = pipeline.process(ChangeKind::Modified, &initial).await.unwrap();
    assert_eq!(outcome, None);

    let updated = ResourceSnapshot::from(ConfigMap {
        metadata: meta("app-config", "2"),
        data: Some(
            [
                ("max_connections".to_string(), "100".to_string()),
                ("timeout".to_string(), "30s".to_string()),
            ]
            .into(),
        ),
        ..ConfigMap::default()
    });
    let outcome = pipeline.process(ChangeKind::Modified, &updated).await.unwrap();
    assert_eq!(outcome, Some(PersistOutcome::Stored));

    let event = store.get(1, "prod:default:configmap:app-config:2").unwrap();
    assert_eq!(event.description["keys_added"], json!(["timeout"]));
}

fn deployment(resource_version: &str, image: &str) -> ResourceSnapshot {
    ResourceSnapshot::from(Deployment {
        metadata: meta("api", resource_version),
        spec: Some(DeploymentSpec {
            replicas: Some(3),
            template: PodTemplateSpec {
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "api".to_string(),
                        image: Some(image.to_string()),
                        ..Container::default()
                    }],
                    ..PodSpec::default()
                }),
                ..PodTemplateSpec::default()
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    })
}

#[tokio::test]
async fn deployment_rollout_emits_only_the_spec_changes() {
    let (pipeline, store) = pipeline();

    let created = deployment("1", "nginx:1.25");
    assert_eq!(
        pipeline.process(ChangeKind::Added, &created).await.unwrap(),
        Some(PersistOutcome::Stored)
    );

    // Status-only churn while replicas come up.
    let status_update = deployment("2", "nginx:1.25");
    assert_eq!(
        pipeline
            .process(ChangeKind::Modified, &status_update)
            .await
            .unwrap(),
        None
    );

    let rollout = deployment("3", "nginx:1.26");
    assert_eq!(
        pipeline.process(ChangeKind::Modified, &rollout).await.unwrap(),
        Some(PersistOutcome::Stored)
    );

    assert_eq!(store.len(), 2);
    let event = store.get(1, "prod:default:deployment:api:3").unwrap();
    assert_eq!(
        event.description["images_changed"],
        json!([{"name": "api", "from": "nginx:1.25", "to": "nginx:1.26"}])
    );
}
