use crate::cache::Fingerprint;
use crate::classify::{
    CacheUpdate, classify, config_map_fingerprint, pod_fingerprint, secret_fingerprint,
    workload_fingerprint_deployment,
};
use crate::snapshot::{ChangeKind, ResourceSnapshot};
use k8s_openapi::ByteString;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, ContainerState, ContainerStateTerminated, ContainerStateWaiting,
    ContainerStatus, Event, Pod, PodSpec, PodStatus, PodTemplateSpec, Secret, Service,
};
use k8s_openapi::api::rbac::v1::RoleBinding;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

fn meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some("default".to_string()),
        resource_version: Some("1".to_string()),
        ..ObjectMeta::default()
    }
}

fn pod(phase: &str, statuses: Vec<ContainerStatus>) -> Pod {
    Pod {
        metadata: meta("api-1"),
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            container_statuses: Some(statuses),
            ..PodStatus::default()
        }),
        ..Pod::default()
    }
}

fn container_status(name: &str, restart_count: i32, state: Option<ContainerState>) -> ContainerStatus {
    ContainerStatus {
        name: name.to_string(),
        restart_count,
        state,
        ..ContainerStatus::default()
    }
}

fn waiting(reason: &str) -> ContainerState {
    ContainerState {
        waiting: Some(ContainerStateWaiting {
            reason: Some(reason.to_string()),
            ..ContainerStateWaiting::default()
        }),
        ..ContainerState::default()
    }
}

fn terminated(reason: &str, exit_code: i32) -> ContainerState {
    ContainerState {
        terminated: Some(ContainerStateTerminated {
            reason: Some(reason.to_string()),
            exit_code,
            ..ContainerStateTerminated::default()
        }),
        ..ContainerState::default()
    }
}

fn deployment(image: &str, replicas: i32) -> Deployment {
    Deployment {
        metadata: meta("api"),
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
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
    }
}

fn config_map(pairs: &[(&str, &str)]) -> ConfigMap {
    ConfigMap {
        metadata: meta("app-config"),
        data: Some(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ),
        ..ConfigMap::default()
    }
}

fn secret(type_: &str, keys: &[&str]) -> Secret {
    Secret {
        metadata: meta("db-credentials"),
        type_: Some(type_.to_string()),
        data: Some(
            keys.iter()
                .map(|k| ((*k).to_string(), ByteString(b"value".to_vec())))
                .collect(),
        ),
        ..Secret::default()
    }
}

fn cluster_event(type_: &str, reason: &str) -> Event {
    Event {
        metadata: meta("api-1.17a"),
        type_: Some(type_.to_string()),
        reason: Some(reason.to_string()),
        ..Event::default()
    }
}

#[test]
fn pending_pod_creation_is_suppressed_but_seeds_cache() {
    let pod = pod("Pending", vec![container_status("api", 0, None)]);
    let verdict = classify(ChangeKind::Added, &ResourceSnapshot::from(pod.clone()), None);
    assert!(!verdict.emit);
    assert_eq!(verdict.cache, CacheUpdate::Store(pod_fingerprint(&pod)));
}

#[test]
fn running_pod_creation_emits() {
    let pod = pod("Running", vec![container_status("api", 0, None)]);
    let verdict = classify(ChangeKind::Added, &ResourceSnapshot::from(pod), None);
    assert!(verdict.emit);
}

#[test]
fn pod_deletion_emits_and_clears_cache() {
    let pod = pod("Running", vec![]);
    let verdict = classify(ChangeKind::Deleted, &ResourceSnapshot::from(pod), None);
    assert!(verdict.emit);
    assert_eq!(verdict.cache, CacheUpdate::Remove);
}

#[test]
fn benign_pod_modification_is_suppressed() {
    let pod = pod("Running", vec![container_status("api", 0, None)]);
    let prior = pod_fingerprint(&pod);
    let verdict = classify(
        ChangeKind::Modified,
        &ResourceSnapshot::from(pod),
        Some(&prior),
    );
    assert!(!verdict.emit);
    assert_eq!(verdict.cache, CacheUpdate::Keep);
}

#[test]
fn restart_count_increase_emits_exactly_once() {
    let before = pod_fingerprint(&pod("Running", vec![container_status("api", 0, None)]));
    let restarted = pod(
        "Running",
        vec![container_status("api", 1, Some(terminated("Completed", 0)))],
    );

    let first = classify(
        ChangeKind::Modified,
        &ResourceSnapshot::from(restarted.clone()),
        Some(&before),
    );
    assert!(first.emit);
    let CacheUpdate::Store(updated) = first.cache else {
        panic!("expected updated fingerprint");
    };

    // Same snapshot redelivered with the fingerprint already advanced.
    let second = classify(
        ChangeKind::Modified,
        &ResourceSnapshot::from(restarted),
        Some(&updated),
    );
    assert!(!second.emit);
}

#[test]
fn crash_looping_pod_emits_even_without_restart_delta() {
    let pod = pod(
        "Running",
        vec![container_status("api", 3, Some(waiting("CrashLoopBackOff")))],
    );
    let prior = pod_fingerprint(&pod);
    let verdict = classify(
        ChangeKind::Modified,
        &ResourceSnapshot::from(pod),
        Some(&prior),
    );
    assert!(verdict.emit);
}

#[test]
fn oom_killed_pod_emits() {
    let pod = pod(
        "Running",
        vec![container_status("api", 1, Some(terminated("OOMKilled", 137)))],
    );
    let prior = pod_fingerprint(&pod);
    let verdict = classify(
        ChangeKind::Modified,
        &ResourceSnapshot::from(pod),
        Some(&prior),
    );
    assert!(verdict.emit);
}

#[test]
fn status_only_deployment_update_is_suppressed() {
    let d = deployment("nginx:1.25", 3);
    let prior = workload_fingerprint_deployment(&d);
    let verdict = classify(
        ChangeKind::Modified,
        &ResourceSnapshot::from(d),
        Some(&prior),
    );
    assert!(!verdict.emit);
}

#[test]
fn deployment_image_change_emits() {
    let prior = workload_fingerprint_deployment(&deployment("nginx:1.25", 3));
    let verdict = classify(
        ChangeKind::Modified,
        &ResourceSnapshot::from(deployment("nginx:1.26", 3)),
        Some(&prior),
    );
    assert!(verdict.emit);
}

#[test]
fn deployment_replica_change_emits() {
    let prior = workload_fingerprint_deployment(&deployment("nginx:1.25", 3));
    let verdict = classify(
        ChangeKind::Modified,
        &ResourceSnapshot::from(deployment("nginx:1.25", 5)),
        Some(&prior),
    );
    assert!(verdict.emit);
}

#[test]
fn deployment_modification_without_prior_fingerprint_emits() {
    let verdict = classify(
        ChangeKind::Modified,
        &ResourceSnapshot::from(deployment("nginx:1.25", 3)),
        None,
    );
    assert!(verdict.emit);
    assert!(matches!(verdict.cache, CacheUpdate::Store(_)));
}

#[test]
fn service_and_rbac_modifications_are_suppressed() {
    let service = ResourceSnapshot::from(Service {
        metadata: meta("api-svc"),
        ..Service::default()
    });
    let binding = ResourceSnapshot::from(RoleBinding {
        metadata: meta("deployer"),
        ..RoleBinding::default()
    });
    assert!(!classify(ChangeKind::Modified, &service, None).emit);
    assert!(!classify(ChangeKind::Modified, &binding, None).emit);
    assert!(classify(ChangeKind::Added, &service, None).emit);
    assert!(classify(ChangeKind::Deleted, &binding, None).emit);
}

#[test]
fn first_config_map_modification_seeds_without_emitting() {
    let cm = config_map(&[("max_connections", "100")]);
    let verdict = classify(ChangeKind::Modified, &ResourceSnapshot::from(cm.clone()), None);
    assert!(!verdict.emit);
    assert_eq!(verdict.cache, CacheUpdate::Store(config_map_fingerprint(&cm)));
}

#[test]
fn config_map_data_change_emits_after_seeding() {
    let prior = config_map_fingerprint(&config_map(&[("max_connections", "100")]));
    let changed = config_map(&[("max_connections", "100"), ("timeout", "30s")]);
    let verdict = classify(
        ChangeKind::Modified,
        &ResourceSnapshot::from(changed),
        Some(&prior),
    );
    assert!(verdict.emit);

    let same = config_map(&[("max_connections", "100")]);
    let verdict = classify(
        ChangeKind::Modified,
        &ResourceSnapshot::from(same),
        Some(&prior),
    );
    assert!(!verdict.emit);
}

#[test]
fn secret_key_set_change_emits_after_seeding() {
    let prior = secret_fingerprint(&secret("Opaque", &["username", "password"]));
    let renamed = secret("Opaque", &["username", "token"]);
    let verdict = classify(
        ChangeKind::Modified,
        &ResourceSnapshot::from(renamed),
        Some(&prior),
    );
    assert!(verdict.emit);
}

#[test]
fn secret_fingerprint_holds_key_names_only() {
    let fingerprint = secret_fingerprint(&secret("Opaque", &["password"]));
    let Fingerprint::Secret { keys } = fingerprint else {
        panic!("expected secret fingerprint");
    };
    assert_eq!(keys, vec!["password".to_string()]);
}

#[test]
fn helm_release_secret_always_emits() {
    let mut release = secret("helm.sh/release.v1", &["release"]);
    release.metadata.name = Some("sh.helm.release.v1.myapp.v2".to_string());
    let snapshot = ResourceSnapshot::from(release);
    assert!(classify(ChangeKind::Added, &snapshot, None).emit);
    assert!(classify(ChangeKind::Modified, &snapshot, None).emit);
    let deleted = classify(ChangeKind::Deleted, &snapshot, None);
    assert!(deleted.emit);
    assert_eq!(deleted.cache, CacheUpdate::Remove);
}

#[test]
fn warning_events_always_emit() {
    let event = ResourceSnapshot::from(cluster_event("Warning", "FailedMount"));
    assert!(classify(ChangeKind::Added, &event, None).emit);
}

#[test]
fn normal_events_pass_only_on_the_allow_list() {
    let scheduled = ResourceSnapshot::from(cluster_event("Normal", "Scheduled"));
    assert!(classify(ChangeKind::Added, &scheduled, None).emit);

    let leader = ResourceSnapshot::from(cluster_event("Normal", "LeaderElection"));
    assert!(!classify(ChangeKind::Added, &leader, None).emit);
}

#[test]
fn expired_event_deletion_is_suppressed() {
    let event = ResourceSnapshot::from(cluster_event("Warning", "BackOff"));
    assert!(!classify(ChangeKind::Deleted, &event, None).emit);
}

#[test]
fn pod_fingerprint_tracks_each_container() {
    let pod = pod(
        "Running",
        vec![
            container_status("api", 2, None),
            container_status("sidecar", 0, None),
        ],
    );
    let Fingerprint::Pod { restart_counts } = pod_fingerprint(&pod) else {
        panic!("expected pod fingerprint");
    };
    let expected: BTreeMap<String, i32> =
        [("api".to_string(), 2), ("sidecar".to_string(), 0)].into();
    assert_eq!(restart_counts, expected);
}
