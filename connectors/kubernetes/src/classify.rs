//! Significance classification.
//!
//! Per-kind policy deciding whether a raw transition is worth surfacing as an
//! operator-facing change event. Deterministic function of the change kind,
//! the snapshot, and the cached fingerprint; the caller applies the returned
//! cache update, so the policy itself stays pure and unit-testable without a
//! live cluster.

use crate::cache::Fingerprint;
use crate::snapshot::{ChangeKind, ResourceSnapshot};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Event, Pod, PodSpec, Secret};
use std::collections::BTreeMap;

/// Container waiting reasons that indicate a fatal condition.
pub const FATAL_WAITING_REASONS: [&str; 5] = [
    "CrashLoopBackOff",
    "ImagePullBackOff",
    "ErrImagePull",
    "CreateContainerConfigError",
    "InvalidImageName",
];

/// Container terminated reasons that indicate a crash.
pub const FATAL_TERMINATED_REASONS: [&str; 2] = ["Error", "OOMKilled"];

/// Normal-type cluster Event reasons that are still operationally meaningful:
/// image pull/start/kill, scheduling, scaling, health-check failure, back-off.
pub const NORMAL_EVENT_REASON_ALLOWLIST: [&str; 9] = [
    "Pulling",
    "Pulled",
    "Started",
    "Killing",
    "Scheduled",
    "FailedScheduling",
    "ScalingReplicaSet",
    "Unhealthy",
    "BackOff",
];

/// Secret type carrying a service account token; never ingested.
pub const SERVICE_ACCOUNT_TOKEN_TYPE: &str = "kubernetes.io/service-account-token";

/// Secret type carrying an embedded Helm release payload.
pub const HELM_RELEASE_SECRET_TYPE: &str = "helm.sh/release.v1";

/// Cache side effect the caller must apply after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheUpdate {
    /// Leave the cached fingerprint as is
    Keep,
    /// Overwrite the cached fingerprint
    Store(Fingerprint),
    /// Drop the cache entry (resource deleted)
    Remove,
}

/// Classification result: emit-or-suppress plus the cache update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub emit: bool,
    pub cache: CacheUpdate,
}

impl Verdict {
    fn emit(cache: CacheUpdate) -> Self {
        Self { emit: true, cache }
    }

    fn suppress(cache: CacheUpdate) -> Self {
        Self { emit: false, cache }
    }
}

/// Decide whether an observed transition is significant.
#[must_use]
pub fn classify(
    change: ChangeKind,
    snapshot: &ResourceSnapshot,
    prior: Option<&Fingerprint>,
) -> Verdict {
    match snapshot {
        ResourceSnapshot::Pod(pod) => classify_pod(change, pod, prior),
        ResourceSnapshot::Deployment(d) => classify_workload(change, workload_fingerprint_deployment(d), prior),
        ResourceSnapshot::StatefulSet(s) => classify_workload(change, workload_fingerprint_statefulset(s), prior),
        ResourceSnapshot::DaemonSet(d) => classify_workload(change, workload_fingerprint_daemonset(d), prior),
        // Topology and RBAC objects: creation and deletion matter, spec
        // churn does not.
        ResourceSnapshot::Service(_)
        | ResourceSnapshot::Ingress(_)
        | ResourceSnapshot::Role(_)
        | ResourceSnapshot::RoleBinding(_) => match change {
            ChangeKind::Added | ChangeKind::Deleted => Verdict::emit(CacheUpdate::Keep),
            ChangeKind::Modified => Verdict::suppress(CacheUpdate::Keep),
        },
        ResourceSnapshot::ConfigMap(cm) => classify_config_map(change, cm, prior),
        ResourceSnapshot::Secret(secret) => classify_secret(change, secret, prior),
        ResourceSnapshot::Event(event) => classify_cluster_event(change, event),
    }
}

fn classify_pod(change: ChangeKind, pod: &Pod, prior: Option<&Fingerprint>) -> Verdict {
    let current = pod_fingerprint(pod);
    match change {
        ChangeKind::Added => {
            let phase = pod
                .status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                .unwrap_or_default();
            // A Pending pod has nothing to report yet; seed the restart
            // counts so later transitions diff correctly.
            if phase == "Pending" {
                Verdict::suppress(CacheUpdate::Store(current))
            } else {
                Verdict::emit(CacheUpdate::Store(current))
            }
        }
        ChangeKind::Deleted => Verdict::emit(CacheUpdate::Remove),
        ChangeKind::Modified => {
            if pod_has_fatal_container(pod) {
                return Verdict::emit(CacheUpdate::Store(current));
            }
            let cached_counts = match prior {
                Some(Fingerprint::Pod { restart_counts }) => restart_counts.clone(),
                _ => BTreeMap::new(),
            };
            let Fingerprint::Pod { restart_counts } = &current else {
                return Verdict::suppress(CacheUpdate::Keep);
            };
            let restarted = restart_counts
                .iter()
                .any(|(name, count)| *count > cached_counts.get(name).copied().unwrap_or(0));
            if restarted {
                // Update immediately so the same count does not re-trigger.
                Verdict::emit(CacheUpdate::Store(current))
            } else {
                Verdict::suppress(CacheUpdate::Keep)
            }
        }
    }
}

fn pod_has_fatal_container(pod: &Pod) -> bool {
    let statuses = pod
        .status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref());
    let Some(statuses) = statuses else {
        return false;
    };
    statuses.iter().any(|cs| {
        let waiting = cs
            .state
            .as_ref()
            .and_then(|s| s.waiting.as_ref())
            .and_then(|w| w.reason.as_deref());
        let terminated = cs
            .state
            .as_ref()
            .and_then(|s| s.terminated.as_ref())
            .and_then(|t| t.reason.as_deref());
        waiting.is_some_and(|r| FATAL_WAITING_REASONS.contains(&r))
            || terminated.is_some_and(|r| FATAL_TERMINATED_REASONS.contains(&r))
    })
}

fn classify_workload(change: ChangeKind, current: Fingerprint, prior: Option<&Fingerprint>) -> Verdict {
    match change {
        ChangeKind::Added => Verdict::emit(CacheUpdate::Store(current)),
        ChangeKind::Deleted => Verdict::emit(CacheUpdate::Remove),
        ChangeKind::Modified => match prior {
            // Image list and declared replicas both unchanged: noise.
            Some(cached @ Fingerprint::Workload { .. }) if *cached == current => {
                Verdict::suppress(CacheUpdate::Keep)
            }
            _ => Verdict::emit(CacheUpdate::Store(current)),
        },
    }
}

fn classify_config_map(change: ChangeKind, cm: &ConfigMap, prior: Option<&Fingerprint>) -> Verdict {
    let current = config_map_fingerprint(cm);
    match change {
        ChangeKind::Added => Verdict::emit(CacheUpdate::Store(current)),
        ChangeKind::Deleted => Verdict::emit(CacheUpdate::Remove),
        ChangeKind::Modified => match prior {
            Some(cached @ Fingerprint::ConfigMap { .. }) if *cached == current => {
                Verdict::suppress(CacheUpdate::Keep)
            }
            Some(Fingerprint::ConfigMap { .. }) => Verdict::emit(CacheUpdate::Store(current)),
            // First observation: nothing to diff against yet.
            _ => Verdict::suppress(CacheUpdate::Store(current)),
        },
    }
}

fn classify_secret(change: ChangeKind, secret: &Secret, prior: Option<&Fingerprint>) -> Verdict {
    // Helm release secrets are a change log in themselves: every revision and
    // status transition lands as a fresh secret write worth surfacing.
    if secret.type_.as_deref() == Some(HELM_RELEASE_SECRET_TYPE) {
        return match change {
            ChangeKind::Deleted => Verdict::emit(CacheUpdate::Remove),
            _ => Verdict::emit(CacheUpdate::Keep),
        };
    }
    let current = secret_fingerprint(secret);
    match change {
        ChangeKind::Added => Verdict::emit(CacheUpdate::Store(current)),
        ChangeKind::Deleted => Verdict::emit(CacheUpdate::Remove),
        ChangeKind::Modified => match prior {
            Some(cached @ Fingerprint::Secret { .. }) if *cached == current => {
                Verdict::suppress(CacheUpdate::Keep)
            }
            Some(Fingerprint::Secret { .. }) => Verdict::emit(CacheUpdate::Store(current)),
            _ => Verdict::suppress(CacheUpdate::Store(current)),
        },
    }
}

fn classify_cluster_event(change: ChangeKind, event: &Event) -> Verdict {
    // Expiring Event objects get garbage collected; the deletion itself is
    // not a cluster change.
    if change == ChangeKind::Deleted {
        return Verdict::suppress(CacheUpdate::Keep);
    }
    if event.type_.as_deref() == Some("Warning") {
        return Verdict::emit(CacheUpdate::Keep);
    }
    let allowed = event
        .reason
        .as_deref()
        .is_some_and(|r| NORMAL_EVENT_REASON_ALLOWLIST.contains(&r));
    if allowed {
        Verdict::emit(CacheUpdate::Keep)
    } else {
        Verdict::suppress(CacheUpdate::Keep)
    }
}

/// Per-container restart counts of a pod.
#[must_use]
pub fn pod_fingerprint(pod: &Pod) -> Fingerprint {
    let restart_counts = pod
        .status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .map(|statuses| {
            statuses
                .iter()
                .map(|cs| (cs.name.clone(), cs.restart_count))
                .collect()
        })
        .unwrap_or_default();
    Fingerprint::Pod { restart_counts }
}

/// Container name to image map from a pod template.
#[must_use]
pub fn image_map(spec: Option<&PodSpec>) -> BTreeMap<String, String> {
    spec.map(|s| {
        s.containers
            .iter()
            .map(|c| (c.name.clone(), c.image.clone().unwrap_or_default()))
            .collect()
    })
    .unwrap_or_default()
}

/// Images plus declared replicas of a Deployment.
#[must_use]
pub fn workload_fingerprint_deployment(deployment: &Deployment) -> Fingerprint {
    let spec = deployment.spec.as_ref();
    Fingerprint::Workload {
        images: image_map(spec.and_then(|s| s.template.spec.as_ref())),
        replicas: spec.and_then(|s| s.replicas),
    }
}

/// Images plus declared replicas of a StatefulSet.
#[must_use]
pub fn workload_fingerprint_statefulset(set: &StatefulSet) -> Fingerprint {
    let spec = set.spec.as_ref();
    Fingerprint::Workload {
        images: image_map(spec.and_then(|s| s.template.spec.as_ref())),
        replicas: spec.and_then(|s| s.replicas),
    }
}

/// Images of a DaemonSet; daemon sets carry no declared replica count.
#[must_use]
pub fn workload_fingerprint_daemonset(set: &DaemonSet) -> Fingerprint {
    Fingerprint::Workload {
        images: image_map(set.spec.as_ref().and_then(|s| s.template.spec.as_ref())),
        replicas: None,
    }
}

/// Full data map of a ConfigMap.
#[must_use]
pub fn config_map_fingerprint(cm: &ConfigMap) -> Fingerprint {
    Fingerprint::ConfigMap {
        data: cm.data.clone().unwrap_or_default(),
    }
}

/// Sorted key names of a Secret. Values are never fingerprinted.
#[must_use]
pub fn secret_fingerprint(secret: &Secret) -> Fingerprint {
    let keys = secret
        .data
        .as_ref()
        .map(|d| d.keys().cloned().collect())
        .unwrap_or_default();
    Fingerprint::Secret { keys }
}
