//! Watched resource kinds and the snapshot sum type.
//!
//! Every watch stream delivers raw `(change kind, resource snapshot)` pairs.
//! The snapshot is a tagged variant per supported resource kind, so the
//! classifier and transformers select behavior by pattern matching instead of
//! comparing kind strings.

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Event, Pod, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Raw transition type reported by the watch stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Resource appeared (or was listed at watch start)
    Added,
    /// Resource changed
    Modified,
    /// Resource was removed
    Deleted,
}

impl ChangeKind {
    /// Upstream wire label, e.g. `ADDED`
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "ADDED",
            ChangeKind::Modified => "MODIFIED",
            ChangeKind::Deleted => "DELETED",
        }
    }

    /// Lowercase status recorded on the stored event
    #[must_use]
    pub fn status_label(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// Resource kinds the connector can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Pod,
    Deployment,
    StatefulSet,
    DaemonSet,
    Service,
    ConfigMap,
    Secret,
    Ingress,
    Role,
    RoleBinding,
    Event,
}

impl ResourceKind {
    /// All supported kinds, in watch order.
    pub const ALL: [ResourceKind; 11] = [
        ResourceKind::Pod,
        ResourceKind::Deployment,
        ResourceKind::StatefulSet,
        ResourceKind::DaemonSet,
        ResourceKind::Service,
        ResourceKind::ConfigMap,
        ResourceKind::Secret,
        ResourceKind::Ingress,
        ResourceKind::Role,
        ResourceKind::RoleBinding,
        ResourceKind::Event,
    ];

    /// Canonical kind name, e.g. `StatefulSet`
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "Pod",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::StatefulSet => "StatefulSet",
            ResourceKind::DaemonSet => "DaemonSet",
            ResourceKind::Service => "Service",
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::Secret => "Secret",
            ResourceKind::Ingress => "Ingress",
            ResourceKind::Role => "Role",
            ResourceKind::RoleBinding => "RoleBinding",
            ResourceKind::Event => "Event",
        }
    }

    /// Lowercase label used in external ids and flat metadata
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "pod",
            ResourceKind::Deployment => "deployment",
            ResourceKind::StatefulSet => "statefulset",
            ResourceKind::DaemonSet => "daemonset",
            ResourceKind::Service => "service",
            ResourceKind::ConfigMap => "configmap",
            ResourceKind::Secret => "secret",
            ResourceKind::Ingress => "ingress",
            ResourceKind::Role => "role",
            ResourceKind::RoleBinding => "rolebinding",
            ResourceKind::Event => "event",
        }
    }

    /// API collection segment used in resource URLs
    #[must_use]
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "pods",
            ResourceKind::Deployment => "deployments",
            ResourceKind::StatefulSet => "statefulsets",
            ResourceKind::DaemonSet => "daemonsets",
            ResourceKind::Service => "services",
            ResourceKind::ConfigMap => "configmaps",
            ResourceKind::Secret => "secrets",
            ResourceKind::Ingress => "ingresses",
            ResourceKind::Role => "roles",
            ResourceKind::RoleBinding => "rolebindings",
            ResourceKind::Event => "events",
        }
    }

    /// Parse a kind name as it appears in configuration flags
    #[must_use]
    pub fn parse(value: &str) -> Option<ResourceKind> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(value) || k.plural().eq_ignore_ascii_case(value))
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed resource state, tagged by kind.
#[derive(Debug, Clone)]
pub enum ResourceSnapshot {
    Pod(Box<Pod>),
    Deployment(Box<Deployment>),
    StatefulSet(Box<StatefulSet>),
    DaemonSet(Box<DaemonSet>),
    Service(Box<Service>),
    ConfigMap(Box<ConfigMap>),
    Secret(Box<Secret>),
    Ingress(Box<Ingress>),
    Role(Box<Role>),
    RoleBinding(Box<RoleBinding>),
    Event(Box<Event>),
}

impl ResourceSnapshot {
    /// The kind tag of this snapshot
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSnapshot::Pod(_) => ResourceKind::Pod,
            ResourceSnapshot::Deployment(_) => ResourceKind::Deployment,
            ResourceSnapshot::StatefulSet(_) => ResourceKind::StatefulSet,
            ResourceSnapshot::DaemonSet(_) => ResourceKind::DaemonSet,
            ResourceSnapshot::Service(_) => ResourceKind::Service,
            ResourceSnapshot::ConfigMap(_) => ResourceKind::ConfigMap,
            ResourceSnapshot::Secret(_) => ResourceKind::Secret,
            ResourceSnapshot::Ingress(_) => ResourceKind::Ingress,
            ResourceSnapshot::Role(_) => ResourceKind::Role,
            ResourceSnapshot::RoleBinding(_) => ResourceKind::RoleBinding,
            ResourceSnapshot::Event(_) => ResourceKind::Event,
        }
    }

    /// Object metadata shared by every kind
    #[must_use]
    pub fn meta(&self) -> &ObjectMeta {
        match self {
            ResourceSnapshot::Pod(o) => &o.metadata,
            ResourceSnapshot::Deployment(o) => &o.metadata,
            ResourceSnapshot::StatefulSet(o) => &o.metadata,
            ResourceSnapshot::DaemonSet(o) => &o.metadata,
            ResourceSnapshot::Service(o) => &o.metadata,
            ResourceSnapshot::ConfigMap(o) => &o.metadata,
            ResourceSnapshot::Secret(o) => &o.metadata,
            ResourceSnapshot::Ingress(o) => &o.metadata,
            ResourceSnapshot::Role(o) => &o.metadata,
            ResourceSnapshot::RoleBinding(o) => &o.metadata,
            ResourceSnapshot::Event(o) => &o.metadata,
        }
    }

    /// Resource name; empty only for malformed objects
    #[must_use]
    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    /// Namespace, absent for cluster-scoped observations
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.meta().namespace.as_deref()
    }

    /// resourceVersion as reported by the API server
    #[must_use]
    pub fn resource_version(&self) -> &str {
        self.meta().resource_version.as_deref().unwrap_or_default()
    }
}

macro_rules! impl_snapshot_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for ResourceSnapshot {
            fn from(value: $ty) -> Self {
                ResourceSnapshot::$variant(Box::new(value))
            }
        })*
    };
}

impl_snapshot_from! {
    Pod => Pod,
    Deployment => Deployment,
    StatefulSet => StatefulSet,
    DaemonSet => DaemonSet,
    Service => Service,
    ConfigMap => ConfigMap,
    Secret => Secret,
    Ingress => Ingress,
    Role => Role,
    RoleBinding => RoleBinding,
    Event => Event,
}

/// Stable key into the diff cache: one composite format for every kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    pub cluster: String,
    pub namespace: Option<String>,
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceIdentity {
    /// Identity of an observed snapshot within the named cluster
    #[must_use]
    pub fn from_snapshot(cluster: &str, snapshot: &ResourceSnapshot) -> Self {
        Self {
            cluster: cluster.to_string(),
            namespace: snapshot.namespace().map(str::to_string),
            kind: snapshot.kind(),
            name: snapshot.name().to_string(),
        }
    }
}

impl std::fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.cluster,
            self.namespace.as_deref().unwrap_or("cluster"),
            self.kind.label(),
            self.name
        )
    }
}
