//! Cycle orchestration.
//!
//! One ingestion cycle opens every enabled resource-kind watch session
//! concurrently (one task per kind) and joins them with a single bounded
//! wait, so worst-case cycle latency is one session bound, not one per kind.

use crate::cache::MemoryFingerprintCache;
use crate::config::ConnectorConfig;
use crate::error::ConnectorError;
use crate::pipeline::Pipeline;
use crate::sink::IdempotentSink;
use crate::snapshot::{ResourceKind, ResourceSnapshot};
use crate::watch::{SessionEnd, SessionOutcome, run_session};
use event_store::ChangeEventStore;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Event, Pod, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Result of one ingestion cycle across all kinds.
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub outcomes: Vec<SessionOutcome>,
}

impl CycleSummary {
    /// Total snapshots drained across all sessions
    #[must_use]
    pub fn total_processed(&self) -> u64 {
        self.outcomes.iter().map(|o| o.processed).sum()
    }

    /// Kinds whose session ended in a transport or watch error
    #[must_use]
    pub fn failed_kinds(&self) -> Vec<ResourceKind> {
        self.outcomes
            .iter()
            .filter(|o| o.end == SessionEnd::Error)
            .map(|o| o.kind)
            .collect()
    }
}

/// Kubernetes change-ingestion connector for one cluster connection.
pub struct KubernetesConnector {
    client: Client,
    config: ConnectorConfig,
    pipeline: Arc<Pipeline>,
    /// Last resourceVersion seen per kind; the next cycle's sessions resume
    /// from these so transitions between cycles are not lost.
    resume_versions: Mutex<HashMap<ResourceKind, String>>,
}

impl KubernetesConnector {
    /// Wire the pipeline for one connection: a fresh diff cache, the
    /// idempotent sink over the given store.
    pub fn new(client: Client, config: ConnectorConfig, store: Arc<dyn ChangeEventStore>) -> Self {
        let pipeline = Pipeline::new(
            config.cluster_name.clone(),
            config.connection_id,
            Arc::new(MemoryFingerprintCache::new()),
            IdempotentSink::new(store),
        );
        Self {
            client,
            config,
            pipeline: Arc::new(pipeline),
            resume_versions: Mutex::new(HashMap::new()),
        }
    }

    /// Run one bounded ingestion cycle.
    ///
    /// An unreachable or unauthenticated API server fails the whole cycle
    /// before any session opens; per-kind failures after that stay local to
    /// their session.
    pub async fn run_cycle(&self) -> Result<CycleSummary, ConnectorError> {
        let version = self
            .client
            .apiserver_version()
            .await
            .map_err(ConnectorError::Kube)?;
        info!(
            "Starting ingestion cycle for cluster {} (server {}.{})",
            self.config.cluster_name, version.major, version.minor
        );

        let mut sessions: Vec<(ResourceKind, JoinHandle<SessionOutcome>)> = Vec::new();
        for kind in &self.config.kinds {
            let resume = self.resume_version(*kind);
            let handle = match kind {
                ResourceKind::Pod => self.spawn_session::<Pod>(*kind, resume),
                ResourceKind::Deployment => self.spawn_session::<Deployment>(*kind, resume),
                ResourceKind::StatefulSet => self.spawn_session::<StatefulSet>(*kind, resume),
                ResourceKind::DaemonSet => self.spawn_session::<DaemonSet>(*kind, resume),
                ResourceKind::Service => self.spawn_session::<Service>(*kind, resume),
                ResourceKind::ConfigMap => self.spawn_session::<ConfigMap>(*kind, resume),
                ResourceKind::Secret => self.spawn_session::<Secret>(*kind, resume),
                ResourceKind::Ingress => self.spawn_session::<Ingress>(*kind, resume),
                ResourceKind::Role => self.spawn_session::<Role>(*kind, resume),
                ResourceKind::RoleBinding => self.spawn_session::<RoleBinding>(*kind, resume),
                ResourceKind::Event => self.spawn_session::<Event>(*kind, resume),
            };
            sessions.push((*kind, handle));
        }

        let mut outcomes = Vec::with_capacity(sessions.len());
        for (kind, handle) in sessions {
            match handle.await {
                Ok(outcome) => {
                    self.record_resume_version(&outcome);
                    outcomes.push(outcome);
                }
                Err(e) => {
                    error!("{kind} watch session panicked: {e}");
                    outcomes.push(SessionOutcome {
                        kind,
                        processed: 0,
                        end: SessionEnd::Error,
                        resource_version: None,
                    });
                }
            }
        }

        let summary = CycleSummary { outcomes };
        info!(
            "Completed ingestion cycle for cluster {}: {} snapshots across {} kinds",
            self.config.cluster_name,
            summary.total_processed(),
            summary.outcomes.len()
        );
        Ok(summary)
    }

    fn spawn_session<K>(&self, kind: ResourceKind, resume: Option<String>) -> JoinHandle<SessionOutcome>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug
            + Send
            + 'static,
        ResourceSnapshot: From<K>,
    {
        let api: Api<K> = match self.config.namespace.as_deref() {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let pipeline = Arc::clone(&self.pipeline);
        let timeout = self.config.session_timeout;
        tokio::spawn(run_session(api, kind, pipeline, timeout, resume))
    }

    fn resume_version(&self, kind: ResourceKind) -> Option<String> {
        self.resume_versions
            .lock()
            .ok()
            .and_then(|versions| versions.get(&kind).cloned())
    }

    /// Store the session's last observed version for the next cycle; a
    /// cleared version (expired history) drops the entry so the next session
    /// lists fresh.
    fn record_resume_version(&self, outcome: &SessionOutcome) {
        if let Ok(mut versions) = self.resume_versions.lock() {
            match &outcome.resource_version {
                Some(version) => {
                    versions.insert(outcome.kind, version.clone());
                }
                None => {
                    versions.remove(&outcome.kind);
                }
            }
        }
    }
}

impl std::fmt::Debug for KubernetesConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubernetesConnector")
            .field("cluster", &self.config.cluster_name)
            .finish_non_exhaustive()
    }
}
