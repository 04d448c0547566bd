//! Kubernetes change-ingestion connector.
//!
//! Watches a cluster for resource transitions, filters out the operational
//! noise, and records the significant changes as canonical timeline events.

mod cache;
mod classify;
mod config;
mod connector;
mod error;
mod pipeline;
mod sink;
mod snapshot;
mod transform;
mod watch;

#[cfg(test)]
mod classify_test;
#[cfg(test)]
mod pipeline_test;
#[cfg(test)]
mod watch_test;

use crate::config::ConnectorConfig;
use crate::connector::KubernetesConnector;
use event_store::MemoryEventStore;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    // kube's TLS stack needs a process-level crypto provider; pin ring before
    // any client is built. Errs only if one is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = ConnectorConfig::from_env()?;
    info!(
        "Starting Kubernetes connector for cluster {} (connection {})",
        config.cluster_name, config.connection_id
    );

    let client = config.build_client().await?;
    // In-memory store; the relational backend plugs in behind the same trait.
    let store = Arc::new(MemoryEventStore::new());
    let connector = KubernetesConnector::new(client, config.clone(), store);

    loop {
        match connector.run_cycle().await {
            Ok(summary) => {
                let failed = summary.failed_kinds();
                if !failed.is_empty() {
                    error!("Cycle completed with failed sessions: {failed:?}");
                }
            }
            Err(e) => error!("Ingestion cycle failed: {e}"),
        }
        tokio::time::sleep(config.poll_interval).await;
    }
}
