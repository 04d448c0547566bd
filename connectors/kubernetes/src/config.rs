//! Connector configuration.
//!
//! All settings come from the environment. Validation runs before any watch
//! session opens; an unsupported combination (a token without a server, or
//! vice versa) fails fast instead of surfacing later as an opaque transport
//! error.

use crate::error::ConnectorError;
use crate::snapshot::ResourceKind;
use kube::config::{
    AuthInfo, Cluster, Context, KubeConfigOptions, Kubeconfig, NamedAuthInfo, NamedCluster,
    NamedContext,
};
use kube::{Client, Config};
use secrecy::SecretString;
use std::env;
use std::time::Duration;

/// Runtime configuration for one cluster connection.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Cluster display name used in external ids and URLs
    pub cluster_name: String,
    /// Explicit API server URL; absent means infer (in-cluster, then local
    /// kubeconfig context)
    pub api_server: Option<String>,
    /// Bearer token paired with `api_server`
    pub token: Option<String>,
    /// Base64 PEM bundle for the server; without it an explicit server is
    /// trusted blindly (development default)
    pub ca_data: Option<String>,
    /// Single namespace to watch; absent means all namespaces
    pub namespace: Option<String>,
    /// Connection id events are recorded under
    pub connection_id: i64,
    /// Delay between ingestion cycles
    pub poll_interval: Duration,
    /// Wall-clock bound on each watch session
    pub session_timeout: Duration,
    /// Resource kinds to watch this cycle
    pub kinds: Vec<ResourceKind>,
}

impl ConnectorConfig {
    /// Load configuration from environment variables.
    ///
    /// `CONNECTION_ID` is required. `CLUSTER_NAME` defaults to `default`,
    /// `POLL_INTERVAL_SECS` and `SESSION_TIMEOUT_SECS` to 300, and
    /// `WATCH_KINDS` (comma-separated kind names) to every supported kind.
    pub fn from_env() -> Result<Self, ConnectorError> {
        let connection_id = env::var("CONNECTION_ID")
            .map_err(|_| {
                ConnectorError::InvalidConfig(
                    "CONNECTION_ID environment variable is required".to_string(),
                )
            })?
            .parse::<i64>()
            .map_err(|e| ConnectorError::InvalidConfig(format!("CONNECTION_ID: {e}")))?;

        let kinds = match env::var("WATCH_KINDS") {
            Ok(raw) => parse_kinds(&raw)?,
            Err(_) => ResourceKind::ALL.to_vec(),
        };

        let config = Self {
            cluster_name: env::var("CLUSTER_NAME").unwrap_or_else(|_| "default".to_string()),
            api_server: env::var("API_SERVER").ok().filter(|s| !s.is_empty()),
            token: env::var("TOKEN").ok().filter(|s| !s.is_empty()),
            ca_data: env::var("CLUSTER_CA_DATA").ok().filter(|s| !s.is_empty()),
            namespace: env::var("WATCH_NAMESPACE").ok().filter(|s| !s.is_empty()),
            connection_id,
            poll_interval: Duration::from_secs(env_secs("POLL_INTERVAL_SECS", 300)?),
            session_timeout: Duration::from_secs(env_secs("SESSION_TIMEOUT_SECS", 300)?),
            kinds,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject unsupported combinations before any subscription opens.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        match (&self.api_server, &self.token) {
            (Some(_), None) => {
                return Err(ConnectorError::InvalidConfig(
                    "API_SERVER requires TOKEN".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(ConnectorError::InvalidConfig(
                    "TOKEN requires API_SERVER".to_string(),
                ));
            }
            _ => {}
        }
        if self.kinds.is_empty() {
            return Err(ConnectorError::InvalidConfig(
                "no resource kinds enabled".to_string(),
            ));
        }
        if self.session_timeout.is_zero() {
            return Err(ConnectorError::InvalidConfig(
                "SESSION_TIMEOUT_SECS must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the cluster client this connector authenticates with.
    ///
    /// An explicit server+token pair becomes a synthetic kubeconfig;
    /// otherwise the standard inference chain applies (in-cluster service
    /// account, then the local kubeconfig context).
    pub async fn build_client(&self) -> Result<Client, ConnectorError> {
        let config = match (&self.api_server, &self.token) {
            (Some(server), Some(token)) => {
                let kubeconfig = self.token_kubeconfig(server, token);
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| ConnectorError::KubeConfig(e.to_string()))?
            }
            (None, None) => Config::infer()
                .await
                .map_err(|e| ConnectorError::KubeConfig(e.to_string()))?,
            // validate() rejects the mixed combinations
            _ => {
                return Err(ConnectorError::InvalidConfig(
                    "API_SERVER and TOKEN must be provided together".to_string(),
                ));
            }
        };
        Client::try_from(config).map_err(ConnectorError::Kube)
    }

    fn token_kubeconfig(&self, server: &str, token: &str) -> Kubeconfig {
        Kubeconfig {
            clusters: vec![NamedCluster {
                name: self.cluster_name.clone(),
                cluster: Some(Cluster {
                    server: Some(server.to_string()),
                    certificate_authority_data: self.ca_data.clone(),
                    insecure_skip_tls_verify: self.ca_data.is_none().then_some(true),
                    ..Cluster::default()
                }),
            }],
            auth_infos: vec![NamedAuthInfo {
                name: "connector".to_string(),
                auth_info: Some(AuthInfo {
                    token: Some(SecretString::from(token.to_string())),
                    ..AuthInfo::default()
                }),
            }],
            contexts: vec![NamedContext {
                name: "connector".to_string(),
                context: Some(Context {
                    cluster: self.cluster_name.clone(),
                    user: Some("connector".to_string()),
                    ..Context::default()
                }),
            }],
            current_context: Some("connector".to_string()),
            ..Kubeconfig::default()
        }
    }
}

fn env_secs(name: &str, default: u64) -> Result<u64, ConnectorError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| ConnectorError::InvalidConfig(format!("{name}: {e}"))),
        Err(_) => Ok(default),
    }
}

fn parse_kinds(raw: &str) -> Result<Vec<ResourceKind>, ConnectorError> {
    let mut kinds = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let kind = ResourceKind::parse(part).ok_or_else(|| {
            ConnectorError::InvalidConfig(format!("unknown resource kind: {part}"))
        })?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ConnectorConfig {
        ConnectorConfig {
            cluster_name: "prod".to_string(),
            api_server: None,
            token: None,
            ca_data: None,
            namespace: None,
            connection_id: 1,
            poll_interval: Duration::from_secs(300),
            session_timeout: Duration::from_secs(300),
            kinds: ResourceKind::ALL.to_vec(),
        }
    }

    #[test]
    fn server_without_token_is_rejected() {
        let mut config = base_config();
        config.api_server = Some("https://10.0.0.1:6443".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn token_without_server_is_rejected() {
        let mut config = base_config();
        config.token = Some("abc".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn inferred_context_is_accepted() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn no_kinds_is_rejected() {
        let mut config = base_config();
        config.kinds.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn kind_flags_parse_names_and_plurals() {
        let kinds = parse_kinds("pods, Deployment,configmaps").unwrap();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::Pod,
                ResourceKind::Deployment,
                ResourceKind::ConfigMap
            ]
        );
        assert!(parse_kinds("pods,widgets").is_err());
    }
}
