//! Live worker pod discovery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use tator_core::config::cluster::ClusterConfig;
use tator_core::error::{AppError, ErrorKind};
use tator_core::result::AppResult;

/// Lists the pods currently serving a worker pool.
#[async_trait]
pub trait ClusterApi: Send + Sync + std::fmt::Debug + 'static {
    /// Names of running pods carrying the label `app=<app_label>`.
    async fn list_pod_names(&self, app_label: &str) -> AppResult<Vec<String>>;
}

/// Build the cluster client named by `config.provider`.
pub fn build_cluster_api(config: &ClusterConfig) -> AppResult<Arc<dyn ClusterApi>> {
    match config.provider.as_str() {
        "kubernetes" => Ok(Arc::new(KubernetesClusterApi::new(config)?)),
        "static" => Ok(Arc::new(StaticClusterApi::new(config.static_pods.clone()))),
        other => Err(AppError::configuration(format!(
            "Unknown cluster provider: '{other}'. Supported: kubernetes, static"
        ))),
    }
}

/// Error for a non-success HTTP status from an upstream service. A 503
/// means the service is up but refusing work.
pub(crate) fn upstream_status_error(status: reqwest::StatusCode, message: String) -> AppError {
    if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
        AppError::service_unavailable(message)
    } else {
        AppError::external(message)
    }
}

/// Kubernetes API client using the pod's service-account credentials.
#[derive(Debug, Clone)]
pub struct KubernetesClusterApi {
    http: reqwest::Client,
    api_url: String,
    namespace: String,
    token_path: String,
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    metadata: PodMetadata,
}

#[derive(Debug, Deserialize)]
struct PodMetadata {
    name: String,
}

impl KubernetesClusterApi {
    /// Create a client from the cluster settings. The CA bundle is loaded
    /// when present; the bearer token is re-read on every request.
    pub fn new(config: &ClusterConfig) -> AppResult<Self> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_seconds));

        if !config.ca_path.is_empty() {
            match std::fs::read(&config.ca_path) {
                Ok(pem) => {
                    let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                        AppError::with_source(
                            ErrorKind::Configuration,
                            format!("Invalid cluster CA bundle at {}", config.ca_path),
                            e,
                        )
                    })?;
                    builder = builder.add_root_certificate(cert);
                }
                Err(e) => debug!(path = %config.ca_path, error = %e, "Cluster CA bundle not loaded"),
            }
        }

        let http = builder.build().map_err(|e| {
            AppError::with_source(
                ErrorKind::Configuration,
                "Failed to build cluster HTTP client",
                e,
            )
        })?;

        info!(api_url = %config.api_url, namespace = %config.namespace, "Kubernetes cluster API configured");

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            token_path: config.token_path.clone(),
        })
    }

    fn pods_url(&self) -> String {
        format!("{}/api/v1/namespaces/{}/pods", self.api_url, self.namespace)
    }

    async fn bearer_token(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.token_path).await {
            Ok(token) => Some(token.trim().to_string()),
            Err(e) => {
                debug!(path = %self.token_path, error = %e, "No service-account token");
                None
            }
        }
    }
}

#[async_trait]
impl ClusterApi for KubernetesClusterApi {
    async fn list_pod_names(&self, app_label: &str) -> AppResult<Vec<String>> {
        let label_selector = format!("app={app_label}");
        let url = reqwest::Url::parse_with_params(
            &self.pods_url(),
            [
                ("labelSelector", label_selector.as_str()),
                ("fieldSelector", "status.phase=Running"),
            ],
        )
        .map_err(|e| {
            AppError::with_source(ErrorKind::Configuration, "Invalid cluster API URL", e)
        })?;
        let mut request = self.http.get(url);
        if let Some(token) = self.bearer_token().await {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            AppError::with_source(ErrorKind::ExternalService, "Cluster API request failed", e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(upstream_status_error(
                status,
                format!("Cluster API returned {status} listing pods for app={app_label}"),
            ));
        }

        let pods: PodList = response.json().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ExternalService,
                "Malformed cluster API pod list",
                e,
            )
        })?;

        Ok(pods.items.into_iter().map(|p| p.metadata.name).collect())
    }
}

/// A fixed pod inventory per label, editable at runtime.
#[derive(Debug, Default)]
pub struct StaticClusterApi {
    pods: RwLock<HashMap<String, Vec<String>>>,
}

impl StaticClusterApi {
    /// Start from `pods`, keyed by `app` label.
    pub fn new(pods: HashMap<String, Vec<String>>) -> Self {
        Self {
            pods: RwLock::new(pods),
        }
    }

    /// Replace the pods serving `app_label`.
    pub async fn set_pods(&self, app_label: &str, pods: Vec<String>) {
        self.pods.write().await.insert(app_label.to_string(), pods);
    }
}

#[async_trait]
impl ClusterApi for StaticClusterApi {
    async fn list_pod_names(&self, app_label: &str) -> AppResult<Vec<String>> {
        Ok(self
            .pods
            .read()
            .await
            .get(app_label)
            .cloned()
            .unwrap_or_default())
    }
}
