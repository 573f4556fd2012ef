//! Cluster API configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How live worker pods are discovered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Provider: `"kubernetes"` or `"static"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Base URL of the Kubernetes API server.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Namespace the worker pods run in.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Service-account bearer token file.
    #[serde(default = "default_token_path")]
    pub token_path: String,
    /// CA bundle used to verify the API server. Skipped when empty.
    #[serde(default = "default_ca_path")]
    pub ca_path: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Fixed pod names per `app` label, used by the `static` provider.
    #[serde(default)]
    pub static_pods: HashMap<String, Vec<String>>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_url: default_api_url(),
            namespace: default_namespace(),
            token_path: default_token_path(),
            ca_path: default_ca_path(),
            timeout_seconds: default_timeout(),
            static_pods: HashMap::new(),
        }
    }
}

fn default_provider() -> String {
    "kubernetes".to_string()
}

fn default_api_url() -> String {
    "https://kubernetes.default.svc".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_token_path() -> String {
    "/var/run/secrets/kubernetes.io/serviceaccount/token".to_string()
}

fn default_ca_path() -> String {
    "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt".to_string()
}

fn default_timeout() -> u64 {
    10
}
