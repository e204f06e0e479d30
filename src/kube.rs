//! Kubernetes client configuration output
//!
//! Turns a successful login into the `users:` entry of a kubeconfig using
//! the `oidc` auth provider. When clusters are configured, a complete
//! kubeconfig (clusters, one context per cluster, user, current context) is
//! produced instead.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;

use crate::config::{AppConfig, ClusterConfig, KubeconfigDefaults};
use crate::error::LoginappError;
use crate::oidc::callback::TokenExchangeResult;
use crate::oidc::claims::Claims;

/// Everything needed to render credentials for one user.
#[derive(Debug, Clone)]
pub struct KubeUserInfo {
    pub username: String,
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub issuer_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub claims: Claims,
    pub clusters: Vec<ClusterConfig>,
    pub defaults: KubeconfigDefaults,
}

impl KubeUserInfo {
    /// Combines a callback result with the configuration that produced it.
    pub fn new(config: &AppConfig, result: TokenExchangeResult) -> Self {
        Self {
            username: result.username,
            id_token: result.id_token,
            refresh_token: result.refresh_token,
            issuer_url: config.oidc.issuer.url.clone(),
            client_id: config.web.main_client_id.clone(),
            client_secret: config.oidc.client.secret.clone(),
            claims: result.claims,
            clusters: config.clusters.clone(),
            defaults: config.web.kubeconfig.clone(),
        }
    }

    /// The `users:` entry for this user.
    pub fn user_entry(&self) -> NamedUser {
        NamedUser {
            name: self.username.clone(),
            user: User {
                auth_provider: AuthProvider {
                    name: "oidc".to_string(),
                    config: AuthProviderConfig {
                        client_id: self.client_id.clone(),
                        client_secret: self.client_secret.clone(),
                        id_token: self.id_token.clone(),
                        idp_issuer_url: self.issuer_url.clone(),
                        refresh_token: self.refresh_token.clone(),
                    },
                },
            },
        }
    }

    /// A full kubeconfig, or `None` when no cluster is configured.
    pub fn kubeconfig(&self) -> Option<Kubeconfig> {
        if self.clusters.is_empty() {
            return None;
        }

        let default_cluster = self
            .clusters
            .iter()
            .find(|c| c.name == self.defaults.default_cluster)
            .or_else(|| self.clusters.first())?;

        let context_name = |cluster: &ClusterConfig| {
            if cluster.name == default_cluster.name && !self.defaults.default_context.is_empty() {
                self.defaults.default_context.clone()
            } else {
                format!("{}/{}", cluster.name, self.username)
            }
        };

        Some(Kubeconfig {
            api_version: "v1".to_string(),
            kind: "Config".to_string(),
            clusters: self
                .clusters
                .iter()
                .map(|cluster| NamedCluster {
                    name: cluster.name.clone(),
                    cluster: Cluster {
                        server: cluster.server.clone(),
                        certificate_authority_data: cluster
                            .certificate_authority
                            .as_ref()
                            .map(|pem| STANDARD.encode(pem.as_bytes())),
                        insecure_skip_tls_verify: cluster.insecure_skip_tls_verify,
                    },
                })
                .collect(),
            contexts: self
                .clusters
                .iter()
                .map(|cluster| NamedContext {
                    name: context_name(cluster),
                    context: Context {
                        cluster: cluster.name.clone(),
                        namespace: self.defaults.default_namespace.clone(),
                        user: self.username.clone(),
                    },
                })
                .collect(),
            current_context: context_name(default_cluster),
            users: vec![self.user_entry()],
        })
    }

    /// YAML to paste into `~/.kube/config`.
    ///
    /// # Errors
    ///
    /// Returns [`LoginappError::Yaml`] if serialization fails.
    pub fn render_yaml(&self) -> Result<String, LoginappError> {
        let yaml = match self.kubeconfig() {
            Some(kubeconfig) => serde_yaml::to_string(&kubeconfig)?,
            None => serde_yaml::to_string(&[self.user_entry()])?,
        };
        Ok(yaml)
    }

    /// JSON document with the username, the claims and the kubeconfig data.
    pub fn render_json(&self) -> serde_json::Value {
        serde_json::json!({
            "username": self.username,
            "claims": self.claims,
            "user": self.user_entry(),
            "kubeconfig": self.kubeconfig(),
        })
    }
}

/// Complete kubeconfig document.
#[derive(Debug, Clone, Serialize)]
pub struct Kubeconfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub clusters: Vec<NamedCluster>,
    pub contexts: Vec<NamedContext>,
    #[serde(rename = "current-context")]
    pub current_context: String,
    pub users: Vec<NamedUser>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: Cluster,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    pub server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub insecure_skip_tls_verify: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamedContext {
    pub name: String,
    pub context: Context,
}

#[derive(Debug, Clone, Serialize)]
pub struct Context {
    pub cluster: String,
    pub namespace: String,
    pub user: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamedUser {
    pub name: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    #[serde(rename = "auth-provider")]
    pub auth_provider: AuthProvider,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthProvider {
    pub name: String,
    pub config: AuthProviderConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuthProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub id_token: String,
    pub idp_issuer_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}
