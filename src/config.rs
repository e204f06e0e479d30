//! Configuration management for Loginapp
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//!
//! Precedence, highest first: CLI flags, `LOGINAPP_*` environment
//! variables, the YAML file, built-in defaults.

use std::fmt;
use std::path::Path;

use rand::RngCore as _;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::cli::ConfigOverrides;
use crate::error::{LoginappError, Result};

/// Main configuration structure for Loginapp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,

    /// Listen `ip:port`
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Secret mixed into the CSRF state token. Must be identical across
    /// replicas; generated at random when empty.
    #[serde(default, skip_serializing)]
    pub secret: String,

    /// OpenID Connect client configuration
    #[serde(default)]
    pub oidc: OidcConfig,

    /// Output customization
    #[serde(default)]
    pub web: WebConfig,

    /// Metrics exporter settings
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,

    /// Clusters rendered in the full kubeconfig output
    #[serde(default)]
    pub clusters: Vec<ClusterConfig>,
}

fn default_name() -> String {
    "Loginapp".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            listen: default_listen(),
            secret: String::new(),
            oidc: OidcConfig::default(),
            web: WebConfig::default(),
            metrics: MetricsConfig::default(),
            log: LogConfig::default(),
            clusters: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// OIDC
// ---------------------------------------------------------------------------

/// OpenID Connect configuration (the client configuration record)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OidcConfig {
    /// Client identity registered with the issuer
    #[serde(default)]
    pub client: OidcClientConfig,

    /// Issuer location and trust settings
    #[serde(default)]
    pub issuer: OidcIssuerConfig,

    /// Deprecated scopes and extra authorization parameters
    #[serde(default)]
    pub extra: OidcExtraConfig,

    /// Static scopes. `None` selects the legacy default block
    /// (`openid profile email groups`) merged after the cross-client scopes.
    #[serde(default)]
    pub scopes: Option<Vec<String>>,

    /// Client IDs the issued token should also be valid for
    #[serde(default, alias = "crossClients")]
    pub cross_clients: Vec<String>,

    /// Whether to request `offline_access`
    #[serde(default, alias = "offlineAsScope")]
    pub offline_as_scope: OfflineAccess,
}

/// Client identity. The secret is redacted from `Debug` output.
#[derive(Clone, Serialize, Deserialize)]
pub struct OidcClientConfig {
    /// Client ID
    #[serde(default = "default_client_id")]
    pub id: String,

    /// Client secret
    #[serde(default, skip_serializing)]
    pub secret: String,

    /// Redirect URL, must match the one registered with the issuer
    #[serde(default, alias = "redirectURL")]
    pub redirect_url: String,
}

fn default_client_id() -> String {
    "loginapp".to_string()
}

impl Default for OidcClientConfig {
    fn default() -> Self {
        Self {
            id: default_client_id(),
            secret: String::new(),
            redirect_url: String::new(),
        }
    }
}

impl fmt::Debug for OidcClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OidcClientConfig")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .field("redirect_url", &self.redirect_url)
            .finish()
    }
}

/// Issuer location and TLS trust settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OidcIssuerConfig {
    /// Issuer URL, without `/.well-known/openid-configuration`
    #[serde(default)]
    pub url: String,

    /// PEM bundle of CAs trusted for the issuer; empty means system roots
    #[serde(default, alias = "rootCA")]
    pub root_ca: String,

    /// Accept any issuer certificate
    #[serde(default, alias = "insecureSkipVerify")]
    pub insecure_skip_verify: bool,
}

/// Extra OIDC parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OidcExtraConfig {
    /// Deprecated: use `oidc.scopes` instead
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Parameters appended verbatim to the authorization URL, in order
    #[serde(default, alias = "authCodeOpts")]
    pub auth_code_opts: AuthCodeOptions,
}

/// Tri-state offline access flag.
///
/// Deserialized from an optional boolean: absent or `null` is
/// [`OfflineAccess::Unset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum OfflineAccess {
    /// Ask for `offline_access` only when the provider supports it
    #[default]
    Unset,
    /// Always ask for `offline_access`
    Enabled,
    /// Never ask for `offline_access`
    Disabled,
}

impl From<Option<bool>> for OfflineAccess {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Self::Unset,
            Some(true) => Self::Enabled,
            Some(false) => Self::Disabled,
        }
    }
}

impl From<OfflineAccess> for Option<bool> {
    fn from(value: OfflineAccess) -> Self {
        match value {
            OfflineAccess::Unset => None,
            OfflineAccess::Enabled => Some(true),
            OfflineAccess::Disabled => Some(false),
        }
    }
}

/// Ordered key/value pairs appended to the authorization URL.
///
/// Deserialized from a YAML mapping while keeping document order, so the
/// resulting query string is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthCodeOptions(Vec<(String, String)>);

impl AuthCodeOptions {
    /// Builds options from pairs, keeping their order
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// Iterates over the pairs in configured order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Serialize for AuthCodeOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AuthCodeOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedPairsVisitor;

        impl<'de> Visitor<'de> for OrderedPairsVisitor {
            type Value = AuthCodeOptions;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a mapping of string keys to scalar values")
            }

            fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<Self::Value, E> {
                Ok(AuthCodeOptions::default())
            }

            fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, ScalarString>()? {
                    pairs.push((key, value.0));
                }
                Ok(AuthCodeOptions(pairs))
            }
        }

        deserializer.deserialize_any(OrderedPairsVisitor)
    }
}

/// A YAML scalar read as text (`prompt: login`, `max_age: 300`, `x: true`).
struct ScalarString(String);

impl<'de> Deserialize<'de> for ScalarString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match serde_yaml::Value::deserialize(deserializer)? {
            serde_yaml::Value::String(s) => Ok(Self(s)),
            serde_yaml::Value::Number(n) => Ok(Self(n.to_string())),
            serde_yaml::Value::Bool(b) => Ok(Self(b.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "expected a scalar value, found {:?}",
                other
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Web output
// ---------------------------------------------------------------------------

/// Output customization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Claim used as the kubeconfig user name
    #[serde(default = "default_main_username_claim", alias = "mainUsernameClaim")]
    pub main_username_claim: String,

    /// Client ID shown in the rendered kubeconfig; defaults to `oidc.client.id`
    #[serde(default, alias = "mainClientID")]
    pub main_client_id: String,

    /// Defaults for the full kubeconfig output
    #[serde(default)]
    pub kubeconfig: KubeconfigDefaults,
}

fn default_main_username_claim() -> String {
    "name".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            main_username_claim: default_main_username_claim(),
            main_client_id: String::new(),
            kubeconfig: KubeconfigDefaults::default(),
        }
    }
}

/// Defaults for the full kubeconfig output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeconfigDefaults {
    /// Cluster selected by the default context; first cluster when empty
    #[serde(default, alias = "defaultCluster")]
    pub default_cluster: String,

    /// Namespace set on every generated context
    #[serde(default = "default_namespace", alias = "defaultNamespace")]
    pub default_namespace: String,

    /// Name of the current context; `<cluster>/<username>` when empty
    #[serde(default, alias = "defaultContext")]
    pub default_context: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Default for KubeconfigDefaults {
    fn default() -> Self {
        Self {
            default_cluster: String::new(),
            default_namespace: default_namespace(),
            default_context: String::new(),
        }
    }
}

/// A cluster rendered in the full kubeconfig output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Cluster name
    pub name: String,

    /// API server URL
    pub server: String,

    /// PEM encoded CA of the API server
    #[serde(default, alias = "certificateAuthority")]
    pub certificate_authority: Option<String>,

    /// Skip API server certificate validation
    #[serde(default, alias = "insecureSkipTlsVerify")]
    pub insecure_skip_tls_verify: bool,
}

// ---------------------------------------------------------------------------
// Metrics and logging
// ---------------------------------------------------------------------------

/// Metrics exporter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Port of the Prometheus listener
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `debug`, `info`, `warning` or `error`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged, so the service can be configured from the environment alone.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `overrides` - CLI flag overrides
    /// * `verbose` - Force the debug log level
    ///
    /// # Returns
    ///
    /// Returns the loaded configuration, without defaults derived from other
    /// fields applied and without validation
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, overrides: &ConfigOverrides, verbose: bool) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(overrides, verbose);

        Ok(config)
    }

    /// Load, complete and validate a configuration in one step.
    ///
    /// `fallback_secret` is reused when the loaded configuration carries no
    /// secret, so a reload keeps CSRF tokens issued before it valid.
    ///
    /// # Errors
    ///
    /// Returns error if loading or validation fails
    pub fn resolve(
        path: &str,
        overrides: &ConfigOverrides,
        verbose: bool,
        fallback_secret: Option<&str>,
    ) -> Result<Self> {
        let mut config = Self::load(path, overrides, verbose)?;
        config.apply_defaults(fallback_secret);
        config.validate()?;
        tracing::debug!(
            name = %config.name,
            listen = %config.listen,
            issuer = %config.oidc.issuer.url,
            client = ?config.oidc.client,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parse a configuration from a YAML file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LoginappError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&contents)
    }

    /// Parse a configuration from YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| LoginappError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(name) = std::env::var("LOGINAPP_NAME") {
            self.name = name;
        }

        if let Ok(listen) = std::env::var("LOGINAPP_LISTEN") {
            self.listen = listen;
        }

        if let Ok(secret) = std::env::var("LOGINAPP_SECRET") {
            self.secret = secret;
        }

        // OIDC client and issuer
        if let Ok(id) = std::env::var("LOGINAPP_OIDC_CLIENT_ID") {
            self.oidc.client.id = id;
        }

        if let Ok(secret) = std::env::var("LOGINAPP_OIDC_CLIENT_SECRET") {
            self.oidc.client.secret = secret;
        }

        if let Ok(redirect_url) = std::env::var("LOGINAPP_OIDC_CLIENT_REDIRECT_URL") {
            self.oidc.client.redirect_url = redirect_url;
        }

        if let Ok(url) = std::env::var("LOGINAPP_OIDC_ISSUER_URL") {
            self.oidc.issuer.url = url;
        }

        if let Ok(root_ca) = std::env::var("LOGINAPP_OIDC_ISSUER_ROOT_CA") {
            self.oidc.issuer.root_ca = root_ca;
        }

        if let Ok(skip) = std::env::var("LOGINAPP_OIDC_ISSUER_INSECURE_SKIP_VERIFY") {
            match parse_bool(&skip) {
                Some(value) => self.oidc.issuer.insecure_skip_verify = value,
                None => tracing::warn!("Invalid LOGINAPP_OIDC_ISSUER_INSECURE_SKIP_VERIFY: {}", skip),
            }
        }

        // Scopes
        if let Ok(scopes) = std::env::var("LOGINAPP_OIDC_SCOPES") {
            self.oidc.scopes = Some(split_list(&scopes));
        }

        if let Ok(scopes) = std::env::var("LOGINAPP_OIDC_EXTRA_SCOPES") {
            self.oidc.extra.scopes = split_list(&scopes);
        }

        if let Ok(clients) = std::env::var("LOGINAPP_OIDC_CROSS_CLIENTS") {
            self.oidc.cross_clients = split_list(&clients);
        }

        if let Ok(offline) = std::env::var("LOGINAPP_OIDC_OFFLINE_AS_SCOPE") {
            match parse_bool(&offline) {
                Some(value) => self.oidc.offline_as_scope = Some(value).into(),
                None => tracing::warn!("Invalid LOGINAPP_OIDC_OFFLINE_AS_SCOPE: {}", offline),
            }
        }

        // Web output
        if let Ok(claim) = std::env::var("LOGINAPP_WEB_MAIN_USERNAME_CLAIM") {
            self.web.main_username_claim = claim;
        }

        if let Ok(client_id) = std::env::var("LOGINAPP_WEB_MAIN_CLIENT_ID") {
            self.web.main_client_id = client_id;
        }

        // Metrics and logging
        if let Ok(port) = std::env::var("LOGINAPP_METRICS_PORT") {
            if let Ok(value) = port.parse() {
                self.metrics.port = value;
            } else {
                tracing::warn!("Invalid LOGINAPP_METRICS_PORT: {}", port);
            }
        }

        if let Ok(level) = std::env::var("LOGINAPP_LOG_LEVEL") {
            self.log.level = level;
        }

        if let Ok(format) = std::env::var("LOGINAPP_LOG_FORMAT") {
            self.log.format = format;
        }
    }

    fn apply_cli_overrides(&mut self, overrides: &ConfigOverrides, verbose: bool) {
        if verbose {
            self.log.level = "debug".to_string();
        }

        if let Some(name) = &overrides.name {
            self.name = name.clone();
        }

        if let Some(listen) = &overrides.listen {
            self.listen = listen.clone();
        }

        if let Some(id) = &overrides.oidc_client_id {
            self.oidc.client.id = id.clone();
        }

        if let Some(redirect_url) = &overrides.oidc_client_redirect_url {
            self.oidc.client.redirect_url = redirect_url.clone();
        }

        if let Some(url) = &overrides.oidc_issuer_url {
            self.oidc.issuer.url = url.clone();
        }

        if let Some(root_ca) = &overrides.oidc_issuer_root_ca {
            self.oidc.issuer.root_ca = root_ca.clone();
        }

        if overrides.oidc_issuer_insecure_skip_verify {
            self.oidc.issuer.insecure_skip_verify = true;
        }

        if let Some(scopes) = &overrides.oidc_scopes {
            self.oidc.scopes = Some(scopes.clone());
        }

        if let Some(clients) = &overrides.oidc_cross_clients {
            self.oidc.cross_clients = clients.clone();
        }

        if let Some(offline) = overrides.oidc_offline_as_scope {
            self.oidc.offline_as_scope = Some(offline).into();
        }

        if let Some(claim) = &overrides.web_main_username_claim {
            self.web.main_username_claim = claim.clone();
        }

        if let Some(port) = overrides.metrics_port {
            self.metrics.port = port;
        }
    }

    /// Fill in values derived from other fields.
    ///
    /// - an empty `secret` becomes `fallback_secret`, or 32 random bytes hex
    ///   encoded (with a warning, since replicas will then disagree)
    /// - an empty `web.main_client_id` becomes `oidc.client.id`
    /// - an empty `web.main_username_claim` becomes `name`
    pub fn apply_defaults(&mut self, fallback_secret: Option<&str>) {
        if self.secret.is_empty() {
            match fallback_secret {
                Some(previous) if !previous.is_empty() => {
                    self.secret = previous.to_string();
                }
                _ => {
                    tracing::warn!(
                        "No secret defined, using a random secret. Requests cannot be load balanced between replicas without a shared secret"
                    );
                    self.secret = random_secret();
                }
            }
        }

        if self.web.main_client_id.is_empty() {
            tracing::info!(
                "No web.main_client_id specified, using default: {}",
                self.oidc.client.id
            );
            self.web.main_client_id = self.oidc.client.id.clone();
        }

        if self.web.main_username_claim.is_empty() {
            self.web.main_username_claim = default_main_username_claim();
        }
    }

    /// Validate the configuration
    ///
    /// Every check runs and each failure is logged; the returned error lists
    /// all of them.
    ///
    /// # Errors
    ///
    /// Returns [`LoginappError::Config`] if any check fails
    pub fn validate(&self) -> Result<()> {
        let mut failures: Vec<String> = Vec::new();

        let required = [
            (self.name.is_empty(), "no name specified"),
            (self.listen.is_empty(), "no listen 'ip:port' specified"),
            (self.oidc.client.id.is_empty(), "no oidc.client.id specified"),
            (
                self.oidc.client.secret.is_empty(),
                "no oidc.client.secret specified",
            ),
            (
                self.oidc.client.redirect_url.is_empty(),
                "no oidc.client.redirect_url specified",
            ),
            (self.oidc.issuer.url.is_empty(), "no oidc.issuer.url specified"),
        ];
        for (failed, message) in required {
            if failed {
                failures.push(message.to_string());
            }
        }

        if !self.oidc.client.redirect_url.is_empty()
            && url::Url::parse(&self.oidc.client.redirect_url).is_err()
        {
            failures.push(format!(
                "oidc.client.redirect_url is not a valid URL: {}",
                self.oidc.client.redirect_url
            ));
        }

        if !self.oidc.issuer.url.is_empty() && url::Url::parse(&self.oidc.issuer.url).is_err() {
            failures.push(format!(
                "oidc.issuer.url is not a valid URL: {}",
                self.oidc.issuer.url
            ));
        }

        for cluster in &self.clusters {
            if cluster.name.is_empty() || cluster.server.is_empty() {
                failures.push("every cluster needs a name and a server".to_string());
                break;
            }
        }

        if failures.is_empty() {
            return Ok(());
        }

        for failure in &failures {
            tracing::error!("{}", failure);
        }
        Err(LoginappError::Config(failures.join("; ")).into())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const FULL_CONFIG: &str = r#"
name: Kubernetes Auth
listen: 127.0.0.1:5555
secret: csrf-secret
oidc:
  client:
    id: loginapp
    secret: client-secret
    redirect_url: https://loginapp.example.com/callback
  issuer:
    url: https://dex.example.com
    root_ca: /etc/ssl/dex-ca.pem
  extra:
    scopes: [legacy]
    auth_code_opts:
      prompt: login
      max_age: 300
      access_type: offline
  cross_clients: [kubernetes, argo]
  offline_as_scope: false
web:
  main_username_claim: email
clusters:
  - name: prod
    server: https://prod.k8s.example.com:6443
"#;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::from_yaml(FULL_CONFIG).unwrap();
        config.apply_defaults(None);
        config
    }

    #[test]
    fn test_parse_full_config() {
        let config = AppConfig::from_yaml(FULL_CONFIG).unwrap();
        assert_eq!(config.name, "Kubernetes Auth");
        assert_eq!(config.listen, "127.0.0.1:5555");
        assert_eq!(config.oidc.client.id, "loginapp");
        assert_eq!(config.oidc.issuer.root_ca, "/etc/ssl/dex-ca.pem");
        assert_eq!(config.oidc.extra.scopes, vec!["legacy".to_string()]);
        assert_eq!(config.oidc.cross_clients.len(), 2);
        assert_eq!(config.oidc.offline_as_scope, OfflineAccess::Disabled);
        assert_eq!(config.web.main_username_claim, "email");
        assert_eq!(config.clusters[0].name, "prod");
        assert!(config.oidc.scopes.is_none());
    }

    #[test]
    fn test_auth_code_opts_keep_document_order() {
        let config = AppConfig::from_yaml(FULL_CONFIG).unwrap();
        let pairs: Vec<(&str, &str)> = config.oidc.extra.auth_code_opts.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("prompt", "login"),
                ("max_age", "300"),
                ("access_type", "offline")
            ]
        );
    }

    #[test]
    fn test_auth_code_opts_reject_nested_values() {
        let yaml = r#"
oidc:
  extra:
    auth_code_opts:
      nested: [a, b]
"#;
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_offline_access_tristate() {
        let unset = AppConfig::from_yaml("oidc: {}").unwrap();
        assert_eq!(unset.oidc.offline_as_scope, OfflineAccess::Unset);

        let null = AppConfig::from_yaml("oidc:\n  offline_as_scope: null").unwrap();
        assert_eq!(null.oidc.offline_as_scope, OfflineAccess::Unset);

        let enabled = AppConfig::from_yaml("oidc:\n  offline_as_scope: true").unwrap();
        assert_eq!(enabled.oidc.offline_as_scope, OfflineAccess::Enabled);
    }

    #[test]
    fn test_defaults_applied() {
        let mut config = AppConfig::default();
        assert_eq!(config.name, "Loginapp");
        assert_eq!(config.listen, "0.0.0.0:8080");
        assert_eq!(config.oidc.client.id, "loginapp");
        assert_eq!(config.web.main_username_claim, "name");
        assert_eq!(config.web.kubeconfig.default_namespace, "default");
        assert_eq!(config.metrics.port, 9090);
        assert_eq!(config.log.level, "info");

        config.apply_defaults(None);
        assert_eq!(config.web.main_client_id, "loginapp");
        assert_eq!(config.secret.len(), 64);
    }

    #[test]
    fn test_random_secret_differs_between_calls() {
        assert_ne!(random_secret(), random_secret());
    }

    #[test]
    fn test_fallback_secret_is_reused() {
        let mut config = AppConfig::default();
        config.apply_defaults(Some("previous"));
        assert_eq!(config.secret, "previous");
    }

    #[test]
    fn test_camel_case_aliases() {
        let yaml = r#"
oidc:
  client:
    redirectURL: https://loginapp.example.com/callback
  issuer:
    rootCA: /ca.pem
  crossClients: [kube]
web:
  mainUsernameClaim: email
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.oidc.client.redirect_url,
            "https://loginapp.example.com/callback"
        );
        assert_eq!(config.oidc.issuer.root_ca, "/ca.pem");
        assert_eq!(config.oidc.cross_clients, vec!["kube".to_string()]);
        assert_eq!(config.web.main_username_claim, "email");
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_every_missing_field() {
        let mut config = AppConfig::default();
        config.oidc.client.id.clear();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("no oidc.client.id specified"));
        assert!(err.contains("no oidc.client.secret specified"));
        assert!(err.contains("no oidc.client.redirect_url specified"));
        assert!(err.contains("no oidc.issuer.url specified"));
    }

    #[test]
    fn test_validate_rejects_bad_issuer_url() {
        let mut config = valid_config();
        config.oidc.issuer.url = "not a url".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("oidc.issuer.url is not a valid URL"));
    }

    #[test]
    fn test_validate_rejects_incomplete_cluster() {
        let mut config = valid_config();
        config.clusters[0].server.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_client_secret() {
        let config = valid_config();
        let debug = format!("{:?}", config.oidc.client);
        assert!(!debug.contains("client-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("LOGINAPP_LISTEN", "0.0.0.0:9999");
        std::env::set_var("LOGINAPP_OIDC_SCOPES", "openid, email");
        std::env::set_var("LOGINAPP_OIDC_OFFLINE_AS_SCOPE", "true");
        std::env::set_var("LOGINAPP_METRICS_PORT", "not-a-port");

        let mut config = AppConfig::default();
        config.apply_env_vars();

        std::env::remove_var("LOGINAPP_LISTEN");
        std::env::remove_var("LOGINAPP_OIDC_SCOPES");
        std::env::remove_var("LOGINAPP_OIDC_OFFLINE_AS_SCOPE");
        std::env::remove_var("LOGINAPP_METRICS_PORT");

        assert_eq!(config.listen, "0.0.0.0:9999");
        assert_eq!(
            config.oidc.scopes,
            Some(vec!["openid".to_string(), "email".to_string()])
        );
        assert_eq!(config.oidc.offline_as_scope, OfflineAccess::Enabled);
        assert_eq!(config.metrics.port, 9090);
    }

    #[test]
    #[serial]
    fn test_cli_overrides_beat_env() {
        std::env::set_var("LOGINAPP_OIDC_ISSUER_URL", "https://env.example.com");
        let overrides = ConfigOverrides {
            oidc_issuer_url: Some("https://flag.example.com".to_string()),
            ..Default::default()
        };

        let config = AppConfig::load("/nonexistent/loginapp.yaml", &overrides, true).unwrap();
        std::env::remove_var("LOGINAPP_OIDC_ISSUER_URL");

        assert_eq!(config.oidc.issuer.url, "https://flag.example.com");
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    #[serial]
    fn test_resolve_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, FULL_CONFIG).unwrap();

        let config = AppConfig::resolve(
            path.to_str().unwrap(),
            &ConfigOverrides::default(),
            false,
            None,
        )
        .unwrap();
        assert_eq!(config.secret, "csrf-secret");
        assert_eq!(config.web.main_client_id, "loginapp");
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "listen: [unclosed").unwrap();

        let err = AppConfig::from_file(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
