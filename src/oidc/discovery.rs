//! OpenID Connect provider discovery
//!
//! Fetches `<issuer>/.well-known/openid-configuration`, checks that the
//! document describes the configured issuer, and wraps the result in a
//! [`Provider`] handle together with an ID token verifier bound to the
//! client ID.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::LoginappError;
use crate::oidc::backoff::{retry_with_backoff, BackoffPolicy, RetryClock};
use crate::oidc::verifier::IdTokenVerifier;

const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

// ---------------------------------------------------------------------------
// Provider metadata
// ---------------------------------------------------------------------------

/// OpenID Provider metadata document.
///
/// # References
///
/// - OpenID Connect Discovery 1.0 <https://openid.net/specs/openid-connect-discovery-1_0.html>
///
/// # Examples
///
/// ```
/// use loginapp::oidc::discovery::ProviderMetadata;
///
/// let json = r#"{
///     "issuer": "https://dex.example.com",
///     "authorization_endpoint": "https://dex.example.com/auth",
///     "token_endpoint": "https://dex.example.com/token",
///     "jwks_uri": "https://dex.example.com/keys"
/// }"#;
///
/// let meta: ProviderMetadata = serde_json::from_str(json).unwrap();
/// assert_eq!(meta.issuer, "https://dex.example.com");
/// assert!(meta.scopes_supported.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier; must match the configured issuer URL.
    pub issuer: String,

    /// Where users are redirected to authenticate.
    pub authorization_endpoint: String,

    /// Where authorization codes are exchanged for tokens.
    pub token_endpoint: String,

    /// JSON Web Key Set used to verify ID token signatures.
    pub jwks_uri: String,

    /// Scopes the provider advertises, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// Additional metadata fields not modelled above.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Discovery document URL for an issuer.
///
/// # Examples
///
/// ```
/// use loginapp::oidc::discovery::discovery_url;
///
/// assert_eq!(
///     discovery_url("https://dex.example.com/dex/"),
///     "https://dex.example.com/dex/.well-known/openid-configuration"
/// );
/// ```
pub fn discovery_url(issuer: &str) -> String {
    format!("{}{}", issuer.trim_end_matches('/'), WELL_KNOWN_PATH)
}

/// Fetches and checks the discovery document once, without retrying.
///
/// # Errors
///
/// Returns [`LoginappError::Discovery`] on transport failure, a non-2xx
/// status, an unparsable body, or an issuer mismatch.
pub async fn fetch_provider_metadata(
    http: &reqwest::Client,
    issuer: &str,
) -> Result<ProviderMetadata, LoginappError> {
    let url = discovery_url(issuer);

    let resp = http
        .get(&url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| LoginappError::Discovery(format!("discovery request failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        return Err(LoginappError::Discovery(format!(
            "discovery endpoint {url} returned {status}"
        )));
    }

    let metadata: ProviderMetadata = resp
        .json()
        .await
        .map_err(|e| LoginappError::Discovery(format!("invalid discovery document: {e}")))?;

    if metadata.issuer.trim_end_matches('/') != issuer.trim_end_matches('/') {
        return Err(LoginappError::Discovery(format!(
            "issuer mismatch: expected '{}', got '{}'",
            issuer, metadata.issuer
        )));
    }

    Ok(metadata)
}

// ---------------------------------------------------------------------------
// Provider handle
// ---------------------------------------------------------------------------

/// A discovered provider: metadata, verifier, and the trusted HTTP client.
#[derive(Debug, Clone)]
pub struct Provider {
    pub metadata: ProviderMetadata,
    pub verifier: IdTokenVerifier,
    http: reqwest::Client,
}

impl Provider {
    /// Assembles a provider from already fetched metadata.
    pub fn new(metadata: ProviderMetadata, http: reqwest::Client, client_id: &str) -> Self {
        let verifier = IdTokenVerifier::new(
            http.clone(),
            metadata.jwks_uri.clone(),
            metadata.issuer.clone(),
            client_id.to_string(),
        );
        Self {
            metadata,
            verifier,
            http,
        }
    }

    /// HTTP client configured with the issuer trust settings.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Reports whether the issuer answers a `HEAD` on its discovery URL.
    pub async fn healthz(&self) -> bool {
        let url = discovery_url(&self.metadata.issuer);
        match self.http.head(&url).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::warn!(url = %url, status = %resp.status(), "Issuer health check failed");
                false
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Issuer health check failed");
                false
            }
        }
    }
}

/// Discovers the provider, retrying with exponential backoff.
///
/// # Arguments
///
/// * `http` - Trusted client from [`crate::oidc::tls::build_http_client`]
/// * `issuer` - Configured issuer URL
/// * `client_id` - Audience enforced by the verifier
/// * `policy` - Retry schedule
/// * `clock` - Time source for the retry loop
/// * `cancel` - Stops the loop early (for example on shutdown)
///
/// # Errors
///
/// Returns [`LoginappError::Discovery`] if the issuer URL is invalid, the
/// retry budget is exhausted, or `cancel` fires.
pub async fn bootstrap_provider(
    http: reqwest::Client,
    issuer: &str,
    client_id: &str,
    policy: &BackoffPolicy,
    clock: &dyn RetryClock,
    cancel: &CancellationToken,
) -> Result<Provider, LoginappError> {
    Url::parse(issuer)
        .map_err(|e| LoginappError::Discovery(format!("invalid issuer URL {issuer}: {e}")))?;

    tracing::info!(issuer = %issuer, "Discovering OpenID provider");
    let metadata = retry_with_backoff(policy, clock, cancel, issuer, || {
        metrics::increment_counter!("loginapp_discovery_attempts_total");
        fetch_provider_metadata(&http, issuer)
    })
    .await?;

    tracing::info!(
        issuer = %metadata.issuer,
        authorization_endpoint = %metadata.authorization_endpoint,
        token_endpoint = %metadata.token_endpoint,
        "OpenID provider discovered"
    );
    Ok(Provider::new(metadata, http, client_id))
}
