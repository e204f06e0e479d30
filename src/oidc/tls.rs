//! Trusted HTTP client for talking to the issuer
//!
//! Every outbound call (discovery, JWKS, token exchange, health checks) goes
//! through the client built here, so the issuer trust settings and the
//! transport timeouts are decided in exactly one place.

use std::path::Path;
use std::time::Duration;

use reqwest::Certificate;

use crate::config::OidcIssuerConfig;
use crate::error::LoginappError;

/// Bound on establishing a connection, TLS handshake included.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// TCP keepalive interval for pooled connections.
pub const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// Bound on a whole request, so a stalled issuer cannot pin a handler.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the HTTP client used for every issuer interaction.
///
/// - `insecure_skip_verify` accepts any issuer certificate and ignores
///   `root_ca` (a warning is logged)
/// - a non-empty `root_ca` trusts only the certificates in that PEM file
/// - otherwise the built-in webpki roots are trusted
///
/// Proxy settings are read from `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY`.
///
/// # Errors
///
/// Returns [`LoginappError::Config`] if the CA file cannot be read, holds no
/// certificate, or the client cannot be constructed.
///
/// # Examples
///
/// ```
/// use loginapp::config::OidcIssuerConfig;
/// use loginapp::oidc::tls::build_http_client;
///
/// let issuer = OidcIssuerConfig {
///     url: "https://dex.example.com".to_string(),
///     ..Default::default()
/// };
/// assert!(build_http_client(&issuer).is_ok());
/// ```
pub fn build_http_client(issuer: &OidcIssuerConfig) -> Result<reqwest::Client, LoginappError> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .user_agent(concat!("loginapp/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .tcp_keepalive(TCP_KEEPALIVE)
        .timeout(REQUEST_TIMEOUT);

    if issuer.insecure_skip_verify {
        tracing::warn!(
            issuer = %issuer.url,
            "Issuer certificate validation is disabled, do not use this in production"
        );
        if !issuer.root_ca.is_empty() {
            tracing::warn!(root_ca = %issuer.root_ca, "oidc.issuer.root_ca ignored");
        }
        builder = builder.danger_accept_invalid_certs(true);
    } else if !issuer.root_ca.is_empty() {
        let certificates = load_root_certificates(Path::new(&issuer.root_ca))?;
        tracing::debug!(
            root_ca = %issuer.root_ca,
            count = certificates.len(),
            "Trusting issuer CA bundle"
        );
        builder = builder.tls_built_in_root_certs(false);
        for certificate in certificates {
            builder = builder.add_root_certificate(certificate);
        }
    }

    builder
        .build()
        .map_err(|e| LoginappError::Config(format!("failed to build HTTP client: {e}")))
}

/// Reads every `CERTIFICATE` block of a PEM bundle.
///
/// Blocks of other types (keys, CRLs) are skipped.
///
/// # Errors
///
/// Returns [`LoginappError::Config`] when the file is unreadable, the bundle
/// cannot be parsed, or no certificate is found.
pub fn load_root_certificates(path: &Path) -> Result<Vec<Certificate>, LoginappError> {
    let contents = std::fs::read(path).map_err(|e| {
        LoginappError::Config(format!("failed to read root CA {}: {e}", path.display()))
    })?;

    let certificates = Certificate::from_pem_bundle(&contents).map_err(|e| {
        LoginappError::Config(format!("invalid certificate in {}: {e}", path.display()))
    })?;

    if certificates.is_empty() {
        return Err(LoginappError::Config(format!(
            "no certificate found in root CA {}",
            path.display()
        )));
    }
    Ok(certificates)
}
