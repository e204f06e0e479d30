//! OpenID Connect relying party engine
//!
//! Components, leaves first:
//!
//! - [`tls`]: HTTP client trusting the configured issuer CA
//! - [`discovery`]: provider metadata and [`discovery::Provider`] handle
//! - [`backoff`]: retry loop used while discovering
//! - [`scopes`]: ordered scope negotiation
//! - [`state`]: CSRF state token
//! - [`authorize`]: authorization redirect URL
//! - [`verifier`] and [`claims`]: ID token verification and claim access
//! - [`callback`]: the authorization callback state machine
//!
//! [`OidcSession`] ties one configuration generation together. It is built
//! once, never mutated, and replaced wholesale on reload.

pub mod authorize;
pub mod backoff;
pub mod callback;
pub mod claims;
pub mod discovery;
pub mod scopes;
pub mod state;
pub mod tls;
pub mod verifier;

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::AppConfig;
use crate::error::LoginappError;
use backoff::{BackoffPolicy, RetryClock};
use discovery::Provider;
use scopes::NegotiatedScopes;

/// A consistent configuration, scope list and provider, used together for
/// the whole lifetime of a request.
#[derive(Debug)]
pub struct OidcSession {
    pub config: AppConfig,
    pub scopes: NegotiatedScopes,
    pub provider: Provider,
}

impl OidcSession {
    /// Assembles a session from parts that are already built.
    pub fn new(config: AppConfig, provider: Provider) -> Self {
        let scopes = scopes::negotiate_scopes(
            &config.oidc,
            provider.metadata.scopes_supported.as_deref(),
        );
        Self {
            config,
            scopes,
            provider,
        }
    }

    /// Builds a session: trusted client, then discovery, then scopes.
    ///
    /// # Errors
    ///
    /// Returns [`LoginappError::Config`] for trust settings that cannot be
    /// applied and [`LoginappError::Discovery`] when the provider cannot be
    /// reached within the retry budget or `cancel` fires.
    pub async fn bootstrap(
        config: AppConfig,
        policy: &BackoffPolicy,
        clock: &dyn RetryClock,
        cancel: &CancellationToken,
    ) -> Result<Self, LoginappError> {
        let http = tls::build_http_client(&config.oidc.issuer)?;
        let provider = discovery::bootstrap_provider(
            http,
            &config.oidc.issuer.url,
            &config.oidc.client.id,
            policy,
            clock,
            cancel,
        )
        .await?;
        Ok(Self::new(config, provider))
    }

    /// Authorization redirect URL for a browser identified by `user_agent`.
    ///
    /// # Errors
    ///
    /// Returns [`LoginappError::Config`] if the discovered authorization
    /// endpoint is not a valid URL.
    pub fn authorization_url(&self, user_agent: &str) -> Result<Url, LoginappError> {
        let client = &self.config.oidc.client;
        authorize::authorization_url(
            &self.provider.metadata.authorization_endpoint,
            &client.id,
            &client.redirect_url,
            &self.scopes,
            &state::generate_state(user_agent, &self.config.secret),
            &self.config.oidc.extra.auth_code_opts,
        )
    }
}
