//! Scope negotiation
//!
//! Combines the configured scopes with cross-client audiences and the
//! provider's advertised capabilities into the ordered scope list sent on
//! every authorization redirect. Runs once per configuration generation.

use std::sync::Once;

use crate::config::{OfflineAccess, OidcConfig};

/// Scope that asks the provider for a refresh token.
pub const OFFLINE_ACCESS: &str = "offline_access";

/// Prefix of the scope that adds another client ID to the token audience.
pub const CROSS_CLIENT_PREFIX: &str = "audience:server:client_id:";

/// Scopes requested when `oidc.scopes` is not configured at all.
pub const LEGACY_DEFAULT_SCOPES: [&str; 4] = ["openid", "profile", "email", "groups"];

static EXTRA_SCOPES_DEPRECATION: Once = Once::new();

/// Result of scope negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedScopes {
    /// Scopes in request order; duplicates are kept.
    pub scopes: Vec<String>,
    /// Whether `offline_access` ended up in `scopes`.
    pub offline_access: bool,
}

impl NegotiatedScopes {
    /// Value of the `scope` query parameter.
    pub fn joined(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Computes the scope list for a configuration and provider.
///
/// Order:
/// 1. `oidc.scopes`
/// 2. deprecated `oidc.extra.scopes` (one warning per process)
/// 3. `audience:server:client_id:<id>` for each cross client
/// 4. the legacy defaults `openid profile email groups`, only when
///    `oidc.scopes` is not configured
/// 5. `offline_access`, per [`OfflineAccess`]: when unset it is requested if
///    `scopes_supported` lists it, or if the provider advertises nothing
///
/// # Examples
///
/// ```
/// use loginapp::config::{OfflineAccess, OidcConfig};
/// use loginapp::oidc::scopes::negotiate_scopes;
///
/// let config = OidcConfig {
///     scopes: Some(vec!["openid".to_string()]),
///     offline_as_scope: OfflineAccess::Disabled,
///     ..Default::default()
/// };
/// let supported = vec!["openid".to_string(), "offline_access".to_string()];
///
/// let negotiated = negotiate_scopes(&config, Some(supported.as_slice()));
/// assert_eq!(negotiated.scopes, vec!["openid".to_string()]);
/// assert!(!negotiated.offline_access);
/// ```
pub fn negotiate_scopes(
    config: &OidcConfig,
    scopes_supported: Option<&[String]>,
) -> NegotiatedScopes {
    let mut scopes: Vec<String> = config.scopes.clone().unwrap_or_default();

    if !config.extra.scopes.is_empty() {
        EXTRA_SCOPES_DEPRECATION.call_once(|| {
            tracing::warn!(
                "oidc.extra.scopes is deprecated and will be removed, use oidc.scopes instead"
            );
        });
        scopes.extend(config.extra.scopes.iter().cloned());
    }

    scopes.extend(
        config
            .cross_clients
            .iter()
            .map(|client| format!("{CROSS_CLIENT_PREFIX}{client}")),
    );

    if config.scopes.is_none() {
        scopes.extend(LEGACY_DEFAULT_SCOPES.iter().map(|s| s.to_string()));
    }

    let offline_access = match config.offline_as_scope {
        OfflineAccess::Enabled => true,
        OfflineAccess::Disabled => false,
        OfflineAccess::Unset => provider_supports_offline_access(scopes_supported),
    };
    if offline_access {
        scopes.push(OFFLINE_ACCESS.to_string());
    }

    tracing::debug!(scopes = ?scopes, offline_access, "Negotiated scopes");
    NegotiatedScopes {
        scopes,
        offline_access,
    }
}

/// A provider that advertises no scopes is assumed to support offline access.
fn provider_supports_offline_access(scopes_supported: Option<&[String]>) -> bool {
    match scopes_supported {
        None | Some([]) => true,
        Some(supported) => supported.iter().any(|s| s == OFFLINE_ACCESS),
    }
}
