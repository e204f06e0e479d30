//! Authorization redirect URL

use url::Url;

use crate::config::AuthCodeOptions;
use crate::error::LoginappError;
use crate::oidc::scopes::NegotiatedScopes;

/// Builds the URL users are redirected to for authentication.
///
/// Parameters, in order: `client_id`, `redirect_uri`, `response_type=code`,
/// `scope` (space separated), `state`, then each extra option verbatim.
/// Query parameters already present on the endpoint are kept in front.
///
/// # Errors
///
/// Returns [`LoginappError::Config`] if the endpoint is not a valid URL.
///
/// # Examples
///
/// ```
/// use loginapp::config::AuthCodeOptions;
/// use loginapp::oidc::authorize::authorization_url;
/// use loginapp::oidc::scopes::NegotiatedScopes;
///
/// let scopes = NegotiatedScopes {
///     scopes: vec!["openid".to_string(), "email".to_string()],
///     offline_access: false,
/// };
/// let extra = AuthCodeOptions::new(vec![("prompt".to_string(), "login".to_string())]);
///
/// let url = authorization_url(
///     "https://dex.example.com/auth",
///     "loginapp",
///     "https://loginapp.example.com/callback",
///     &scopes,
///     "xyz",
///     &extra,
/// )
/// .unwrap();
///
/// assert_eq!(
///     url.as_str(),
///     "https://dex.example.com/auth?client_id=loginapp\
///      &redirect_uri=https%3A%2F%2Floginapp.example.com%2Fcallback\
///      &response_type=code&scope=openid+email&state=xyz&prompt=login"
/// );
/// ```
pub fn authorization_url(
    authorization_endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &NegotiatedScopes,
    state: &str,
    extra: &AuthCodeOptions,
) -> Result<Url, LoginappError> {
    let mut url = Url::parse(authorization_endpoint).map_err(|e| {
        LoginappError::Config(format!(
            "invalid authorization endpoint URL {authorization_endpoint}: {e}"
        ))
    })?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("client_id", client_id);
        query.append_pair("redirect_uri", redirect_uri);
        query.append_pair("response_type", "code");
        query.append_pair("scope", &scopes.joined());
        query.append_pair("state", state);
        for (key, value) in extra.iter() {
            query.append_pair(key, value);
        }
    }

    Ok(url)
}
