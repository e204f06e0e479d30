//! Authorization callback processing
//!
//! One callback walks through the stages of [`CallbackStage`] in order.
//! Any stage may fail; the error variant decides the HTTP status:
//! request problems are 400, everything after the request was accepted is
//! 500. Nothing is retried.

use std::fmt;

use serde::Deserialize;

use crate::error::LoginappError;
use crate::oidc::claims::Claims;
use crate::oidc::state::verify_state;
use crate::oidc::OidcSession;

/// Query parameters the provider sends back to the redirect URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Stages of callback processing, logged as they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStage {
    AwaitingRedirect,
    ValidatingRequest,
    ExchangingCode,
    VerifyingToken,
    ExtractingClaims,
    ResolvingUsername,
    Done,
}

impl fmt::Display for CallbackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingRedirect => "awaiting_redirect",
            Self::ValidatingRequest => "validating_request",
            Self::ExchangingCode => "exchanging_code",
            Self::VerifyingToken => "verifying_token",
            Self::ExtractingClaims => "extracting_claims",
            Self::ResolvingUsername => "resolving_username",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful callback.
#[derive(Debug, Clone)]
pub struct TokenExchangeResult {
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub claims: Claims,
    pub username: String,
}

/// Token endpoint response body.
///
/// Error responses (RFC 6749 section 5.2) share the type; `error` is set and
/// the token fields are absent.
#[derive(Debug, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Kept as raw JSON so a non-string value is reported, not a parse error.
    #[serde(default)]
    pub id_token: Option<serde_json::Value>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Runs the whole callback for one request against one session generation.
///
/// # Errors
///
/// - [`LoginappError::RequestValidation`]: provider error, missing code,
///   state mismatch
/// - [`LoginappError::Exchange`]: token endpoint failure
/// - [`LoginappError::Verification`]: missing or invalid ID token
/// - [`LoginappError::Claim`]: unusable claims or username claim
pub async fn process_callback(
    session: &OidcSession,
    params: &CallbackParams,
    user_agent: &str,
) -> Result<TokenExchangeResult, LoginappError> {
    enter(CallbackStage::AwaitingRedirect);

    enter(CallbackStage::ValidatingRequest);
    let code = validate_request(params, user_agent, &session.config.secret)?;

    enter(CallbackStage::ExchangingCode);
    let client = &session.config.oidc.client;
    let tokens = exchange_code(
        session.provider.http(),
        &session.provider.metadata.token_endpoint,
        &client.id,
        &client.secret,
        &client.redirect_url,
        code,
    )
    .await?;

    enter(CallbackStage::VerifyingToken);
    let id_token = match tokens.id_token {
        Some(serde_json::Value::String(token)) if !token.is_empty() => token,
        _ => {
            return Err(LoginappError::Verification(
                "no id_token in token response".to_string(),
            ))
        }
    };
    let claims = session.provider.verifier.verify(&id_token).await?;

    enter(CallbackStage::ExtractingClaims);
    tracing::debug!(claims = %claims.pretty_json(), "Token issued with claims");

    enter(CallbackStage::ResolvingUsername);
    let username = resolve_username(&claims, &session.config.web.main_username_claim)?;

    enter(CallbackStage::Done);
    Ok(TokenExchangeResult {
        id_token,
        refresh_token: tokens.refresh_token.filter(|t| !t.is_empty()),
        claims,
        username,
    })
}

fn enter(stage: CallbackStage) {
    tracing::debug!(stage = %stage, "Callback stage");
}

/// Checks the callback request and returns the authorization code.
///
/// # Errors
///
/// Returns [`LoginappError::RequestValidation`] with one of:
/// `"<error>: <error_description>"`, `"no code in request"`,
/// `"state mismatch"`.
pub fn validate_request<'a>(
    params: &'a CallbackParams,
    user_agent: &str,
    secret: &str,
) -> Result<&'a str, LoginappError> {
    if let Some(error) = params.error.as_deref().filter(|e| !e.is_empty()) {
        return Err(LoginappError::RequestValidation(format!(
            "{}: {}",
            error,
            params.error_description.as_deref().unwrap_or_default()
        )));
    }

    let code = params
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| LoginappError::RequestValidation("no code in request".to_string()))?;

    let state = params.state.as_deref().unwrap_or_default();
    if !verify_state(user_agent, state, secret) {
        return Err(LoginappError::RequestValidation(
            "state mismatch".to_string(),
        ));
    }

    Ok(code)
}

/// Exchanges an authorization code at the token endpoint.
///
/// The client authenticates with HTTP Basic (`client_secret_basic`).
///
/// # Errors
///
/// Returns [`LoginappError::Exchange`] on transport failure, a non-2xx
/// status, an OAuth error body, or an unparsable response. Messages carry
/// the upstream error, never the client secret.
pub async fn exchange_code(
    http: &reqwest::Client,
    token_endpoint: &str,
    client_id: &str,
    client_secret: &str,
    redirect_uri: &str,
    code: &str,
) -> Result<TokenResponse, LoginappError> {
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
    ];

    let resp = http
        .post(token_endpoint)
        .basic_auth(client_id, Some(client_secret))
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&params)
        .send()
        .await
        .map_err(|e| exchange_error(format!("token request failed: {e}")))?;

    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| exchange_error(format!("failed to read token response: {e}")))?;
    let parsed: Option<TokenResponse> = serde_json::from_str(&body).ok();

    if let Some(TokenResponse {
        error: Some(error),
        error_description,
        ..
    }) = &parsed
    {
        return Err(exchange_error(match error_description {
            Some(description) => format!("{error}: {description}"),
            None => error.clone(),
        }));
    }

    if !status.is_success() {
        return Err(exchange_error(format!(
            "token endpoint returned {status}: {}",
            body.trim()
        )));
    }

    parsed.ok_or_else(|| exchange_error("invalid token response".to_string()))
}

fn exchange_error(detail: String) -> LoginappError {
    LoginappError::Exchange(format!("failed to get token: {detail}"))
}

/// Reads the configured username claim.
///
/// # Errors
///
/// Returns [`LoginappError::Claim`] if the claim is absent or not a string.
pub fn resolve_username(claims: &Claims, claim_name: &str) -> Result<String, LoginappError> {
    match claims.get_str(claim_name)? {
        Some(username) => Ok(username.to_string()),
        None => Err(LoginappError::Claim(format!(
            "failed to find a claim matching the main_username_claim '{}'",
            claim_name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oidc::state::generate_state;
    use serde_json::json;

    const UA: &str = "Mozilla/5.0";
    const SECRET: &str = "csrf-secret";

    fn params(code: Option<&str>, state: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_provider_error_is_reported_first() {
        let params = CallbackParams {
            error: Some("access_denied".to_string()),
            error_description: Some("user cancelled".to_string()),
            code: Some("abc".to_string()),
            ..Default::default()
        };
        let err = validate_request(&params, UA, SECRET).unwrap_err();
        assert_eq!(err.response_message(), "access_denied: user cancelled");
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_code() {
        let state = generate_state(UA, SECRET);
        for code in [None, Some("")] {
            let err = validate_request(&params(code, Some(&state)), UA, SECRET).unwrap_err();
            assert_eq!(err.response_message(), "no code in request");
        }
    }

    #[test]
    fn test_state_mismatch() {
        let other = generate_state("curl/8.0", SECRET);
        let err = validate_request(&params(Some("abc"), Some(&other)), UA, SECRET).unwrap_err();
        assert_eq!(err.response_message(), "state mismatch");

        let err = validate_request(&params(Some("abc"), None), UA, SECRET).unwrap_err();
        assert_eq!(err.response_message(), "state mismatch");
    }

    #[test]
    fn test_valid_request_returns_code() {
        let state = generate_state(UA, SECRET);
        let params = params(Some("abc"), Some(&state));
        assert_eq!(validate_request(&params, UA, SECRET).unwrap(), "abc");
    }

    #[test]
    fn test_resolve_username() {
        let claims = Claims::from_value(json!({"email": "jane@example.com", "uid": 7})).unwrap();
        assert_eq!(resolve_username(&claims, "email").unwrap(), "jane@example.com");

        let err = resolve_username(&claims, "name").unwrap_err();
        assert_eq!(
            err.response_message(),
            "failed to find a claim matching the main_username_claim 'name'"
        );

        let err = resolve_username(&claims, "uid").unwrap_err();
        assert!(matches!(err, LoginappError::Claim(_)));
    }

    #[test]
    fn test_token_response_tolerates_missing_fields() {
        let resp: TokenResponse = serde_json::from_str(r#"{"access_token": "at"}"#).unwrap();
        assert_eq!(resp.access_token.as_deref(), Some("at"));
        assert!(resp.id_token.is_none());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(CallbackStage::ExchangingCode.to_string(), "exchanging_code");
        assert_eq!(CallbackStage::Done.to_string(), "done");
    }
}
