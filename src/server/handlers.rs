//! Route handlers

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;

use super::AppState;
use crate::error::LoginappError;
use crate::kube::KubeUserInfo;
use crate::oidc::callback::{process_callback, CallbackParams};
use crate::oidc::OidcSession;

fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|accept| accept.contains("application/json"))
        .unwrap_or(false)
}

/// `GET /`: 303 to the authorization endpoint with a state bound to the
/// caller's user agent.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Redirect, LoginappError> {
    let session = state.sessions.current();
    let url = session
        .authorization_url(user_agent(&headers))
        .map_err(|e| log_failure(&session, "Login redirect failed", e))?;
    tracing::debug!(url = %url, "Redirecting to the authorization endpoint");
    Ok(Redirect::to(url.as_str()))
}

/// `GET /callback`: exchanges the code and renders the credentials.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Result<Response, LoginappError> {
    let session = state.sessions.current();
    render_callback(&session, &params, &headers)
        .await
        .map_err(|e| log_failure(&session, "Login failed", e))
}

async fn render_callback(
    session: &OidcSession,
    params: &CallbackParams,
    headers: &HeaderMap,
) -> Result<Response, LoginappError> {
    let result = process_callback(session, params, user_agent(headers)).await?;

    match result.claims.expires_at() {
        Some(expires_at) => tracing::info!(
            username = %result.username,
            expires_at = %expires_at.to_rfc3339(),
            "Login succeeded"
        ),
        None => tracing::info!(username = %result.username, "Login succeeded"),
    }
    let info = KubeUserInfo::new(&session.config, result);

    if wants_json(headers) {
        return Ok(Json(info.render_json()).into_response());
    }

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        info.render_yaml()?,
    )
        .into_response())
}

/// Logs a failed request once, with the issuer it was served against.
fn log_failure(session: &OidcSession, message: &str, err: LoginappError) -> LoginappError {
    let issuer = &session.config.oidc.issuer.url;
    if err.status_code().is_server_error() {
        tracing::error!(issuer = %issuer, error = %err, "{}", message);
    } else {
        tracing::warn!(issuer = %issuer, error = %err, "{}", message);
    }
    err
}

/// `GET /healthz`: 200 when the issuer answers, 503 otherwise.
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.sessions.current();
    if session.provider.healthz().await {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "issuer unreachable")
    }
}
