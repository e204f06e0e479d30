//! HTTP surface
//!
//! Routes:
//!
//! - `GET /` redirects to the provider's authorization endpoint
//! - `GET /callback` completes the login and renders the kubeconfig
//! - `GET /healthz` reports whether the issuer is reachable
//!
//! Handlers read the active [`OidcSession`] through a [`SessionHandle`]. A
//! `SIGHUP` reload builds a new session off-lock and swaps it in; requests
//! already running keep the session they started with.

pub mod handlers;
pub mod middleware;

use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::cli::ConfigOverrides;
use crate::config::AppConfig;
use crate::error::Result;
use crate::metrics::{record_reload, ReloadResult};
use crate::oidc::backoff::{BackoffPolicy, RetryClock};
use crate::oidc::OidcSession;

/// Shared pointer to the active session.
///
/// Readers hold the lock only long enough to clone the inner `Arc`.
#[derive(Debug, Clone)]
pub struct SessionHandle(Arc<RwLock<Arc<OidcSession>>>);

impl SessionHandle {
    pub fn new(session: OidcSession) -> Self {
        Self(Arc::new(RwLock::new(Arc::new(session))))
    }

    /// The session to use for one request.
    pub fn current(&self) -> Arc<OidcSession> {
        let guard = self.0.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Installs `session` and returns the one it replaced.
    pub fn replace(&self, session: OidcSession) -> Arc<OidcSession> {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(session))
    }
}

/// State shared by all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub sessions: SessionHandle,
}

impl AppState {
    pub fn new(session: OidcSession) -> Self {
        Self {
            sessions: SessionHandle::new(session),
        }
    }
}

/// Builds the router with request logging applied to every route.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::login))
        .route("/callback", get(handlers::callback))
        .route("/healthz", get(handlers::healthz))
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .with_state(state)
}

/// Serves `state` on `listener` until `cancel` fires.
///
/// # Errors
///
/// Returns error if the server fails while accepting connections
pub async fn serve(listener: TcpListener, state: AppState, cancel: CancellationToken) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Where a reload reads its configuration from
#[derive(Debug, Clone)]
pub struct ReloadSource {
    pub config_path: String,
    pub overrides: ConfigOverrides,
    pub verbose: bool,
    pub policy: BackoffPolicy,
}

/// Rebuilds the session from `source` and swaps it in.
///
/// The secret of the current session is reused when the new configuration
/// has none. On any failure the current session stays active.
///
/// # Errors
///
/// Returns error if the configuration is invalid or discovery fails
pub async fn reload(
    sessions: &SessionHandle,
    source: &ReloadSource,
    clock: &dyn RetryClock,
    cancel: &CancellationToken,
) -> Result<()> {
    let previous = sessions.current();
    let config = AppConfig::resolve(
        &source.config_path,
        &source.overrides,
        source.verbose,
        Some(&previous.config.secret),
    )?;
    let session = OidcSession::bootstrap(config, &source.policy, clock, cancel).await?;

    tracing::info!(
        issuer = %session.config.oidc.issuer.url,
        scopes = %session.scopes.joined(),
        "Configuration reloaded"
    );
    sessions.replace(session);
    Ok(())
}

/// Reloads the session whenever the process receives `SIGHUP`.
///
/// # Errors
///
/// Returns error if the signal handler cannot be installed
#[cfg(unix)]
pub fn spawn_reload_on_sighup(
    sessions: SessionHandle,
    source: ReloadSource,
    clock: Arc<dyn RetryClock>,
    cancel: CancellationToken,
) -> Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    tracing::info!("Received SIGHUP, reloading configuration from {}", source.config_path);
                    match reload(&sessions, &source, clock.as_ref(), &cancel).await {
                        Ok(()) => record_reload(ReloadResult::Success),
                        Err(e) => {
                            tracing::error!("Reload failed, keeping the previous configuration: {:#}", e);
                            record_reload(ReloadResult::Failure);
                        }
                    }
                }
            }
        }
    }))
}

/// Resolves once the process is asked to stop (Ctrl-C, or `SIGTERM` on
/// unix).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown requested");
}
