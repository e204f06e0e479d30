//! `loginapp serve`

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::cli::ConfigOverrides;
use crate::config::AppConfig;
use crate::error::Result;
use crate::metrics::init_metrics_exporter;
use crate::oidc::backoff::{BackoffPolicy, RetryClock, TokioClock};
use crate::oidc::OidcSession;
use crate::server::{self, AppState, ReloadSource};

/// Discover the provider, then serve until a shutdown signal arrives.
///
/// Discovery retries with the default backoff policy; a shutdown signal
/// received while it is still retrying aborts startup.
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `config_path` - File re-read on `SIGHUP`
/// * `overrides` - CLI overrides re-applied on `SIGHUP`
/// * `verbose` - Force the debug log level on reload as well
///
/// # Errors
///
/// Returns error if discovery fails, the listen address cannot be bound, or
/// the server stops with an error
pub async fn run_serve(
    config: AppConfig,
    config_path: String,
    overrides: ConfigOverrides,
    verbose: bool,
) -> Result<()> {
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            server::shutdown_signal().await;
            cancel.cancel();
        });
    }

    init_metrics_exporter(config.metrics.port);

    let listen = config.listen.clone();
    let policy = BackoffPolicy::default();
    let clock: Arc<dyn RetryClock> = Arc::new(TokioClock);

    tracing::info!("Starting {}", config.name);
    let session = OidcSession::bootstrap(config, &policy, clock.as_ref(), &cancel)
        .await
        .context("failed to set up the OpenID Connect provider")?;
    tracing::info!(scopes = %session.scopes.joined(), "Scopes negotiated");

    let state = AppState::new(session);

    #[cfg(unix)]
    let _reloader = server::spawn_reload_on_sighup(
        state.sessions.clone(),
        ReloadSource {
            config_path,
            overrides,
            verbose,
            policy,
        },
        Arc::clone(&clock),
        cancel.clone(),
    )?;
    #[cfg(not(unix))]
    let _ = (config_path, overrides, verbose);

    let listener = TcpListener::bind(&listen)
        .await
        .with_context(|| format!("failed to listen on {}", listen))?;

    server::serve(listener, state, cancel).await
}
