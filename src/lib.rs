//! Loginapp - OpenID Connect login for Kubernetes CLI users
//!
//! Redirects a browser to an OpenID Connect issuer, completes the
//! authorization code flow, verifies the ID token and renders kubeconfig
//! credentials for the `oidc` auth provider.
//!
//! # Architecture
//!
//! - `oidc`: discovery, scope negotiation, CSRF state, authorization URL,
//!   token exchange and ID token verification
//! - `kube`: kubeconfig rendering
//! - `server`: axum router, request logging and configuration reload
//! - `config`: configuration loading (file, environment, flags) and validation
//! - `commands`: CLI subcommand handlers
//! - `logging` and `metrics`: ambient observability
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use loginapp::cli::ConfigOverrides;
//! use loginapp::oidc::backoff::{BackoffPolicy, TokioClock};
//! use loginapp::{AppConfig, OidcSession};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::resolve("config.yaml", &ConfigOverrides::default(), false, None)?;
//!     let session = OidcSession::bootstrap(
//!         config,
//!         &BackoffPolicy::default(),
//!         &TokioClock,
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//!     println!("{}", session.authorization_url("curl/8.0")?);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod kube;
pub mod logging;
pub mod metrics;
pub mod oidc;
pub mod server;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{LoginappError, Result};
pub use kube::KubeUserInfo;
pub use oidc::OidcSession;
pub use server::{router, AppState, SessionHandle};
