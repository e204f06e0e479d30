//! Loginapp - OpenID Connect login for Kubernetes CLI users
//!
//! Main entry point for the Loginapp service.

use anyhow::Result;

use loginapp::cli::{Cli, Commands};
use loginapp::commands;
use loginapp::config::AppConfig;
use loginapp::logging::{bootstrap_subscriber, init_logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let config_path = cli.config.clone();
    let overrides = cli.overrides().clone();

    // The log settings live in the configuration, so loading reports through
    // a temporary subscriber.
    let mut config = tracing::subscriber::with_default(bootstrap_subscriber(cli.verbose), || {
        AppConfig::load(&config_path, &overrides, cli.verbose)
    })?;

    init_logging(&config.log)?;

    config.apply_defaults(None);
    config.validate()?;

    match cli.command {
        Commands::Serve { overrides } => {
            commands::serve::run_serve(config, config_path, overrides, cli.verbose).await
        }
        Commands::Check { .. } => commands::check::run_check(&config, &config_path),
    }
}
