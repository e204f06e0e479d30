//! Command-line interface definition for Loginapp
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to serve the login web application and to check a
//! configuration file without starting the server.

use clap::{Args, Parser, Subcommand};

/// Configuration file read when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Loginapp - OIDC login for Kubernetes CLI users
///
/// Authenticates users against an OpenID Connect issuer and renders
/// the matching kubeconfig credentials.
#[derive(Parser, Debug, Clone)]
#[command(name = "loginapp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Enable verbose logging (forces the debug log level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Loginapp
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the login web application
    Serve {
        /// Configuration overrides, applied after the file and environment
        #[command(flatten)]
        overrides: ConfigOverrides,
    },

    /// Load and validate the configuration, then exit
    Check {
        /// Configuration overrides, applied after the file and environment
        #[command(flatten)]
        overrides: ConfigOverrides,
    },
}

/// Flags that override configuration values.
///
/// Every flag is optional; unset flags leave the file/environment value
/// untouched.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Application name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Listen interface and port
    #[arg(short, long)]
    pub listen: Option<String>,

    /// OIDC client ID
    #[arg(long)]
    pub oidc_client_id: Option<String>,

    /// Redirect URL registered with the issuer (must end with `/callback`)
    #[arg(long)]
    pub oidc_client_redirect_url: Option<String>,

    /// Issuer URL, without the `/.well-known/openid-configuration` suffix
    #[arg(long)]
    pub oidc_issuer_url: Option<String>,

    /// Certificate authority bundle used to verify the issuer
    #[arg(long)]
    pub oidc_issuer_root_ca: Option<String>,

    /// Skip issuer certificate validation (testing only)
    #[arg(long)]
    pub oidc_issuer_insecure_skip_verify: bool,

    /// Scopes to request, comma separated
    #[arg(long, value_delimiter = ',')]
    pub oidc_scopes: Option<Vec<String>>,

    /// Client IDs to request an audience for, comma separated
    #[arg(long, value_delimiter = ',')]
    pub oidc_cross_clients: Option<Vec<String>>,

    /// Request offline access (`true`/`false`); unset means "ask if supported"
    #[arg(long)]
    pub oidc_offline_as_scope: Option<bool>,

    /// Claim used as the kubeconfig user name
    #[arg(long)]
    pub web_main_username_claim: Option<String>,

    /// Port for the Prometheus metrics listener
    #[arg(long)]
    pub metrics_port: Option<u16>,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Overrides carried by whichever subcommand was selected
    pub fn overrides(&self) -> &ConfigOverrides {
        match &self.command {
            Commands::Serve { overrides } | Commands::Check { overrides } => overrides,
        }
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: DEFAULT_CONFIG_PATH.to_string(),
            verbose: false,
            command: Commands::Serve {
                overrides: ConfigOverrides::default(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, DEFAULT_CONFIG_PATH);
        assert!(!cli.verbose);
        assert!(matches!(cli.command, Commands::Serve { .. }));
    }

    #[test]
    fn test_cli_parse_serve_command() {
        let cli = Cli::try_parse_from(["loginapp", "serve"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { .. }));
        assert_eq!(cli.config, DEFAULT_CONFIG_PATH);
        assert!(cli.overrides().listen.is_none());
    }

    #[test]
    fn test_cli_parse_check_with_config() {
        let cli = Cli::try_parse_from(["loginapp", "check", "--config", "/etc/loginapp.yaml"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Check { .. }));
        assert_eq!(cli.config, "/etc/loginapp.yaml");
    }

    #[test]
    fn test_cli_parse_serve_overrides() {
        let cli = Cli::try_parse_from([
            "loginapp",
            "serve",
            "--listen",
            "127.0.0.1:5555",
            "--oidc-issuer-url",
            "https://dex.example.com",
            "--oidc-scopes",
            "openid,email",
            "--oidc-offline-as-scope",
            "false",
            "--metrics-port",
            "9191",
            "-v",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert!(cli.verbose);
        assert_eq!(overrides.listen.as_deref(), Some("127.0.0.1:5555"));
        assert_eq!(
            overrides.oidc_issuer_url.as_deref(),
            Some("https://dex.example.com")
        );
        assert_eq!(
            overrides.oidc_scopes,
            Some(vec!["openid".to_string(), "email".to_string()])
        );
        assert_eq!(overrides.oidc_offline_as_scope, Some(false));
        assert_eq!(overrides.metrics_port, Some(9191));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["loginapp"]).is_err());
    }
}
