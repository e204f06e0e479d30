//! `loginapp check`

use crate::config::AppConfig;
use crate::error::Result;
use crate::oidc::scopes::LEGACY_DEFAULT_SCOPES;

/// Print a summary of a configuration that already passed validation.
///
/// Nothing is contacted; the scope line shows what is requested before
/// the provider's supported scopes are known.
pub fn run_check(config: &AppConfig, config_path: &str) -> Result<()> {
    let scopes = match &config.oidc.scopes {
        Some(scopes) => scopes.join(" "),
        None => format!("{} (legacy defaults)", LEGACY_DEFAULT_SCOPES.join(" ")),
    };

    println!("Configuration OK: {}", config_path);
    println!("  name:          {}", config.name);
    println!("  listen:        {}", config.listen);
    println!("  issuer:        {}", config.oidc.issuer.url);
    println!("  client id:     {}", config.oidc.client.id);
    println!("  redirect url:  {}", config.oidc.client.redirect_url);
    println!("  scopes:        {}", scopes);
    println!("  clusters:      {}", config.clusters.len());
    Ok(())
}
