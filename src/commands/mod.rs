//! Command handlers for Loginapp
//!
//! One module per CLI subcommand. `main` loads and validates the
//! configuration, then hands it to the matching handler.

pub mod check;
pub mod serve;
