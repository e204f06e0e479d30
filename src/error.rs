//! Error types for Loginapp
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.
//!
//! Startup code (configuration loading, provider bootstrap) propagates errors
//! through the [`Result`] alias. Per-request code returns [`LoginappError`]
//! directly so that each failure maps onto an HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Main error type for Loginapp operations
///
/// The first six variants form the OIDC error taxonomy. Each one carries a
/// human-readable message that is also what the end user sees in the
/// response body, so messages must never embed the client secret.
#[derive(Error, Debug)]
pub enum LoginappError {
    /// Configuration-related errors (missing fields, unusable CA file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider discovery failed or was cancelled
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// The callback request itself is invalid (provider error, missing code, bad state)
    #[error("Request validation error: {0}")]
    RequestValidation(String),

    /// Authorization code exchange with the token endpoint failed
    #[error("Exchange error: {0}")]
    Exchange(String),

    /// The ID token is missing or did not verify
    #[error("Verification error: {0}")]
    Verification(String),

    /// Claims could not be extracted or the username claim is unusable
    #[error("Claim error: {0}")]
    Claim(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl LoginappError {
    /// HTTP status used when this error terminates a request.
    ///
    /// # Examples
    ///
    /// ```
    /// use axum::http::StatusCode;
    /// use loginapp::error::LoginappError;
    ///
    /// let err = LoginappError::RequestValidation("no code in request".to_string());
    /// assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    /// ```
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RequestValidation(_) => StatusCode::BAD_REQUEST,
            Self::Discovery(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message written to the response body.
    ///
    /// OIDC taxonomy variants expose their bare message (for example
    /// `access_denied: user cancelled`). Infrastructure errors are collapsed
    /// into a generic message since they may carry internal details.
    pub fn response_message(&self) -> String {
        match self {
            Self::Config(msg)
            | Self::Discovery(msg)
            | Self::RequestValidation(msg)
            | Self::Exchange(msg)
            | Self::Verification(msg)
            | Self::Claim(msg) => msg.clone(),
            _ => "internal server error".to_string(),
        }
    }
}

impl IntoResponse for LoginappError {
    fn into_response(self) -> Response {
        (self.status_code(), self.response_message()).into_response()
    }
}

/// Result type alias for Loginapp operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = LoginappError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_discovery_error_display() {
        let error = LoginappError::Discovery("issuer unreachable".to_string());
        assert_eq!(error.to_string(), "Discovery error: issuer unreachable");
    }

    #[test]
    fn test_request_validation_maps_to_bad_request() {
        let error = LoginappError::RequestValidation("state mismatch".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.response_message(), "state mismatch");
    }

    #[test]
    fn test_callback_failures_map_to_internal_error() {
        for error in [
            LoginappError::Exchange("failed to get token: boom".to_string()),
            LoginappError::Verification("no id_token in token response".to_string()),
            LoginappError::Claim("bad claim".to_string()),
        ] {
            assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn test_io_error_conversion_hides_details() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "/secret/path");
        let error: LoginappError = io_error.into();
        assert!(matches!(error, LoginappError::Io(_)));
        assert_eq!(error.response_message(), "internal server error");
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("a: [").unwrap_err();
        let error: LoginappError = yaml_error.into();
        assert!(error.to_string().starts_with("YAML error:"));
    }

    #[test]
    fn test_into_response_uses_status_and_message() {
        let response =
            LoginappError::RequestValidation("no code in request".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
