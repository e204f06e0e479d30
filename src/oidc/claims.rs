//! Verified ID token claims with checked accessors

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::LoginappError;

/// String-keyed claim set of a verified ID token.
///
/// Accessors never panic: a missing claim or a claim of the wrong JSON type
/// becomes a [`LoginappError::Claim`].
///
/// # Examples
///
/// ```
/// use loginapp::oidc::claims::Claims;
///
/// let claims = Claims::from_value(serde_json::json!({
///     "sub": "CgR1c2Vy",
///     "email": "jane@example.com",
///     "groups": ["admins"]
/// }))
/// .unwrap();
///
/// assert_eq!(claims.get_str("email").unwrap(), Some("jane@example.com"));
/// assert!(claims.get_str("groups").is_err());
/// assert!(claims.get_str("missing").unwrap().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    /// Wraps a decoded payload, which must be a JSON object.
    pub fn from_value(value: Value) -> Result<Self, LoginappError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(LoginappError::Claim(format!(
                "failed to extract claims: expected a JSON object, found {}",
                json_type(&other)
            ))),
        }
    }

    /// String claim, `None` when absent, error when not a string.
    pub fn get_str(&self, name: &str) -> Result<Option<&str>, LoginappError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(LoginappError::Claim(format!(
                "claim '{}' is a {}, expected a string",
                name,
                json_type(other)
            ))),
        }
    }

    /// Expiry (`exp`) as a UTC timestamp, if present and numeric.
    pub fn expires_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let exp = self.0.get("exp")?.as_i64()?;
        chrono::DateTime::from_timestamp(exp, 0)
    }

    /// Indented JSON rendering, for display.
    pub fn pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
