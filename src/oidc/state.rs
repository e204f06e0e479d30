//! CSRF state token
//!
//! The token is `base64(sha256(user_agent ++ secret))`: deterministic, with
//! no nonce and no expiry. It binds the callback to a browser family and to
//! the deployment secret, nothing more. Replicas sharing the secret accept
//! each other's tokens, which is what allows load balancing without a
//! session store.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

/// Computes the state token for a user agent.
///
/// # Examples
///
/// ```
/// use loginapp::oidc::state::{generate_state, verify_state};
///
/// let state = generate_state("curl/8.0", "s3cr3t");
/// assert_eq!(state, generate_state("curl/8.0", "s3cr3t"));
/// assert!(verify_state("curl/8.0", &state, "s3cr3t"));
/// assert!(!verify_state("Mozilla/5.0", &state, "s3cr3t"));
/// ```
pub fn generate_state(user_agent: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_agent.as_bytes());
    hasher.update(secret.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Checks a state token received on the callback.
pub fn verify_state(user_agent: &str, candidate: &str, secret: &str) -> bool {
    let expected = generate_state(user_agent, secret);
    constant_time_eq(candidate.as_bytes(), expected.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (left, right) in a.iter().zip(b.iter()) {
        diff |= left ^ right;
    }
    diff == 0
}
