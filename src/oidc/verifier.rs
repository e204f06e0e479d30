//! ID token verification against the provider's JWKS
//!
//! The key set is fetched lazily and cached. A token whose key is not in the
//! cached set triggers a refetch, at most once per [`JWKS_REFRESH_COOLDOWN`],
//! which covers key rotation at the issuer without refetching on every
//! request. Tokens without a `kid` are tried against every signing key whose
//! algorithm is compatible with the token header.
//!
//! Checks performed: signature, `iss` equals the discovered issuer, `aud`
//! contains the client ID, `exp` in the future. Symmetric (HMAC) algorithms
//! are rejected since the provider's public key set cannot verify them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{Jwk, JwkSet, PublicKeyUse};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Header, Validation};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::LoginappError;
use crate::oidc::claims::Claims;

/// Minimum time between two key set fetches triggered by a key miss.
pub const JWKS_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct KeyCache {
    keys: Option<JwkSet>,
    fetched_at: Option<Instant>,
}

/// Verifies ID tokens issued for one client by one issuer.
#[derive(Debug, Clone)]
pub struct IdTokenVerifier {
    http: reqwest::Client,
    jwks_uri: String,
    issuer: String,
    client_id: String,
    cache: Arc<RwLock<KeyCache>>,
}

impl IdTokenVerifier {
    pub fn new(http: reqwest::Client, jwks_uri: String, issuer: String, client_id: String) -> Self {
        Self {
            http,
            jwks_uri,
            issuer,
            client_id,
            cache: Arc::new(RwLock::new(KeyCache::default())),
        }
    }

    /// Verifies `raw_token` and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns [`LoginappError::Verification`] for malformed tokens,
    /// unsupported algorithms, unknown keys, bad signatures, or failed
    /// `iss`/`aud`/`exp` checks; and [`LoginappError::Claim`] if the payload
    /// is not a JSON object.
    pub async fn verify(&self, raw_token: &str) -> Result<Claims, LoginappError> {
        let header = decode_header(raw_token)
            .map_err(|e| verification_error(format!("malformed token header: {e}")))?;

        if matches!(
            header.alg,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(verification_error(format!(
                "unsupported signing algorithm {:?}",
                header.alg
            )));
        }

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let cached = self.cache.read().await.keys.clone();
        if let Some(keys) = cached {
            if let Some(claims) = verify_with_keys(&keys, raw_token, &header, &validation)? {
                return Ok(claims);
            }
        }

        if let Some(keys) = self.refresh_keys(header.kid.as_deref()).await? {
            if let Some(claims) = verify_with_keys(&keys, raw_token, &header, &validation)? {
                return Ok(claims);
            }
        }

        Err(verification_error(format!(
            "no signing key matching kid {}",
            header.kid.as_deref().unwrap_or("<none>")
        )))
    }

    /// Refetches the key set unless it was fetched within the cooldown, and
    /// returns the current set either way.
    async fn refresh_keys(&self, kid: Option<&str>) -> Result<Option<JwkSet>, LoginappError> {
        let mut cache = self.cache.write().await;
        let fresh = cache
            .fetched_at
            .is_some_and(|at| at.elapsed() < JWKS_REFRESH_COOLDOWN);
        if fresh {
            tracing::debug!(jwks_uri = %self.jwks_uri, kid = ?kid, "JWKS fetched recently, not refetching");
            return Ok(cache.keys.clone());
        }

        tracing::debug!(jwks_uri = %self.jwks_uri, kid = ?kid, "Fetching JWKS");
        let keys = self.fetch_keys().await?;
        cache.keys = Some(keys.clone());
        cache.fetched_at = Some(Instant::now());
        Ok(Some(keys))
    }

    async fn fetch_keys(&self) -> Result<JwkSet, LoginappError> {
        let resp = self
            .http
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| verification_error(format!("JWKS request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(verification_error(format!(
                "JWKS endpoint returned {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| verification_error(format!("invalid JWKS document: {e}")))
    }
}

/// Verifies against the candidate keys of `keys`.
///
/// `Ok(None)` means no key in the set verified the signature. With a `kid`
/// the single matching key decides; without one, keys that fail the
/// signature are skipped.
fn verify_with_keys(
    keys: &JwkSet,
    raw_token: &str,
    header: &Header,
    validation: &Validation,
) -> Result<Option<Claims>, LoginappError> {
    let by_kid = header.kid.is_some();

    for jwk in candidate_keys(keys, header.kid.as_deref(), header.alg) {
        let key = match DecodingKey::from_jwk(jwk) {
            Ok(key) => key,
            Err(e) if by_kid => {
                return Err(verification_error(format!("unusable signing key: {e}")));
            }
            Err(_) => continue,
        };

        match decode::<Value>(raw_token, &key, validation) {
            Ok(token) => return Claims::from_value(token.claims).map(Some),
            Err(e)
                if !by_kid
                    && matches!(
                        e.kind(),
                        ErrorKind::InvalidSignature
                            | ErrorKind::InvalidAlgorithm
                            | ErrorKind::InvalidKeyFormat
                    ) =>
            {
                continue
            }
            Err(e) => return Err(verification_error(e.to_string())),
        }
    }

    Ok(None)
}

/// Keys that may have signed a token with `kid` and `alg`.
///
/// A `kid` selects by key ID alone. Without one, every key not reserved for
/// encryption whose declared algorithm (if any) equals `alg` is a candidate.
fn candidate_keys<'a>(keys: &'a JwkSet, kid: Option<&str>, alg: Algorithm) -> Vec<&'a Jwk> {
    match kid {
        Some(kid) => keys
            .keys
            .iter()
            .filter(|key| key.common.key_id.as_deref() == Some(kid))
            .collect(),
        None => keys
            .keys
            .iter()
            .filter(|key| !matches!(key.common.public_key_use, Some(PublicKeyUse::Encryption)))
            .filter(|key| {
                key.common
                    .key_algorithm
                    .as_ref()
                    .map_or(true, |declared| format!("{declared:?}") == format!("{alg:?}"))
            })
            .collect(),
    }
}

fn verification_error(detail: String) -> LoginappError {
    LoginappError::Verification(format!("failed to verify ID token: {detail}"))
}
