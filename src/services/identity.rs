// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity-provider ID token verification.
//!
//! Coaches authenticate against the GCP identity service; the frontend sends
//! the resulting ID token on every request. This module verifies the RS256
//! signature against the provider's published JWKS (cached in memory) and
//! extracts the profile claims. Sign-up, sign-in and password reset all live
//! in the provider; this subsystem only consumes verified claims.

use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Profile claims carried by a verified ID token.
///
/// These seed the coach record on first authenticated access.
#[derive(Debug, Clone)]
pub struct IdentityClaims {
    /// Stable identity-provider subject (coach document ID)
    pub sub: String,
    /// Display name, if the provider has one
    pub name: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Profile photo URL
    pub picture: Option<String>,
    /// Whether the provider has verified the email
    pub email_verified: Option<bool>,
}

/// Identity verification error categories.
#[derive(Debug, Clone)]
pub enum IdentityError {
    /// The token is missing/invalid or claims do not match expectations.
    Rejected(String),
    /// A transient infrastructure failure occurred (JWKS fetch, etc).
    Transient(String),
}

#[derive(Clone)]
enum VerifierMode {
    /// Verify RS256 signatures against the provider's published JWKS.
    Jwks,
    /// Verify against a fixed key (deterministic local/integration tests).
    StaticKey {
        decoding_key: Arc<DecodingKey>,
        algorithm: Algorithm,
    },
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for identity-provider ID tokens.
pub struct IdentityVerifier {
    http_client: reqwest::Client,
    expected_issuer: String,
    expected_audience: String,
    mode: VerifierMode,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl IdentityVerifier {
    /// Create a production verifier that fetches and caches the provider JWKS.
    pub fn new(project_id: &str) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building identity HTTP client")?;

        let expected_issuer = format!("https://securetoken.google.com/{}", project_id);

        tracing::info!(
            issuer = %expected_issuer,
            audience = %project_id,
            "Initialized identity verifier"
        );

        Ok(Self {
            http_client,
            expected_issuer,
            expected_audience: project_id.to_string(),
            mode: VerifierMode::Jwks,
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Create a verifier with a fixed decoding key.
    ///
    /// Intended for deterministic local/integration tests, where tokens are
    /// minted with a shared secret instead of the provider's RSA keys.
    pub fn new_with_static_key(
        project_id: &str,
        decoding_key: DecodingKey,
        algorithm: Algorithm,
    ) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building identity HTTP client")?;

        Ok(Self {
            http_client,
            expected_issuer: format!("https://securetoken.google.com/{}", project_id),
            expected_audience: project_id.to_string(),
            mode: VerifierMode::StaticKey {
                decoding_key: Arc::new(decoding_key),
                algorithm,
            },
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Verify a bearer ID token and extract its profile claims.
    pub async fn verify(&self, token: &str) -> Result<IdentityClaims, IdentityError> {
        let (decoding_key, algorithm) = match &self.mode {
            VerifierMode::StaticKey {
                decoding_key,
                algorithm,
            } => (decoding_key.clone(), *algorithm),
            VerifierMode::Jwks => {
                let header = decode_header(token)
                    .map_err(|e| IdentityError::Rejected(format!("invalid JWT header: {e}")))?;

                if header.alg != Algorithm::RS256 {
                    return Err(IdentityError::Rejected(format!(
                        "unexpected JWT alg: {:?}",
                        header.alg
                    )));
                }

                let kid = header
                    .kid
                    .ok_or_else(|| IdentityError::Rejected("missing JWT kid".to_string()))?;

                (self.decoding_key_for_kid(&kid).await?, Algorithm::RS256)
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[self.expected_issuer.as_str()]);
        validation.set_audience(&[self.expected_audience.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let token_data = decode::<IdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| IdentityError::Rejected(format!("JWT validation failed: {e}")))?;

        let claims = token_data.claims;

        if claims.sub.trim().is_empty() {
            return Err(IdentityError::Rejected("empty sub claim".to_string()));
        }

        tracing::debug!(
            sub = %claims.sub,
            email = claims.email.as_deref().unwrap_or("<missing>"),
            "ID token verified"
        );

        Ok(IdentityClaims {
            sub: claims.sub,
            name: claims.name,
            email: claims.email,
            picture: claims.picture,
            email_verified: claims.email_verified,
        })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, IdentityError> {
        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        // Refresh once on miss, once more forced: the provider rotates keys.
        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(IdentityError::Rejected(format!(
            "JWT kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), IdentityError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!(jwks_url = JWKS_URL, "Refreshing identity JWKS cache");

        let response = self
            .http_client
            .get(JWKS_URL)
            .send()
            .await
            .map_err(|e| IdentityError::Transient(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(IdentityError::Transient(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| IdentityError::Transient(format!("invalid JWKS JSON: {e}")))?;

        let mut keys_by_kid: HashMap<String, Arc<DecodingKey>> = HashMap::new();

        for jwk in jwks.keys {
            if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
                continue;
            }

            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys_by_kid.insert(jwk.kid, Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                }
            }
        }

        if keys_by_kid.is_empty() {
            return Err(IdentityError::Transient(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        let entry = JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        };

        *self.jwks_cache.write().await = Some(entry);

        tracing::debug!(ttl_secs = ttl.as_secs(), "Identity JWKS cache refreshed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    n: String,
    e: String,
}

/// Raw ID token claims; `iss`/`aud`/`exp` are checked by the validator.
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    name: Option<String>,
    email: Option<String>,
    picture: Option<String>,
    email_verified: Option<bool>,
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    let Some(max_age) = headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
    else {
        return fallback;
    };

    Duration::from_secs(max_age)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    for directive in value.split(',') {
        let directive = directive.trim();

        if let Some(raw) = directive.strip_prefix("max-age=") {
            let raw = raw.trim_matches('"');
            if let Ok(seconds) = raw.parse::<u64>() {
                return Some(seconds);
            }
        }
    }

    None
}
