use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header, jwk::JwkSet};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::{
    interfaces::identity::IdentityVerifier, value_objects::iam::VerifiedIdentity,
};

pub const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

const KEY_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
pub struct FirebaseClaims {
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub exp: usize,
}

struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
}

impl CachedKeys {
    fn is_stale(&self) -> bool {
        self.fetched_at.elapsed() > KEY_CACHE_TTL
    }
}

/// Verifies Firebase Authentication ID tokens against Google's published signing keys.
pub struct FirebaseIdentityVerifier {
    project_id: String,
    jwks_url: String,
    http: reqwest::Client,
    keys: RwLock<Option<CachedKeys>>,
}

impl FirebaseIdentityVerifier {
    pub fn new(project_id: String) -> Result<Self> {
        Self::with_jwks_url(project_id, FIREBASE_JWKS_URL.to_string())
    }

    pub fn with_jwks_url(project_id: String, jwks_url: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build JWKS http client")?;

        Ok(Self {
            project_id,
            jwks_url,
            http,
            keys: RwLock::new(None),
        })
    }

    async fn key_for(&self, kid: &str) -> Result<DecodingKey> {
        {
            let cache = self.keys.read().await;
            if let Some(cached) = cache.as_ref().filter(|cached| !cached.is_stale()) {
                if let Some(key) = cached.keys.get(kid) {
                    return Ok(key.clone());
                }
            }
        }

        // Stale, empty, or rotated: refetch once and look again.
        let fresh = self.fetch_keys().await?;
        let key = fresh.keys.get(kid).cloned();
        *self.keys.write().await = Some(fresh);

        key.ok_or_else(|| anyhow!("signing key '{kid}' is not published"))
    }

    async fn fetch_keys(&self) -> Result<CachedKeys> {
        debug!(jwks_url = %self.jwks_url, "identity: fetching firebase signing keys");

        let jwks: JwkSet = self
            .http
            .get(&self.jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut keys = HashMap::new();
        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                continue;
            };
            keys.insert(kid, DecodingKey::from_jwk(jwk)?);
        }

        info!(key_count = keys.len(), "identity: firebase signing keys refreshed");

        Ok(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        })
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity> {
        let header = decode_header(token).context("malformed ID token")?;
        if header.alg != Algorithm::RS256 {
            bail!("unexpected ID token algorithm {:?}", header.alg);
        }
        let kid = header
            .kid
            .ok_or_else(|| anyhow!("ID token header has no key id"))?;

        let key = self.key_for(&kid).await?;
        let claims = validate_claims(token, &key, Algorithm::RS256, &self.project_id)?;

        Ok(VerifiedIdentity {
            uid: claims.sub,
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
        })
    }

    fn strategy_name(&self) -> &'static str {
        "firebase"
    }
}

/// Checks signature, expiry, audience, issuer and subject of a Firebase ID token.
pub fn validate_claims(
    token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
    project_id: &str,
) -> Result<FirebaseClaims> {
    let mut validation = Validation::new(algorithm);
    validation.set_audience(&[project_id]);
    validation.set_issuer(&[format!("https://securetoken.google.com/{project_id}")]);
    validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);

    let token_data = decode::<FirebaseClaims>(token, key, &validation)
        .map_err(|e| anyhow!("ID token validation failed: {}", e))?;

    if token_data.claims.sub.trim().is_empty() {
        bail!("ID token subject is empty");
    }

    Ok(token_data.claims)
}
