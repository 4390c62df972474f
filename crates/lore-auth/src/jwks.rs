//! Identity Provider Client (§4.8): JWKS fetch + cache, throttled cache-bust
//! on an unknown `kid`, and algorithm-restricted JWT validation.
//!
//! The validator never raises across its boundary — every failure path
//! returns `None`; callers treat that as an authentication failure, never
//! as a transport error worth propagating.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;

const JWKS_TTL: Duration = Duration::from_secs(3600);
const FORCED_REFRESH_THROTTLE: Duration = Duration::from_secs(60);
const ALLOWED_ALGORITHMS: [Algorithm; 3] = [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

#[derive(Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct Jwk {
    kid: Option<String>,
    kty: String,
    n: Option<String>,
    e: Option<String>,
}

struct CachedJwks {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
}

/// Claims the resolver needs, with the raw payload kept around so it can
/// look up the configured tenant/role claim names without this client
/// needing to know them.
pub struct ValidatedClaims {
    pub subject: String,
    pub claims: serde_json::Value,
}

pub struct JwksClient {
    http: reqwest::Client,
    issuer: String,
    audience: Option<String>,
    cached: RwLock<Option<CachedJwks>>,
    last_forced_refresh: RwLock<Option<Instant>>,
}

impl JwksClient {
    pub fn new(issuer: String, audience: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            issuer,
            audience,
            cached: RwLock::new(None),
            last_forced_refresh: RwLock::new(None),
        }
    }

    pub async fn validate(&self, token: &str) -> Option<ValidatedClaims> {
        let header = jsonwebtoken::decode_header(token).ok()?;
        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            tracing::warn!(alg = ?header.alg, "rejected JWT signed with a disallowed algorithm");
            return None;
        }
        let kid = header.kid?;
        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&self.issuer]);
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        let data = jsonwebtoken::decode::<serde_json::Value>(token, &key, &validation)
            .inspect_err(|error| tracing::warn!(%error, "JWT validation failed"))
            .ok()?;

        let subject = data.claims.get("sub")?.as_str()?.to_string();
        Some(ValidatedClaims { subject, claims: data.claims })
    }

    async fn key_for(&self, kid: &str) -> Option<DecodingKey> {
        if let Some(key) = self.cached_key(kid).await {
            return Some(key);
        }
        if !self.should_force_refresh().await {
            return None;
        }
        self.refresh().await;
        self.cached_key(kid).await
    }

    async fn cached_key(&self, kid: &str) -> Option<DecodingKey> {
        let guard = self.cached.read().await;
        let cached = guard.as_ref()?;
        if cached.fetched_at.elapsed() > JWKS_TTL {
            return None;
        }
        cached.keys.get(kid).cloned()
    }

    /// Throttles forced refreshes to once per minute so an attacker
    /// presenting a stream of unknown `kid`s can't stampede the IdP (§4.8).
    async fn should_force_refresh(&self) -> bool {
        let mut last = self.last_forced_refresh.write().await;
        let due = match *last {
            Some(instant) => instant.elapsed() >= FORCED_REFRESH_THROTTLE,
            None => true,
        };
        if due {
            *last = Some(Instant::now());
        }
        due
    }

    async fn refresh(&self) {
        let url = format!("{}/.well-known/jwks.json", self.issuer.trim_end_matches('/'));
        let fetched = match self.http.get(&url).send().await {
            Ok(response) => response.json::<JwkSet>().await,
            Err(error) => {
                tracing::warn!(%error, %url, "JWKS fetch failed");
                return;
            }
        };

        let jwk_set = match fetched {
            Ok(set) => set,
            Err(error) => {
                tracing::warn!(%error, %url, "JWKS response could not be parsed");
                return;
            }
        };

        let mut keys = HashMap::new();
        for jwk in jwk_set.keys {
            let (Some(kid), Some(n), Some(e)) = (jwk.kid, jwk.n, jwk.e) else { continue };
            if jwk.kty != "RSA" {
                continue;
            }
            if let Ok(key) = DecodingKey::from_rsa_components(&n, &e) {
                keys.insert(kid, key);
            }
        }

        *self.cached.write().await = Some(CachedJwks { keys, fetched_at: Instant::now() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_asymmetric_algorithms_are_allowed() {
        assert!(ALLOWED_ALGORITHMS.contains(&Algorithm::RS256));
        assert!(!ALLOWED_ALGORITHMS.contains(&Algorithm::HS256));
    }

    #[tokio::test]
    async fn validate_rejects_tokens_without_a_kid() {
        let client = JwksClient::new("https://issuer.example".into(), None);
        // A header-less garbage string fails to decode at all, which is the
        // common case this test stands in for: any malformed input yields
        // `None`, never a panic.
        assert!(client.validate("not-a-jwt").await.is_none());
    }

    #[tokio::test]
    async fn forced_refresh_is_throttled_to_once_per_window() {
        let client = JwksClient::new("https://issuer.example".into(), None);
        assert!(client.should_force_refresh().await);
        assert!(!client.should_force_refresh().await);
    }
}
