//! The Credential Resolver (§4.2): `resolve(bearer) -> Principal`, the one
//! entry point every authenticated request goes through.

use std::sync::Arc;

use lore_core::{credential, AuthMode, LoreError, LoreId, Principal, PrincipalSubject, Result, Role};
use sqlx::PgPool;

use crate::cache::CredentialCache;
use crate::debounce::LastUsedDebouncer;
use crate::jwks::JwksClient;

pub struct CredentialResolver {
    pool: PgPool,
    mode: AuthMode,
    cache: CredentialCache,
    debouncer: Arc<LastUsedDebouncer>,
    idp: Option<JwksClient>,
    org_claim: String,
    role_claim: String,
}

impl CredentialResolver {
    pub fn new(
        pool: PgPool,
        mode: AuthMode,
        idp: Option<JwksClient>,
        org_claim: impl Into<String>,
        role_claim: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            mode,
            cache: CredentialCache::default(),
            debouncer: Arc::new(LastUsedDebouncer::default()),
            idp,
            org_claim: org_claim.into(),
            role_claim: role_claim.into(),
        }
    }

    pub async fn resolve(&self, bearer: &str) -> Result<Principal> {
        if credential::looks_like_api_key(bearer) {
            if !self.mode.accepts_api_keys() {
                return Err(LoreError::ApiKeyNotAllowed);
            }
            self.resolve_api_key(bearer).await
        } else {
            if !self.mode.accepts_jwts() {
                return Err(LoreError::InvalidToken);
            }
            self.resolve_jwt(bearer).await
        }
    }

    async fn resolve_api_key(&self, raw: &str) -> Result<Principal> {
        let hash = credential::hash_secret(raw);

        let row = match self.cache.get(&hash) {
            Some(cached) => cached,
            None => {
                let found = lore_db::keys::find_by_hash(&self.pool, &hash).await?;
                let row = found.ok_or(LoreError::InvalidApiKey)?;
                self.cache.insert(hash.clone(), row.clone());
                row
            }
        };

        if !credential::hashes_match(&row.hash, &hash) {
            return Err(LoreError::InvalidApiKey);
        }
        if !row.is_active() {
            return Err(LoreError::KeyRevoked);
        }

        self.debouncer.touch(self.pool.clone(), row.id);

        Ok(Principal {
            subject: PrincipalSubject::ApiKey { credential_id: row.id },
            tenant: row.tenant,
            project: row.project.clone(),
            role: row.effective_role(),
        })
    }

    async fn resolve_jwt(&self, raw: &str) -> Result<Principal> {
        let idp = self.idp.as_ref().ok_or(LoreError::OidcNotConfigured)?;
        let validated = idp.validate(raw).await.ok_or(LoreError::InvalidToken)?;

        let tenant: LoreId = validated
            .claims
            .get(&self.org_claim)
            .and_then(|v| v.as_str())
            .ok_or(LoreError::MissingOrgClaim)?
            .parse()
            .map_err(|_| LoreError::MissingOrgClaim)?;

        let role_claim_value = validated.claims.get(&self.role_claim).and_then(|v| v.as_str());
        let role = Role::parse_or_reader(role_claim_value);

        Ok(Principal {
            subject: PrincipalSubject::Jwt { subject: validated.subject },
            tenant,
            project: None,
            role,
        })
    }

    /// Called by the key-revocation handler right after its transaction
    /// commits, so a freshly-revoked key can never be served from cache.
    pub fn invalidate(&self, hash: &str) {
        self.cache.invalidate(hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_prefixed_tokens_are_discriminated_from_jwts() {
        assert!(credential::looks_like_api_key("lore_sk_abc123"));
        assert!(!credential::looks_like_api_key("eyJhbGciOiJSUzI1NiJ9.payload.sig"));
    }
}
