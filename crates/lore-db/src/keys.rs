//! Key Management persistence (§4.6): create/list/revoke, plus the
//! hash lookup the Credential Resolver needs on every API-key request.

use chrono::Utc;
use sqlx::PgPool;

use lore_core::{Credential, LoreError, LoreId, Result, Role};

use crate::err::{db_err, parse_id};

const CREDENTIAL_COLUMNS: &str =
    "id, org_id, name, key_hash, key_prefix, project, role, is_root, created_at, last_used_at, revoked_at";

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: String,
    org_id: String,
    name: String,
    key_hash: String,
    key_prefix: String,
    project: Option<String>,
    role: String,
    is_root: bool,
    created_at: chrono::DateTime<Utc>,
    last_used_at: Option<chrono::DateTime<Utc>>,
    revoked_at: Option<chrono::DateTime<Utc>>,
}

impl CredentialRow {
    fn into_credential(self) -> Result<Credential> {
        Ok(Credential {
            id: parse_id(&self.id)?,
            tenant: parse_id(&self.org_id)?,
            name: self.name,
            hash: self.key_hash,
            prefix: self.key_prefix,
            project: self.project,
            role: Role::parse_or_reader(Some(&self.role)),
            is_root: self.is_root,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            revoked_at: self.revoked_at,
        })
    }
}

/// Generic over the executor so bootstrap (§4.10) can pass an open
/// transaction and commit the tenant + seed credential atomically, while
/// ordinary key creation (§4.6) passes the pool directly.
#[allow(clippy::too_many_arguments)]
pub async fn insert_credential<'e, E>(
    executor: E,
    tenant: LoreId,
    name: &str,
    hash: &str,
    prefix: &str,
    project: Option<&str>,
    role: Role,
    is_root: bool,
) -> Result<Credential>
where
    E: sqlx::PgExecutor<'e>,
{
    let id = LoreId::new();
    let query = format!(
        "INSERT INTO api_keys (id, org_id, name, key_hash, key_prefix, project, role, is_root, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
         RETURNING {CREDENTIAL_COLUMNS}"
    );

    let row: CredentialRow = sqlx::query_as(&query)
        .bind(id.to_string())
        .bind(tenant.to_string())
        .bind(name)
        .bind(hash)
        .bind(prefix)
        .bind(project)
        .bind(role.as_str())
        .bind(is_root)
        .fetch_one(executor)
        .await
        .map_err(db_err)?;

    row.into_credential()
}

pub async fn list_credentials(pool: &PgPool, tenant: LoreId) -> Result<Vec<Credential>> {
    let query = format!(
        "SELECT {CREDENTIAL_COLUMNS} FROM api_keys WHERE org_id = $1 ORDER BY created_at ASC"
    );

    let rows: Vec<CredentialRow> = sqlx::query_as(&query)
        .bind(tenant.to_string())
        .fetch_all(pool)
        .await
        .map_err(db_err)?;

    rows.into_iter().map(CredentialRow::into_credential).collect()
}

/// Resolver lookup by SHA-256 hash. Tenant-agnostic: the hash alone is
/// globally unique (§3).
pub async fn find_by_hash(pool: &PgPool, hash: &str) -> Result<Option<Credential>> {
    let query = format!("SELECT {CREDENTIAL_COLUMNS} FROM api_keys WHERE key_hash = $1");

    let row: Option<CredentialRow> =
        sqlx::query_as(&query).bind(hash).fetch_optional(pool).await.map_err(db_err)?;

    row.map(CredentialRow::into_credential).transpose()
}

/// Debounced by the caller (lore-auth); this is a plain unconditional write.
pub async fn touch_last_used(pool: &PgPool, id: LoreId) -> Result<()> {
    sqlx::query("UPDATE api_keys SET last_used_at = now() WHERE id = $1")
        .bind(id.to_string())
        .execute(pool)
        .await
        .map_err(db_err)?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// The key's hash, so the caller can synchronously invalidate the
    /// resolver's credential cache entry (§4.2).
    Revoked { hash: String },
    NotFound,
    AlreadyRevoked,
    LastActiveRoot,
}

/// Revoke under `SELECT ... FOR UPDATE`: refuses an already-revoked row and
/// refuses to revoke the tenant's last active root credential (§3, §4.6).
pub async fn revoke_credential(pool: &PgPool, tenant: LoreId, id: LoreId) -> Result<RevokeOutcome> {
    let mut tx = pool.begin().await.map_err(db_err)?;

    let target: Option<(bool, bool, String)> = sqlx::query_as(
        "SELECT is_root, revoked_at IS NOT NULL, key_hash FROM api_keys
         WHERE id = $1 AND org_id = $2 FOR UPDATE",
    )
    .bind(id.to_string())
    .bind(tenant.to_string())
    .fetch_optional(&mut *tx)
    .await
    .map_err(db_err)?;

    let Some((is_root, already_revoked, hash)) = target else {
        tx.rollback().await.map_err(db_err)?;
        return Ok(RevokeOutcome::NotFound);
    };

    if already_revoked {
        tx.rollback().await.map_err(db_err)?;
        return Ok(RevokeOutcome::AlreadyRevoked);
    }

    if is_root {
        // `FOR UPDATE` can't be combined with an aggregate, so lock every
        // active root row and count what comes back instead of `count(*)`.
        let active_root_ids: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM api_keys
             WHERE org_id = $1 AND is_root = TRUE AND revoked_at IS NULL FOR UPDATE",
        )
        .bind(tenant.to_string())
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        if active_root_ids.len() <= 1 {
            tx.rollback().await.map_err(db_err)?;
            return Ok(RevokeOutcome::LastActiveRoot);
        }
    }

    sqlx::query("UPDATE api_keys SET revoked_at = now() WHERE id = $1")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

    tx.commit().await.map_err(db_err)?;
    Ok(RevokeOutcome::Revoked { hash })
}

/// Count of active (non-revoked) root credentials for a tenant — used by
/// bootstrap's invariant check and by tests that assert the lockout rule.
pub async fn active_root_count(pool: &PgPool, tenant: LoreId) -> Result<i64> {
    sqlx::query_scalar(
        "SELECT count(*) FROM api_keys WHERE org_id = $1 AND is_root = TRUE AND revoked_at IS NULL",
    )
    .bind(tenant.to_string())
    .fetch_one(pool)
    .await
    .map_err(db_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoke_outcome_variants_are_distinguishable() {
        assert_ne!(RevokeOutcome::Revoked { hash: "h".into() }, RevokeOutcome::NotFound);
        assert_ne!(RevokeOutcome::AlreadyRevoked, RevokeOutcome::LastActiveRoot);
    }

    #[test]
    fn credential_row_maps_unrecognized_role_to_reader() {
        let row = CredentialRow {
            id: LoreId::new().to_string(),
            org_id: LoreId::new().to_string(),
            name: "test".into(),
            key_hash: "deadbeef".into(),
            key_prefix: "lore_sk_dead".into(),
            project: None,
            role: "superuser".into(),
            is_root: false,
            created_at: Utc::now(),
            last_used_at: None,
            revoked_at: None,
        };
        let credential = row.into_credential().unwrap();
        assert_eq!(credential.role, Role::Reader);
    }

    #[test]
    fn credential_row_rejects_malformed_ids() {
        let row = CredentialRow {
            id: "not-a-ulid".into(),
            org_id: LoreId::new().to_string(),
            name: "test".into(),
            key_hash: "deadbeef".into(),
            key_prefix: "lore_sk_dead".into(),
            project: None,
            role: "admin".into(),
            is_root: true,
            created_at: Utc::now(),
            last_used_at: None,
            revoked_at: None,
        };
        assert!(matches!(row.into_credential(), Err(LoreError::Internal(_))));
    }
}
