//! Bootstrap persistence (§4.10): the one-shot tenant + seed root credential.

use sqlx::PgPool;

use lore_core::{Credential, LoreError, LoreId, Result, Role, Tenant};

use crate::err::db_err;
use crate::keys::insert_credential;

/// Inserts the tenant and its seed root credential in one transaction,
/// aborting with `conflict` if any tenant row already exists — this core
/// is single-tenant-per-deployment at the bootstrap boundary even though
/// the schema is multi-tenant-shaped (§4.10).
pub async fn bootstrap(
    pool: &PgPool,
    name: &str,
    key_hash: &str,
    key_prefix: &str,
) -> Result<(Tenant, Credential)> {
    let mut tx = pool.begin().await.map_err(db_err)?;

    let existing: i64 = sqlx::query_scalar("SELECT count(*) FROM orgs")
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

    if existing > 0 {
        tx.rollback().await.map_err(db_err)?;
        return Err(LoreError::conflict("a tenant has already been initialized"));
    }

    let tenant_id = LoreId::new();
    sqlx::query("INSERT INTO orgs (id, name, created_at) VALUES ($1, $2, now())")
        .bind(tenant_id.to_string())
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

    let credential =
        insert_credential(&mut *tx, tenant_id, "root", key_hash, key_prefix, None, Role::Admin, true).await?;

    tx.commit().await.map_err(db_err)?;

    Ok((Tenant { id: tenant_id, name: name.to_string() }, credential))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_error_carries_the_stable_code() {
        let err = LoreError::conflict("a tenant has already been initialized");
        assert_eq!(err.code(), "conflict");
        assert_eq!(err.status(), 409);
    }
}
