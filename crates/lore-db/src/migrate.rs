//! Startup migration runner (§4.1).
//!
//! Applies every `*.sql` file under `migrations_dir` in lexicographic order,
//! each as its own transaction. A missing directory is a warning, not a
//! startup failure — local development often runs migrations out of band.

use std::path::Path;

use lore_core::Result;
use sqlx::PgPool;

use crate::err::db_err;

pub async fn run_migrations(pool: &PgPool, migrations_dir: &str) -> Result<()> {
    let dir = Path::new(migrations_dir);
    if !dir.is_dir() {
        tracing::warn!(migrations_dir, "migrations directory not found; starting unmigrated");
        return Ok(());
    }

    let mut files: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| lore_core::LoreError::internal(format!("reading {migrations_dir}: {e}")))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("sql"))
        .collect();
    files.sort();

    if files.is_empty() {
        tracing::warn!(migrations_dir, "no migration files found; starting unmigrated");
        return Ok(());
    }

    for path in files {
        let sql = std::fs::read_to_string(&path)
            .map_err(|e| lore_core::LoreError::internal(format!("reading {}: {e}", path.display())))?;
        tracing::info!(file = %path.display(), "applying migration");
        let mut tx = pool.begin().await.map_err(db_err)?;
        sqlx::raw_sql(&sql).execute(&mut *tx).await.map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
    }

    Ok(())
}
