//! sqlx errors never cross a crate boundary raw; this is the one place that
//! folds them into the shared [`lore_core::LoreError`] taxonomy.

use lore_core::LoreError;

pub(crate) fn db_err(e: sqlx::Error) -> LoreError {
    LoreError::internal(format!("database error: {e}"))
}

pub(crate) fn parse_id(raw: &str) -> Result<lore_core::LoreId, LoreError> {
    raw.parse().map_err(|e| LoreError::internal(format!("malformed id '{raw}': {e:?}")))
}
