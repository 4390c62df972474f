//! Connection pool construction (§4.1).

use lore_core::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::err::db_err;

pub const DEFAULT_POOL_MIN: u32 = 2;
pub const DEFAULT_POOL_MAX: u32 = 10;

/// Open a pool against `database_url` with the given min/max connections.
/// `min_connections` is eagerly established before this returns.
pub async fn build_pool(database_url: &str, min_connections: u32, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .min_connections(min_connections)
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(db_err)
}
