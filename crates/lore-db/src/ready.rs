//! Readiness probe (§4.1): the pool must answer a trivial query and the
//! `vector` extension must be installed, or recall queries will fail at the
//! SQL layer with a much less legible error.

use sqlx::PgPool;

#[derive(Debug, Clone, Copy)]
pub struct Readiness {
    pub database: bool,
    pub pgvector: bool,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.database && self.pgvector
    }
}

pub async fn check(pool: &PgPool) -> Readiness {
    let database = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await.is_ok();

    let pgvector = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM pg_extension WHERE extname = 'vector')",
    )
    .fetch_one(pool)
    .await
    .unwrap_or(false);

    Readiness { database, pgvector }
}
