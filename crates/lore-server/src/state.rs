//! Shared application state (§4.11, §9): every long-lived component is
//! constructed once in `main` and threaded through `axum::State` as an
//! `Arc`, never reached into from a process-wide global.

use std::sync::Arc;

use lore_auth::CredentialResolver;
use lore_ratelimit::MemoryRateLimiter;
use lore_telemetry::Metrics;
use sqlx::PgPool;

pub struct AppStateInner {
    pub pool: PgPool,
    pub resolver: CredentialResolver,
    pub rate_limiter: MemoryRateLimiter,
    pub metrics: Metrics,
    pub metrics_enabled: bool,
    pub body_size_limit_bytes: u64,
}

pub type AppState = Arc<AppStateInner>;
