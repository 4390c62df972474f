//! Router-level smoke tests. Uses a lazily-connecting pool (`connect_lazy`)
//! so these run without a live Postgres instance — every path exercised
//! here resolves before any query reaches the pool.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use lore_auth::CredentialResolver;
use lore_core::AuthMode;
use lore_ratelimit::MemoryRateLimiter;
use lore_server::routes;
use lore_server::state::{AppState, AppStateInner};
use lore_telemetry::Metrics;

fn test_state() -> AppState {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/lore_test")
        .expect("connect_lazy never touches the network");

    Arc::new(AppStateInner {
        resolver: CredentialResolver::new(pool.clone(), AuthMode::ApiKeyOnly, None, "tenant_id", "role"),
        rate_limiter: MemoryRateLimiter::new(1000, 60),
        metrics: Metrics::new(),
        metrics_enabled: true,
        body_size_limit_bytes: 1_048_576,
        pool,
    })
}

#[tokio::test]
async fn health_is_always_ok() {
    let app = routes::build_router(test_state());
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_disabled_behaves_as_not_found() {
    let mut state_inner = Arc::try_unwrap(test_state()).ok().unwrap();
    state_inner.metrics_enabled = false;
    let app = routes::build_router(Arc::new(state_inner));

    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lesson_routes_reject_missing_bearer_before_touching_the_database() {
    let app = routes::build_router(test_state());
    let req = Request::builder().uri("/v1/lessons").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn every_response_echoes_or_mints_a_request_id() {
    let app = routes::build_router(test_state());
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
