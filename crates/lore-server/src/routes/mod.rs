//! Route table and middleware assembly (§4.4, §4.5–§4.10).

pub mod health;
pub mod keys;
pub mod lessons;
pub mod org;
pub mod sharing;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower::ServiceBuilder;

use crate::middleware;
use crate::state::AppState;

/// Layers run outermost-first: request-id wraps body-size-cap wraps
/// rate-limit wraps context-log wraps the handler (§4.4).
pub fn build_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/v1/lessons", post(lessons::create).get(lessons::list))
        .route(
            "/v1/lessons/{id}",
            get(lessons::get).patch(lessons::update).delete(lessons::delete),
        )
        .route("/v1/lessons/{id}/rate", post(lessons::rate))
        .route("/v1/lessons/search", post(lessons::search))
        .route("/v1/lessons/export", post(lessons::export))
        .route("/v1/lessons/import", post(lessons::import))
        .route("/v1/keys", post(keys::create).get(keys::list))
        .route("/v1/keys/{id}", delete(keys::revoke))
        .route("/v1/sharing/config", get(sharing::get_config).patch(sharing::update_config))
        .route("/v1/sharing/agents", get(sharing::list_agents))
        .route("/v1/sharing/agents/{agent_id}", post(sharing::upsert_agent))
        .route("/v1/sharing/deny-rules", post(sharing::add_deny_rule).get(sharing::list_deny_rules))
        .route("/v1/sharing/deny-rules/{id}", delete(sharing::delete_deny_rule))
        .route("/v1/sharing/audit", get(sharing::list_audit_events))
        .route("/v1/sharing/audit/stats", get(sharing::audit_stats))
        .route("/v1/sharing/purge", post(sharing::purge));

    let unauthenticated = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(health::metrics))
        .route("/v1/org/init", post(org::init));

    Router::new()
        .merge(authenticated)
        .merge(unauthenticated)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_id))
                .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::body_size_cap))
                .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit))
                .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::context_log)),
        )
        .with_state(state)
}
