//! Sharing & Audit (§4.7): config, per-agent toggles, deny rules, the audit
//! trail, and the admin-only destructive purge.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use lore_core::{AgentConfig, AuditEvent, AuditStats, DenyRule, LoreError, Role, SharingConfig};
use lore_db::sharing::SharingConfigPatch;
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedPrincipal;
use crate::error::AppError;
use crate::routes::lessons::principal_identifier;
use crate::state::AppState;

pub async fn get_config(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
) -> Result<Json<SharingConfig>, AppError> {
    principal.requires(Role::Reader)?;
    let config = lore_db::sharing::get_or_create_sharing_config(&state.pool, principal.tenant).await?;
    Ok(Json(config))
}

#[derive(Deserialize, Default)]
pub struct UpdateConfigRequest {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub human_review_enabled: Option<bool>,
    #[serde(default)]
    pub rate_limit_per_hour: Option<i32>,
    #[serde(default)]
    pub volume_alert_threshold: Option<i32>,
}

pub async fn update_config(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
    Json(body): Json<UpdateConfigRequest>,
) -> Result<Json<SharingConfig>, AppError> {
    principal.requires(Role::Admin)?;
    let config = lore_db::sharing::update_sharing_config(
        &state.pool,
        principal.tenant,
        SharingConfigPatch {
            enabled: body.enabled,
            human_review_enabled: body.human_review_enabled,
            rate_limit_per_hour: body.rate_limit_per_hour,
            volume_alert_threshold: body.volume_alert_threshold,
        },
    )
    .await?;
    Ok(Json(config))
}

pub async fn list_agents(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
) -> Result<Json<Vec<AgentConfig>>, AppError> {
    principal.requires(Role::Reader)?;
    let configs = lore_db::sharing::list_agent_configs(&state.pool, principal.tenant).await?;
    Ok(Json(configs))
}

#[derive(Deserialize)]
pub struct UpsertAgentRequest {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

pub async fn upsert_agent(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Json(body): Json<UpsertAgentRequest>,
) -> Result<Json<AgentConfig>, AppError> {
    principal.requires(Role::Admin)?;
    let config = lore_db::sharing::upsert_agent_config(
        &state.pool,
        principal.tenant,
        &agent_id,
        body.enabled,
        body.categories,
    )
    .await?;
    Ok(Json(config))
}

#[derive(Deserialize)]
pub struct AddDenyRuleRequest {
    pub pattern: String,
    #[serde(default)]
    pub is_regex: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn add_deny_rule(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
    Json(body): Json<AddDenyRuleRequest>,
) -> Result<(StatusCode, Json<DenyRule>), AppError> {
    principal.requires(Role::Admin)?;
    let rule = lore_db::sharing::add_deny_rule(
        &state.pool,
        principal.tenant,
        &body.pattern,
        body.is_regex,
        body.reason.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn list_deny_rules(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
) -> Result<Json<Vec<DenyRule>>, AppError> {
    principal.requires(Role::Reader)?;
    let rules = lore_db::sharing::list_deny_rules(&state.pool, principal.tenant).await?;
    Ok(Json(rules))
}

pub async fn delete_deny_rule(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    principal.requires(Role::Admin)?;
    let id = id.parse().map_err(|_| LoreError::not_found("deny rule"))?;
    let deleted = lore_db::sharing::delete_deny_rule(&state.pool, principal.tenant, id).await?;
    if !deleted {
        return Err(LoreError::not_found("deny rule").into());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ListAuditQuery {
    #[serde(default = "default_audit_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_audit_limit() -> i64 {
    50
}

pub async fn list_audit_events(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
    Query(query): Query<ListAuditQuery>,
) -> Result<Json<Vec<AuditEvent>>, AppError> {
    principal.requires(Role::Reader)?;
    let events =
        lore_db::sharing::list_audit_events(&state.pool, principal.tenant, query.limit.clamp(1, 200), query.offset.max(0))
            .await?;
    Ok(Json(events))
}

pub async fn audit_stats(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
) -> Result<Json<AuditStats>, AppError> {
    principal.requires(Role::Reader)?;
    let stats = lore_db::sharing::audit_stats(&state.pool, principal.tenant).await?;
    Ok(Json(stats))
}

#[derive(Deserialize)]
pub struct PurgeRequest {
    pub confirmation: String,
}

#[derive(Serialize)]
pub struct PurgeResponse {
    pub purged: bool,
}

/// Irreversible (§4.7): requires the literal confirmation phrase and the
/// admin role, to make an accidental call structurally difficult.
pub async fn purge(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
    Json(body): Json<PurgeRequest>,
) -> Result<Json<PurgeResponse>, AppError> {
    principal.requires(Role::Admin)?;
    if body.confirmation != "PURGE" {
        return Err(LoreError::validation("confirmation must be the literal string \"PURGE\"").into());
    }

    let initiated_by = principal_identifier(&principal);
    lore_db::sharing::purge_tenant(&state.pool, principal.tenant, &initiated_by).await?;
    Ok(Json(PurgeResponse { purged: true }))
}
