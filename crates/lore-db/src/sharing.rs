//! Sharing & Audit persistence (§4.7): sharing config, per-agent toggles,
//! deny rules, the audit trail, and the destructive tenant purge.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use lore_core::{AgentConfig, AuditEvent, AuditStats, DenyRule, LoreError, LoreId, Result, SharingConfig};

use crate::err::{db_err, parse_id};

#[derive(sqlx::FromRow)]
struct SharingConfigRow {
    org_id: String,
    enabled: bool,
    human_review_enabled: bool,
    rate_limit_per_hour: i32,
    volume_alert_threshold: i32,
    updated_at: DateTime<Utc>,
}

impl SharingConfigRow {
    fn into_config(self) -> Result<SharingConfig> {
        Ok(SharingConfig {
            tenant: parse_id(&self.org_id)?,
            enabled: self.enabled,
            human_review_enabled: self.human_review_enabled,
            rate_limit_per_hour: self.rate_limit_per_hour,
            volume_alert_threshold: self.volume_alert_threshold,
            updated_at: self.updated_at,
        })
    }
}

/// Auto-creates the row with safe defaults on first access (§3, §4.7).
pub async fn get_or_create_sharing_config(pool: &PgPool, tenant: LoreId) -> Result<SharingConfig> {
    let existing: Option<SharingConfigRow> = sqlx::query_as(
        "SELECT org_id, enabled, human_review_enabled, rate_limit_per_hour, volume_alert_threshold, updated_at
         FROM sharing_configs WHERE org_id = $1",
    )
    .bind(tenant.to_string())
    .fetch_optional(pool)
    .await
    .map_err(db_err)?;

    if let Some(row) = existing {
        return row.into_config();
    }

    let defaults = SharingConfig::default_for(tenant);
    let row: SharingConfigRow = sqlx::query_as(
        "INSERT INTO sharing_configs (org_id, enabled, human_review_enabled, rate_limit_per_hour, volume_alert_threshold, updated_at)
         VALUES ($1, $2, $3, $4, $5, now())
         ON CONFLICT (org_id) DO UPDATE SET org_id = EXCLUDED.org_id
         RETURNING org_id, enabled, human_review_enabled, rate_limit_per_hour, volume_alert_threshold, updated_at",
    )
    .bind(tenant.to_string())
    .bind(defaults.enabled)
    .bind(defaults.human_review_enabled)
    .bind(defaults.rate_limit_per_hour)
    .bind(defaults.volume_alert_threshold)
    .fetch_one(pool)
    .await
    .map_err(db_err)?;

    row.into_config()
}

/// `None` fields are left untouched (COALESCE-style partial update, §4.7).
#[derive(Debug, Default)]
pub struct SharingConfigPatch {
    pub enabled: Option<bool>,
    pub human_review_enabled: Option<bool>,
    pub rate_limit_per_hour: Option<i32>,
    pub volume_alert_threshold: Option<i32>,
}

pub async fn update_sharing_config(
    pool: &PgPool,
    tenant: LoreId,
    patch: SharingConfigPatch,
) -> Result<SharingConfig> {
    get_or_create_sharing_config(pool, tenant).await?;

    let row: SharingConfigRow = sqlx::query_as(
        "UPDATE sharing_configs SET
            enabled = COALESCE($2, enabled),
            human_review_enabled = COALESCE($3, human_review_enabled),
            rate_limit_per_hour = COALESCE($4, rate_limit_per_hour),
            volume_alert_threshold = COALESCE($5, volume_alert_threshold),
            updated_at = now()
         WHERE org_id = $1
         RETURNING org_id, enabled, human_review_enabled, rate_limit_per_hour, volume_alert_threshold, updated_at",
    )
    .bind(tenant.to_string())
    .bind(patch.enabled)
    .bind(patch.human_review_enabled)
    .bind(patch.rate_limit_per_hour)
    .bind(patch.volume_alert_threshold)
    .fetch_one(pool)
    .await
    .map_err(db_err)?;

    row.into_config()
}

#[derive(sqlx::FromRow)]
struct AgentConfigRow {
    org_id: String,
    agent_id: String,
    enabled: bool,
    categories: serde_json::Value,
    updated_at: DateTime<Utc>,
}

impl AgentConfigRow {
    fn into_config(self) -> Result<AgentConfig> {
        let categories: Vec<String> = serde_json::from_value(self.categories).unwrap_or_default();
        Ok(AgentConfig {
            tenant: parse_id(&self.org_id)?,
            agent_id: self.agent_id,
            enabled: self.enabled,
            categories,
            updated_at: self.updated_at,
        })
    }
}

pub async fn list_agent_configs(pool: &PgPool, tenant: LoreId) -> Result<Vec<AgentConfig>> {
    let rows: Vec<AgentConfigRow> = sqlx::query_as(
        "SELECT org_id, agent_id, enabled, categories, updated_at
         FROM agent_configs WHERE org_id = $1 ORDER BY agent_id ASC",
    )
    .bind(tenant.to_string())
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    rows.into_iter().map(AgentConfigRow::into_config).collect()
}

pub async fn upsert_agent_config(
    pool: &PgPool,
    tenant: LoreId,
    agent_id: &str,
    enabled: Option<bool>,
    categories: Option<Vec<String>>,
) -> Result<AgentConfig> {
    let categories_json = match &categories {
        Some(c) => Some(serde_json::to_value(c).map_err(|e| LoreError::internal(format!("encoding categories: {e}")))?),
        None => None,
    };

    let row: AgentConfigRow = sqlx::query_as(
        "INSERT INTO agent_configs (org_id, agent_id, enabled, categories, updated_at)
         VALUES ($1, $2, COALESCE($3, TRUE), COALESCE($4, '[]'::jsonb), now())
         ON CONFLICT (org_id, agent_id) DO UPDATE SET
            enabled = COALESCE($3, agent_configs.enabled),
            categories = COALESCE($4, agent_configs.categories),
            updated_at = now()
         RETURNING org_id, agent_id, enabled, categories, updated_at",
    )
    .bind(tenant.to_string())
    .bind(agent_id)
    .bind(enabled)
    .bind(categories_json)
    .fetch_one(pool)
    .await
    .map_err(db_err)?;

    row.into_config()
}

#[derive(sqlx::FromRow)]
struct DenyRuleRow {
    id: String,
    org_id: String,
    pattern: String,
    is_regex: bool,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl DenyRuleRow {
    fn into_rule(self) -> Result<DenyRule> {
        Ok(DenyRule {
            id: parse_id(&self.id)?,
            tenant: parse_id(&self.org_id)?,
            pattern: self.pattern,
            is_regex: self.is_regex,
            reason: self.reason,
            created_at: self.created_at,
        })
    }
}

pub async fn add_deny_rule(
    pool: &PgPool,
    tenant: LoreId,
    pattern: &str,
    is_regex: bool,
    reason: Option<&str>,
) -> Result<DenyRule> {
    let id = LoreId::new();
    let row: DenyRuleRow = sqlx::query_as(
        "INSERT INTO deny_rules (id, org_id, pattern, is_regex, reason, created_at)
         VALUES ($1, $2, $3, $4, $5, now())
         RETURNING id, org_id, pattern, is_regex, reason, created_at",
    )
    .bind(id.to_string())
    .bind(tenant.to_string())
    .bind(pattern)
    .bind(is_regex)
    .bind(reason)
    .fetch_one(pool)
    .await
    .map_err(db_err)?;

    row.into_rule()
}

pub async fn list_deny_rules(pool: &PgPool, tenant: LoreId) -> Result<Vec<DenyRule>> {
    let rows: Vec<DenyRuleRow> = sqlx::query_as(
        "SELECT id, org_id, pattern, is_regex, reason, created_at
         FROM deny_rules WHERE org_id = $1 ORDER BY created_at ASC",
    )
    .bind(tenant.to_string())
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    rows.into_iter().map(DenyRuleRow::into_rule).collect()
}

pub async fn delete_deny_rule(pool: &PgPool, tenant: LoreId, id: LoreId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM deny_rules WHERE id = $1 AND org_id = $2")
        .bind(id.to_string())
        .bind(tenant.to_string())
        .execute(pool)
        .await
        .map_err(db_err)?;

    Ok(result.rows_affected() > 0)
}

#[derive(sqlx::FromRow)]
struct AuditEventRow {
    id: String,
    org_id: String,
    event_type: String,
    lesson_id: Option<String>,
    query_text: Option<String>,
    initiated_by: String,
    created_at: DateTime<Utc>,
}

impl AuditEventRow {
    fn into_event(self) -> Result<AuditEvent> {
        let lesson_id = self.lesson_id.as_deref().map(parse_id).transpose()?;
        Ok(AuditEvent {
            id: parse_id(&self.id)?,
            tenant: parse_id(&self.org_id)?,
            event_type: self.event_type,
            lesson_id,
            query_text: self.query_text,
            initiated_by: self.initiated_by,
            created_at: self.created_at,
        })
    }
}

pub async fn record_audit_event(
    pool: &PgPool,
    tenant: LoreId,
    event_type: &str,
    lesson_id: Option<LoreId>,
    query_text: Option<&str>,
    initiated_by: &str,
) -> Result<AuditEvent> {
    let id = LoreId::new();
    let row: AuditEventRow = sqlx::query_as(
        "INSERT INTO audit_events (id, org_id, event_type, lesson_id, query_text, initiated_by, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, now())
         RETURNING id, org_id, event_type, lesson_id, query_text, initiated_by, created_at",
    )
    .bind(id.to_string())
    .bind(tenant.to_string())
    .bind(event_type)
    .bind(lesson_id.map(|id| id.to_string()))
    .bind(query_text)
    .bind(initiated_by)
    .fetch_one(pool)
    .await
    .map_err(db_err)?;

    row.into_event()
}

pub async fn list_audit_events(pool: &PgPool, tenant: LoreId, limit: i64, offset: i64) -> Result<Vec<AuditEvent>> {
    let rows: Vec<AuditEventRow> = sqlx::query_as(
        "SELECT id, org_id, event_type, lesson_id, query_text, initiated_by, created_at
         FROM audit_events WHERE org_id = $1
         ORDER BY created_at DESC, id DESC
         LIMIT $2 OFFSET $3",
    )
    .bind(tenant.to_string())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    rows.into_iter().map(AuditEventRow::into_event).collect()
}

pub async fn audit_stats(pool: &PgPool, tenant: LoreId) -> Result<AuditStats> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT event_type, count(*) FROM audit_events WHERE org_id = $1 GROUP BY event_type",
    )
    .bind(tenant.to_string())
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    let total = rows.iter().map(|(_, n)| n).sum();
    let by_event_type: HashMap<String, i64> = rows.into_iter().collect();

    Ok(AuditStats { total, by_event_type })
}

/// Deletes all per-tenant state except the tenant row and active credentials,
/// in the order lessons → audit → deny-rules → agent-configs → sharing-config,
/// then writes a terminal audit row from a *fresh* pool acquire so it survives
/// even though the transaction that did the deleting committed nothing to
/// audit itself (§4.7, §5).
pub async fn purge_tenant(pool: &PgPool, tenant: LoreId, initiated_by: &str) -> Result<()> {
    let mut tx = pool.begin().await.map_err(db_err)?;

    sqlx::query("DELETE FROM lessons WHERE org_id = $1").bind(tenant.to_string()).execute(&mut *tx).await.map_err(db_err)?;
    sqlx::query("DELETE FROM audit_events WHERE org_id = $1").bind(tenant.to_string()).execute(&mut *tx).await.map_err(db_err)?;
    sqlx::query("DELETE FROM deny_rules WHERE org_id = $1").bind(tenant.to_string()).execute(&mut *tx).await.map_err(db_err)?;
    sqlx::query("DELETE FROM agent_configs WHERE org_id = $1").bind(tenant.to_string()).execute(&mut *tx).await.map_err(db_err)?;
    sqlx::query("DELETE FROM sharing_configs WHERE org_id = $1").bind(tenant.to_string()).execute(&mut *tx).await.map_err(db_err)?;

    tx.commit().await.map_err(db_err)?;

    record_audit_event(pool, tenant, "tenant_purged", None, None, initiated_by).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_event_row_without_lesson_id_maps_to_none() {
        let row = AuditEventRow {
            id: LoreId::new().to_string(),
            org_id: LoreId::new().to_string(),
            event_type: "lesson_rated".into(),
            lesson_id: None,
            query_text: None,
            initiated_by: "k_abc".into(),
            created_at: Utc::now(),
        };
        let event = row.into_event().unwrap();
        assert!(event.lesson_id.is_none());
    }

    #[test]
    fn sharing_config_patch_default_leaves_everything_unset() {
        let patch = SharingConfigPatch::default();
        assert!(patch.enabled.is_none());
        assert!(patch.rate_limit_per_hour.is_none());
    }
}
