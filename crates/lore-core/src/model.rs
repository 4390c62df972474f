//! Entities from the data model (spec §3): tenants, credentials, lessons,
//! and the sharing/audit subsystem's per-tenant state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::id::LoreId;

/// Permission level carried by a credential or derived from a JWT claim.
///
/// `Reader ⊂ Writer ⊂ Admin` in permission surface (§4.2): the derived
/// `Ord` impl follows declaration order, so `role >= Role::Writer` is the
/// idiomatic way to check "at least writer".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Writer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Writer => "writer",
            Role::Admin => "admin",
        }
    }

    /// Parse a role claim/column value, defaulting to the least-privileged
    /// role when the value is absent or unrecognized (§4.2, §4.8).
    pub fn parse_or_reader(value: Option<&str>) -> Self {
        match value {
            Some("writer") => Role::Writer,
            Some("admin") => Role::Admin,
            _ => Role::Reader,
        }
    }
}

/// How the Credential Resolver discriminates and accepts bearer tokens (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    ApiKeyOnly,
    Dual,
    OidcRequired,
}

impl AuthMode {
    pub fn accepts_api_keys(&self) -> bool {
        matches!(self, AuthMode::ApiKeyOnly | AuthMode::Dual)
    }

    pub fn accepts_jwts(&self) -> bool {
        matches!(self, AuthMode::Dual | AuthMode::OidcRequired)
    }
}

impl std::str::FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api-key-only" => Ok(AuthMode::ApiKeyOnly),
            "dual" => Ok(AuthMode::Dual),
            "oidc-required" => Ok(AuthMode::OidcRequired),
            other => Err(format!("unrecognized AUTH_MODE: {other}")),
        }
    }
}

/// The outermost isolation scope. Created once via bootstrap; immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: LoreId,
    pub name: String,
}

/// A persisted API key. The raw secret is never stored — only its SHA-256 hex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: LoreId,
    pub tenant: LoreId,
    pub name: String,
    pub hash: String,
    pub prefix: String,
    pub project: Option<String>,
    pub role: Role,
    pub is_root: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }

    /// Effective role per the resolver's mapping rule: an explicit row role
    /// wins; otherwise `is_root` implies admin, else writer (§4.2).
    pub fn effective_role(&self) -> Role {
        self.role
    }
}

/// The authenticated identity resolved for the duration of one request.
/// Never persisted — reconstructed from a credential row or JWT claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: PrincipalSubject,
    pub tenant: LoreId,
    pub project: Option<String>,
    pub role: Role,
}

/// What resolved the principal: an API key row (with its id, for revocation
/// lookups and `last_used_at` bookkeeping) or an external JWT subject claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalSubject {
    ApiKey { credential_id: LoreId },
    Jwt { subject: String },
}

impl Principal {
    pub fn requires(&self, minimum: Role) -> crate::Result<()> {
        if self.role >= minimum {
            Ok(())
        } else {
            Err(crate::LoreError::InsufficientRole)
        }
    }
}

/// A small structured memory: problem, resolution, and metadata for recall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LoreId,
    pub tenant: LoreId,
    pub problem: String,
    pub resolution: String,
    pub context: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub confidence: f64,
    pub source: Option<String>,
    pub project: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub reputation: i64,
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// The embedding dimensionality every lesson's vector must have, when present.
pub const EMBEDDING_DIM: usize = 384;

/// A ranked recall result: a lesson plus the score that placed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredLesson {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub score: f64,
}

/// Per-tenant sharing policy, auto-created with safe defaults on first read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingConfig {
    pub tenant: LoreId,
    pub enabled: bool,
    pub human_review_enabled: bool,
    pub rate_limit_per_hour: i32,
    pub volume_alert_threshold: i32,
    pub updated_at: DateTime<Utc>,
}

impl SharingConfig {
    pub fn default_for(tenant: LoreId) -> Self {
        Self {
            tenant,
            enabled: false,
            human_review_enabled: true,
            rate_limit_per_hour: 100,
            volume_alert_threshold: 1000,
            updated_at: Utc::now(),
        }
    }
}

/// Per-tenant, per-agent sharing toggle, upserted by `agent_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub tenant: LoreId,
    pub agent_id: String,
    pub enabled: bool,
    #[serde(default)]
    pub categories: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// An append/delete-only pattern the core persists but does not interpret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenyRule {
    pub id: LoreId,
    pub tenant: LoreId,
    pub pattern: String,
    pub is_regex: bool,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An append-only audit trail row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: LoreId,
    pub tenant: LoreId,
    pub event_type: String,
    pub lesson_id: Option<LoreId>,
    pub query_text: Option<String>,
    pub initiated_by: String,
    pub created_at: DateTime<Utc>,
}

/// Audit stats: total count plus a breakdown by `event_type` (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStats {
    pub total: i64,
    pub by_event_type: HashMap<String, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering_matches_the_permission_lattice() {
        assert!(Role::Reader < Role::Writer);
        assert!(Role::Writer < Role::Admin);
        assert!(Role::Reader < Role::Admin);
    }

    #[test]
    fn unrecognized_role_claim_falls_back_to_reader() {
        assert_eq!(Role::parse_or_reader(Some("owner")), Role::Reader);
        assert_eq!(Role::parse_or_reader(None), Role::Reader);
        assert_eq!(Role::parse_or_reader(Some("admin")), Role::Admin);
    }

    #[test]
    fn principal_requires_rejects_under_privileged_roles() {
        let p = Principal {
            subject: PrincipalSubject::Jwt { subject: "u1".into() },
            tenant: LoreId::new(),
            project: None,
            role: Role::Reader,
        };
        assert!(p.requires(Role::Reader).is_ok());
        assert!(p.requires(Role::Writer).is_err());
    }

    #[test]
    fn auth_mode_parses_the_three_documented_values() {
        assert_eq!("dual".parse::<AuthMode>().unwrap(), AuthMode::Dual);
        assert_eq!("api-key-only".parse::<AuthMode>().unwrap(), AuthMode::ApiKeyOnly);
        assert_eq!("oidc-required".parse::<AuthMode>().unwrap(), AuthMode::OidcRequired);
        assert!("nonsense".parse::<AuthMode>().is_err());
    }

    #[test]
    fn auth_mode_gates_token_kinds_correctly() {
        assert!(AuthMode::ApiKeyOnly.accepts_api_keys());
        assert!(!AuthMode::ApiKeyOnly.accepts_jwts());
        assert!(AuthMode::OidcRequired.accepts_jwts());
        assert!(!AuthMode::OidcRequired.accepts_api_keys());
        assert!(AuthMode::Dual.accepts_api_keys() && AuthMode::Dual.accepts_jwts());
    }
}
