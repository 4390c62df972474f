//! Key Management (§4.6): create/list/revoke, admin-only.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use lore_core::{credential, LoreError, Role};
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedPrincipal;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct KeyMetadata {
    pub id: String,
    pub name: String,
    pub key_prefix: String,
    pub project: Option<String>,
    pub role: &'static str,
    pub is_root: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<lore_core::Credential> for KeyMetadata {
    fn from(c: lore_core::Credential) -> Self {
        Self {
            id: c.id.to_string(),
            name: c.name,
            key_prefix: c.prefix,
            project: c.project,
            role: c.role.as_str(),
            is_root: c.is_root,
            created_at: c.created_at,
            last_used_at: c.last_used_at,
            revoked_at: c.revoked_at,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Serialize)]
pub struct CreateKeyResponse {
    #[serde(flatten)]
    pub metadata: KeyMetadata,
    pub api_key: String,
}

pub async fn create(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
    Json(body): Json<CreateKeyRequest>,
) -> Result<(StatusCode, Json<CreateKeyResponse>), AppError> {
    principal.requires(Role::Admin)?;

    let secret = credential::generate_secret(32);
    let hash = credential::hash_secret(&secret);
    let prefix = credential::display_prefix(&secret);
    let role = Role::parse_or_reader(body.role.as_deref());

    let created = lore_db::keys::insert_credential(
        &state.pool,
        principal.tenant,
        &body.name,
        &hash,
        &prefix,
        body.project.as_deref(),
        role,
        false,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(CreateKeyResponse { metadata: created.into(), api_key: secret })))
}

pub async fn list(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
) -> Result<Json<Vec<KeyMetadata>>, AppError> {
    principal.requires(Role::Admin)?;
    let credentials = lore_db::keys::list_credentials(&state.pool, principal.tenant).await?;
    Ok(Json(credentials.into_iter().map(KeyMetadata::from).collect()))
}

pub async fn revoke(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    principal.requires(Role::Admin)?;
    let id = id.parse().map_err(|_| LoreError::not_found("key"))?;

    match lore_db::keys::revoke_credential(&state.pool, principal.tenant, id).await? {
        lore_db::RevokeOutcome::Revoked { hash } => {
            state.resolver.invalidate(&hash);
            Ok(StatusCode::NO_CONTENT)
        }
        lore_db::RevokeOutcome::NotFound => Err(LoreError::not_found("key").into()),
        lore_db::RevokeOutcome::AlreadyRevoked => Err(LoreError::conflict("key already revoked").into()),
        lore_db::RevokeOutcome::LastActiveRoot => {
            Err(LoreError::conflict("cannot revoke the last active root credential").into())
        }
    }
}
