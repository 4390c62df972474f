//! Bootstrap (§4.10): `POST /v1/org/init`, unauthenticated.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use lore_core::credential;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct InitRequest {
    pub name: String,
}

#[derive(Serialize)]
pub struct InitResponse {
    pub org_id: String,
    pub api_key: String,
    pub key_prefix: String,
}

pub async fn init(
    State(state): State<AppState>,
    Json(body): Json<InitRequest>,
) -> Result<(StatusCode, Json<InitResponse>), AppError> {
    let secret = credential::generate_secret(16);
    let hash = credential::hash_secret(&secret);
    let prefix = credential::display_prefix(&secret);

    let (tenant, _credential) = lore_db::org::bootstrap(&state.pool, &body.name, &hash, &prefix).await?;

    Ok((
        StatusCode::CREATED,
        Json(InitResponse { org_id: tenant.id.to_string(), api_key: secret, key_prefix: prefix }),
    ))
}
