//! The `Principal` extractor: every authenticated handler takes
//! `principal: Principal` as an argument and axum resolves it via the
//! Credential Resolver (§4.2) before the handler body runs.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use lore_core::{LoreError, Principal};

use crate::error::AppError;
use crate::middleware::TenantSlot;
use crate::state::AppState;

pub struct AuthenticatedPrincipal(pub Principal);

impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let bearer = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(LoreError::MissingApiKey)?;

        let principal = app_state.resolver.resolve(bearer).await?;

        if let Some(slot) = parts.extensions.get::<TenantSlot>() {
            *slot.0.lock().unwrap() = Some(principal.tenant.to_string());
        }

        Ok(Self(principal))
    }
}
