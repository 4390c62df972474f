//! Lesson Engine endpoints (§4.5): CRUD, atomic voting, ranked recall,
//! export, and import.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use lore_core::{Lesson, LoreError, LoreId, Role, ScoredLesson};
use lore_db::{ImportLesson, LessonListFilter, LessonPatch, NewLesson, RecallQuery};
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedPrincipal;
use crate::error::AppError;
use crate::state::AppState;
use crate::validate;

#[derive(Serialize)]
pub struct LessonBody {
    pub id: String,
    pub problem: String,
    pub resolution: String,
    pub context: Option<String>,
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
    pub meta: serde_json::Value,
}

impl From<Lesson> for LessonBody {
    fn from(l: Lesson) -> Self {
        Self {
            id: l.id.to_string(),
            problem: l.problem,
            resolution: l.resolution,
            context: l.context,
            tags: l.tags,
            confidence: l.confidence,
            source: l.source,
            project: l.project,
            embedding: l.embedding,
            created_at: l.created_at,
            updated_at: l.updated_at,
            expires_at: l.expires_at,
            upvotes: l.upvotes,
            downvotes: l.downvotes,
            reputation: l.reputation,
            meta: l.meta,
        }
    }
}

#[derive(Serialize)]
pub struct ScoredLessonBody {
    #[serde(flatten)]
    pub lesson: LessonBody,
    pub score: f64,
}

impl From<ScoredLesson> for ScoredLessonBody {
    fn from(s: ScoredLesson) -> Self {
        Self { lesson: s.lesson.into(), score: s.score }
    }
}

fn parse_lesson_id(raw: &str) -> Result<LoreId, AppError> {
    raw.parse().map_err(|_| LoreError::not_found("lesson").into())
}

#[derive(Deserialize)]
pub struct CreateLessonRequest {
    pub problem: String,
    pub resolution: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

fn default_confidence() -> f64 {
    1.0
}

pub async fn create(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
    Json(body): Json<CreateLessonRequest>,
) -> Result<(StatusCode, Json<LessonBody>), AppError> {
    principal.requires(Role::Writer)?;
    validate::embedding(&body.embedding)?;
    validate::confidence(body.confidence)?;

    // A credential's own project scope always wins over whatever the body claims (§4.5).
    let project = principal.project.clone().or(body.project);

    let lesson = lore_db::lessons::create_lesson(
        &state.pool,
        principal.tenant,
        NewLesson {
            problem: body.problem,
            resolution: body.resolution,
            context: body.context,
            tags: body.tags,
            confidence: body.confidence,
            source: body.source,
            project,
            embedding: body.embedding,
            expires_at: body.expires_at,
            meta: body.meta.unwrap_or_else(|| serde_json::json!({})),
        },
    )
    .await?;

    state.metrics.record_lesson_saved();
    Ok((StatusCode::CREATED, Json(lesson.into())))
}

pub async fn get(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LessonBody>, AppError> {
    principal.requires(Role::Reader)?;
    let id = parse_lesson_id(&id)?;

    let lesson = lore_db::lessons::get_lesson(&state.pool, principal.tenant, principal.project.as_deref(), id)
        .await?
        .ok_or_else(|| LoreError::not_found("lesson"))?;

    Ok(Json(lesson.into()))
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub min_reputation: Option<i64>,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_list_limit() -> i64 {
    50
}

pub async fn list(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<LessonBody>>, AppError> {
    principal.requires(Role::Reader)?;
    validate::list_limit(query.limit)?;

    let project = principal.project.clone().or(query.project);
    let lessons = lore_db::lessons::list_lessons(
        &state.pool,
        principal.tenant,
        &LessonListFilter {
            project,
            text: query.text,
            category: query.category,
            min_reputation: query.min_reputation,
            limit: query.limit,
            offset: query.offset.max(0),
        },
    )
    .await?;

    Ok(Json(lessons.into_iter().map(LessonBody::from).collect()))
}

/// A vote-delta field is accepted either as a signed string (`"+1"`) or a
/// number, matching how the source's loosely-typed clients send it.
#[derive(Deserialize)]
#[serde(untagged)]
enum VoteDelta {
    Number(i64),
    Text(String),
}

impl VoteDelta {
    fn to_i64(&self) -> Result<i64, LoreError> {
        match self {
            VoteDelta::Number(n) => Ok(*n),
            VoteDelta::Text(s) => s.parse().map_err(|_| LoreError::validation(format!("invalid vote delta '{s}'"))),
        }
    }
}

#[derive(Deserialize, Default)]
pub struct UpdateLessonRequest {
    #[serde(default)]
    pub problem: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub context: Option<Option<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub source: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub project: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
    #[serde(default)]
    pub upvotes: Option<VoteDelta>,
    #[serde(default)]
    pub downvotes: Option<VoteDelta>,
}

/// Distinguishes "field absent" from "field present but `null`" for
/// patch-style requests: absent leaves the column untouched, `null` clears
/// it (§4.5 double-`Option` pattern, mirrored here at the wire boundary).
fn deserialize_nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

pub async fn update(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateLessonRequest>,
) -> Result<Json<LessonBody>, AppError> {
    principal.requires(Role::Writer)?;
    let id = parse_lesson_id(&id)?;

    if let Some(c) = body.confidence {
        validate::confidence(c)?;
    }

    let upvotes_delta = body.upvotes.as_ref().map(VoteDelta::to_i64).transpose()?;
    let downvotes_delta = body.downvotes.as_ref().map(VoteDelta::to_i64).transpose()?;
    if let Some(d) = upvotes_delta {
        validate::vote_delta(d)?;
    }
    if let Some(d) = downvotes_delta {
        validate::vote_delta(d)?;
    }

    let patch = LessonPatch {
        problem: body.problem,
        resolution: body.resolution,
        context: body.context,
        tags: body.tags,
        confidence: body.confidence,
        source: body.source,
        project: body.project,
        expires_at: body.expires_at,
        meta: body.meta,
        upvotes_delta,
        downvotes_delta,
    };

    if patch.is_empty() {
        return Err(LoreError::validation("patch body must set at least one field").into());
    }

    let lesson = lore_db::lessons::update_lesson(&state.pool, principal.tenant, principal.project.as_deref(), id, patch)
        .await?
        .ok_or_else(|| LoreError::not_found("lesson"))?;

    Ok(Json(lesson.into()))
}

pub async fn delete(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    principal.requires(Role::Writer)?;
    let id = parse_lesson_id(&id)?;

    let deleted =
        lore_db::lessons::delete_lesson(&state.pool, principal.tenant, principal.project.as_deref(), id).await?;
    if !deleted {
        return Err(LoreError::not_found("lesson").into());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct RateRequest {
    pub delta: i64,
}

pub async fn rate(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RateRequest>,
) -> Result<Json<LessonBody>, AppError> {
    principal.requires(Role::Reader)?;
    validate::vote_delta(body.delta)?;
    let id = parse_lesson_id(&id)?;

    let initiated_by = principal_identifier(&principal);
    let lesson = lore_db::lessons::rate_lesson(
        &state.pool,
        principal.tenant,
        principal.project.as_deref(),
        id,
        body.delta,
        &initiated_by,
    )
    .await?
    .ok_or_else(|| LoreError::not_found("lesson"))?;

    Ok(Json(lesson.into()))
}

pub(crate) fn principal_identifier(principal: &lore_core::Principal) -> String {
    match &principal.subject {
        lore_core::PrincipalSubject::ApiKey { credential_id } => credential_id.to_string(),
        lore_core::PrincipalSubject::Jwt { subject } => subject.clone(),
    }
}

#[derive(Deserialize)]
pub struct SearchRequest {
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
    #[serde(default)]
    pub min_confidence: f64,
}

fn default_search_limit() -> i64 {
    5
}

pub async fn search(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
    Json(body): Json<SearchRequest>,
) -> Result<Json<Vec<ScoredLessonBody>>, AppError> {
    principal.requires(Role::Reader)?;
    validate::embedding(&Some(body.embedding.clone()))?;
    validate::search_limit(body.limit)?;
    validate::confidence(body.min_confidence)?;

    let started = std::time::Instant::now();
    let results = lore_db::lessons::search_lessons(
        &state.pool,
        principal.tenant,
        principal.project.as_deref(),
        RecallQuery {
            query_vec: body.embedding,
            tags: body.tags,
            project: body.project,
            limit: body.limit,
            min_confidence: body.min_confidence,
        },
    )
    .await?;
    state.metrics.observe_vector_search_latency(started.elapsed().as_secs_f64());
    state.metrics.record_recall_query();

    Ok(Json(results.into_iter().map(ScoredLessonBody::from).collect()))
}

pub async fn export(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
) -> Result<Json<Vec<LessonBody>>, AppError> {
    principal.requires(Role::Reader)?;
    let lessons =
        lore_db::lessons::export_lessons(&state.pool, principal.tenant, principal.project.as_deref()).await?;
    Ok(Json(lessons.into_iter().map(LessonBody::from).collect()))
}

#[derive(Deserialize)]
pub struct ImportLessonRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub problem: String,
    pub resolution: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
    #[serde(default)]
    pub reputation: i64,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub struct ImportRequest {
    pub lessons: Vec<ImportLessonRequest>,
}

#[derive(Serialize)]
pub struct ImportResponse {
    pub imported: usize,
}

pub async fn import(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(state): State<AppState>,
    Json(body): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, AppError> {
    principal.requires(Role::Writer)?;

    let mut items = Vec::with_capacity(body.lessons.len());
    for item in body.lessons {
        validate::embedding(&item.embedding)?;
        validate::confidence(item.confidence)?;
        let id = item.id.map(|raw| raw.parse()).transpose().map_err(|_| LoreError::validation("malformed id"))?;
        items.push(ImportLesson {
            id,
            problem: item.problem,
            resolution: item.resolution,
            context: item.context,
            tags: item.tags,
            confidence: item.confidence,
            source: item.source,
            project: item.project,
            embedding: item.embedding,
            expires_at: item.expires_at,
            upvotes: item.upvotes,
            downvotes: item.downvotes,
            reputation: item.reputation,
            meta: item.meta.unwrap_or_else(|| serde_json::json!({})),
        });
    }

    let imported = lore_db::lessons::import_lessons(&state.pool, principal.tenant, items).await?;
    Ok(Json(ImportResponse { imported }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_delta_accepts_either_wire_shape() {
        assert_eq!(VoteDelta::Number(1).to_i64().unwrap(), 1);
        assert_eq!(VoteDelta::Text("+1".into()).to_i64().unwrap(), 1);
        assert_eq!(VoteDelta::Text("-1".into()).to_i64().unwrap(), -1);
        assert!(VoteDelta::Text("banana".into()).to_i64().is_err());
    }

    #[test]
    fn parse_lesson_id_maps_garbage_to_not_found_not_validation() {
        let err = parse_lesson_id("not-a-ulid").unwrap_err();
        assert_eq!(err.0.code(), "not_found");
    }

    #[test]
    fn principal_identifier_distinguishes_subject_kinds() {
        let api_key_principal = lore_core::Principal {
            subject: lore_core::PrincipalSubject::ApiKey { credential_id: LoreId::new() },
            tenant: LoreId::new(),
            project: None,
            role: Role::Writer,
        };
        let jwt_principal = lore_core::Principal {
            subject: lore_core::PrincipalSubject::Jwt { subject: "user-42".into() },
            tenant: LoreId::new(),
            project: None,
            role: Role::Writer,
        };
        assert_eq!(principal_identifier(&jwt_principal), "user-42");
        assert_ne!(principal_identifier(&api_key_principal), principal_identifier(&jwt_principal));
    }

    #[test]
    fn update_request_patch_maps_absent_vs_null_fields() {
        let body = UpdateLessonRequest { context: Some(None), ..Default::default() };
        let patch = LessonPatch {
            problem: body.problem,
            resolution: body.resolution,
            context: body.context,
            tags: body.tags,
            confidence: body.confidence,
            source: body.source,
            project: body.project,
            expires_at: body.expires_at,
            meta: body.meta,
            upvotes_delta: None,
            downvotes_delta: None,
        };
        assert!(!patch.is_empty());
        assert_eq!(patch.context, Some(None));
    }
}
