//! The Lesson Engine's persistence layer (§4.5): CRUD, atomic voting, the
//! scored recall query, and export/import upsert.
//!
//! Every query here is a runtime-checked `sqlx::query`/`query_as` call, never
//! the `query!`/`query_as!` compile-time macros — those require a live
//! database or cached query metadata at build time, neither of which this
//! workspace can produce.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use lore_core::{Lesson, LoreError, LoreId, Result, ScoredLesson};

use crate::err::{db_err, parse_id};

const LESSON_COLUMNS: &str = "id, org_id, problem, resolution, context, tags, confidence, \
    source, project, embedding, created_at, updated_at, expires_at, upvotes, downvotes, \
    reputation, meta";

#[derive(Debug, sqlx::FromRow)]
struct LessonRow {
    id: String,
    org_id: String,
    problem: String,
    resolution: String,
    context: Option<String>,
    tags: serde_json::Value,
    confidence: f64,
    source: Option<String>,
    project: Option<String>,
    embedding: Option<pgvector::Vector>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    upvotes: i64,
    downvotes: i64,
    reputation: i64,
    meta: serde_json::Value,
}

impl LessonRow {
    fn into_lesson(self) -> Result<Lesson> {
        let tags: Vec<String> = serde_json::from_value(self.tags).unwrap_or_default();
        Ok(Lesson {
            id: parse_id(&self.id)?,
            tenant: parse_id(&self.org_id)?,
            problem: self.problem,
            resolution: self.resolution,
            context: self.context,
            tags,
            confidence: self.confidence,
            source: self.source,
            project: self.project,
            embedding: self.embedding.map(|v| v.to_vec()),
            created_at: self.created_at,
            updated_at: self.updated_at,
            expires_at: self.expires_at,
            upvotes: self.upvotes,
            downvotes: self.downvotes,
            reputation: self.reputation,
            meta: self.meta,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SearchRow {
    #[sqlx(flatten)]
    lesson: LessonRow,
    score: f64,
}

fn encode_tags(tags: &[String]) -> Result<serde_json::Value> {
    serde_json::to_value(tags).map_err(|e| LoreError::internal(format!("encoding tags: {e}")))
}

/// Escape `%`/`_`/`\` so a user-supplied text filter behaves like a plain
/// substring match under `ILIKE`, not a wildcard pattern.
fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

pub struct NewLesson {
    pub problem: String,
    pub resolution: String,
    pub context: Option<String>,
    pub tags: Vec<String>,
    pub confidence: f64,
    pub source: Option<String>,
    pub project: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub meta: serde_json::Value,
}

pub async fn create_lesson(pool: &PgPool, tenant: LoreId, input: NewLesson) -> Result<Lesson> {
    let id = LoreId::new();
    let now = Utc::now();
    let tags_json = encode_tags(&input.tags)?;
    let embedding = input.embedding.map(pgvector::Vector::from);

    let query = format!(
        "INSERT INTO lessons
            (id, org_id, problem, resolution, context, tags, confidence, source, project,
             embedding, created_at, updated_at, expires_at, meta)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11, $12, $13)
         RETURNING {LESSON_COLUMNS}"
    );

    let row: LessonRow = sqlx::query_as(&query)
        .bind(id.to_string())
        .bind(tenant.to_string())
        .bind(&input.problem)
        .bind(&input.resolution)
        .bind(&input.context)
        .bind(tags_json)
        .bind(input.confidence)
        .bind(&input.source)
        .bind(&input.project)
        .bind(embedding)
        .bind(now)
        .bind(input.expires_at)
        .bind(input.meta)
        .fetch_one(pool)
        .await
        .map_err(db_err)?;

    row.into_lesson()
}

pub async fn get_lesson(
    pool: &PgPool,
    tenant: LoreId,
    project_scope: Option<&str>,
    id: LoreId,
) -> Result<Option<Lesson>> {
    let query = format!(
        "SELECT {LESSON_COLUMNS} FROM lessons
         WHERE id = $1 AND org_id = $2 AND ($3::text IS NULL OR project = $3)"
    );

    let row: Option<LessonRow> = sqlx::query_as(&query)
        .bind(id.to_string())
        .bind(tenant.to_string())
        .bind(project_scope)
        .fetch_optional(pool)
        .await
        .map_err(db_err)?;

    row.map(LessonRow::into_lesson).transpose()
}

/// `project` here is the *effective* project filter the caller has already
/// resolved: the credential's own project scope if it has one, else
/// whatever the caller requested in the query string.
pub struct LessonListFilter {
    pub project: Option<String>,
    pub text: Option<String>,
    pub category: Option<String>,
    pub min_reputation: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list_lessons(pool: &PgPool, tenant: LoreId, filter: &LessonListFilter) -> Result<Vec<Lesson>> {
    let text_pattern = filter.text.as_ref().map(|t| format!("%{}%", escape_like(t)));
    let category_json = match &filter.category {
        Some(c) => Some(encode_tags(std::slice::from_ref(c))?),
        None => None,
    };

    let query = format!(
        "SELECT {LESSON_COLUMNS} FROM lessons
         WHERE org_id = $1
           AND ($2::text IS NULL OR project = $2)
           AND ($3::text IS NULL OR problem ILIKE $3 OR resolution ILIKE $3)
           AND ($4::jsonb IS NULL OR tags @> $4)
           AND ($5::bigint IS NULL OR reputation >= $5)
         ORDER BY created_at DESC, id DESC
         LIMIT $6 OFFSET $7"
    );

    let rows: Vec<LessonRow> = sqlx::query_as(&query)
        .bind(tenant.to_string())
        .bind(&filter.project)
        .bind(&text_pattern)
        .bind(category_json)
        .bind(filter.min_reputation)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(pool)
        .await
        .map_err(db_err)?;

    rows.into_iter().map(LessonRow::into_lesson).collect()
}

/// Double-`Option` on nullable fields distinguishes "not present in the
/// patch" (`None`) from "explicitly set to null" (`Some(None)`).
#[derive(Debug, Default)]
pub struct LessonPatch {
    pub problem: Option<String>,
    pub resolution: Option<String>,
    pub context: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub confidence: Option<f64>,
    pub source: Option<Option<String>>,
    pub project: Option<Option<String>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub meta: Option<serde_json::Value>,
    pub upvotes_delta: Option<i64>,
    pub downvotes_delta: Option<i64>,
}

impl LessonPatch {
    /// Callers must reject an empty patch with `validation_error` (422)
    /// before calling `update_lesson` (§4.5).
    pub fn is_empty(&self) -> bool {
        self.problem.is_none()
            && self.resolution.is_none()
            && self.context.is_none()
            && self.tags.is_none()
            && self.confidence.is_none()
            && self.source.is_none()
            && self.project.is_none()
            && self.expires_at.is_none()
            && self.meta.is_none()
            && self.upvotes_delta.is_none()
            && self.downvotes_delta.is_none()
    }
}

pub async fn update_lesson(
    pool: &PgPool,
    tenant: LoreId,
    project_scope: Option<&str>,
    id: LoreId,
    patch: LessonPatch,
) -> Result<Option<Lesson>> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE lessons SET updated_at = now()");

    if let Some(problem) = patch.problem {
        builder.push(", problem = ").push_bind(problem);
    }
    if let Some(resolution) = patch.resolution {
        builder.push(", resolution = ").push_bind(resolution);
    }
    if let Some(context) = patch.context {
        builder.push(", context = ").push_bind(context);
    }
    if let Some(tags) = &patch.tags {
        builder.push(", tags = ").push_bind(encode_tags(tags)?);
    }
    if let Some(confidence) = patch.confidence {
        builder.push(", confidence = ").push_bind(confidence);
    }
    if let Some(source) = patch.source {
        builder.push(", source = ").push_bind(source);
    }
    if let Some(project) = patch.project {
        builder.push(", project = ").push_bind(project);
    }
    if let Some(expires_at) = patch.expires_at {
        builder.push(", expires_at = ").push_bind(expires_at);
    }
    if let Some(meta) = patch.meta {
        builder.push(", meta = ").push_bind(meta);
    }
    if let Some(delta) = patch.upvotes_delta {
        builder.push(", upvotes = upvotes + ").push_bind(delta);
    }
    if let Some(delta) = patch.downvotes_delta {
        builder.push(", downvotes = downvotes + ").push_bind(delta);
    }

    builder.push(" WHERE id = ").push_bind(id.to_string());
    builder.push(" AND org_id = ").push_bind(tenant.to_string());
    if let Some(project) = project_scope {
        builder.push(" AND project = ").push_bind(project.to_string());
    }
    builder.push(" RETURNING ").push(LESSON_COLUMNS);

    let row: Option<LessonRow> = builder.build_query_as().fetch_optional(pool).await.map_err(db_err)?;
    row.map(LessonRow::into_lesson).transpose()
}

pub async fn delete_lesson(
    pool: &PgPool,
    tenant: LoreId,
    project_scope: Option<&str>,
    id: LoreId,
) -> Result<bool> {
    let result = sqlx::query(
        "DELETE FROM lessons WHERE id = $1 AND org_id = $2 AND ($3::text IS NULL OR project = $3)",
    )
    .bind(id.to_string())
    .bind(tenant.to_string())
    .bind(project_scope)
    .execute(pool)
    .await
    .map_err(db_err)?;

    Ok(result.rows_affected() > 0)
}

/// `delta` is `+1` or `-1` (validated by the caller). Bumps `reputation` and
/// records an audit row in the same transaction (§4.7).
pub async fn rate_lesson(
    pool: &PgPool,
    tenant: LoreId,
    project_scope: Option<&str>,
    id: LoreId,
    delta: i64,
    initiated_by: &str,
) -> Result<Option<Lesson>> {
    let mut tx = pool.begin().await.map_err(db_err)?;

    let query = format!(
        "UPDATE lessons SET reputation = reputation + $1, updated_at = now()
         WHERE id = $2 AND org_id = $3 AND ($4::text IS NULL OR project = $4)
         RETURNING {LESSON_COLUMNS}"
    );

    let row: Option<LessonRow> = sqlx::query_as(&query)
        .bind(delta)
        .bind(id.to_string())
        .bind(tenant.to_string())
        .bind(project_scope)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

    let Some(row) = row else {
        tx.rollback().await.map_err(db_err)?;
        return Ok(None);
    };

    sqlx::query(
        "INSERT INTO audit_events (id, org_id, event_type, lesson_id, query_text, initiated_by, created_at)
         VALUES ($1, $2, 'lesson_rated', $3, NULL, $4, now())",
    )
    .bind(LoreId::new().to_string())
    .bind(tenant.to_string())
    .bind(id.to_string())
    .bind(initiated_by)
    .execute(&mut *tx)
    .await
    .map_err(db_err)?;

    tx.commit().await.map_err(db_err)?;
    row.into_lesson().map(Some)
}

pub struct RecallQuery {
    pub query_vec: Vec<f32>,
    pub tags: Vec<String>,
    pub project: Option<String>,
    pub limit: i64,
    pub min_confidence: f64,
}

/// The ranked recall query (§4.5). `project_scope` (the credential's own
/// scope, if any) always wins over `query.project`.
///
/// The composite score (`recall_score` in `lore_core::scoring`) is computed
/// entirely in SQL over the full tenant/project/tag-filtered row set, not
/// over a vector-distance-limited candidate pool — a lesson with moderate
/// similarity but high recency/vote_factor must be able to outrank a
/// close-but-stale match, so the ranking and the `LIMIT` both apply to the
/// true top-K by score, never to a pre-filtered subset. `DECAY_LAMBDA` and
/// `VOTE_FACTOR_FLOOR` are bound as parameters rather than hardcoded so the
/// SQL and `lore_core::scoring`'s Rust constants can never drift apart.
pub async fn search_lessons(
    pool: &PgPool,
    tenant: LoreId,
    project_scope: Option<&str>,
    query: RecallQuery,
) -> Result<Vec<ScoredLesson>> {
    let tags_json = if query.tags.is_empty() { None } else { Some(encode_tags(&query.tags)?) };
    let vector = pgvector::Vector::from(query.query_vec);
    let effective_project = project_scope.map(str::to_string).or(query.project);

    let rows: Vec<SearchRow> = sqlx::query_as(
        "SELECT id, org_id, problem, resolution, context, tags, confidence, source, project,
                embedding, created_at, updated_at, expires_at, upvotes, downvotes, reputation, meta,
                score
         FROM (
             SELECT id, org_id, problem, resolution, context, tags, confidence, source, project,
                    embedding, created_at, updated_at, expires_at, upvotes, downvotes, reputation, meta,
                    GREATEST(
                        ROUND(
                            (
                                (1 - (embedding <=> $1))
                                * confidence
                                * EXP(-$7 * (EXTRACT(EPOCH FROM (now() - updated_at)) / 86400.0))
                                * GREATEST(1.0 + 0.1 * (upvotes - downvotes), $8)
                            )::numeric,
                            6
                        )::double precision,
                        0.0
                    ) AS score
             FROM lessons
             WHERE org_id = $2
               AND ($3::text IS NULL OR project = $3)
               AND (expires_at IS NULL OR expires_at > now())
               AND embedding IS NOT NULL
               AND ($4::jsonb IS NULL OR tags @> $4)
         ) scored
         WHERE score >= $6
         ORDER BY score DESC, updated_at DESC, id ASC
         LIMIT $5",
    )
    .bind(&vector)
    .bind(tenant.to_string())
    .bind(&effective_project)
    .bind(tags_json)
    .bind(query.limit)
    .bind(query.min_confidence)
    .bind(lore_core::scoring::DECAY_LAMBDA)
    .bind(lore_core::scoring::VOTE_FACTOR_FLOOR)
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    rows.into_iter()
        .map(|row| {
            let score = row.score;
            row.lesson.into_lesson().map(|lesson| ScoredLesson { lesson, score })
        })
        .collect()
}

pub async fn export_lessons(
    pool: &PgPool,
    tenant: LoreId,
    project_scope: Option<&str>,
) -> Result<Vec<Lesson>> {
    let query = format!(
        "SELECT {LESSON_COLUMNS} FROM lessons
         WHERE org_id = $1 AND ($2::text IS NULL OR project = $2)
         ORDER BY id ASC"
    );

    let rows: Vec<LessonRow> = sqlx::query_as(&query)
        .bind(tenant.to_string())
        .bind(project_scope)
        .fetch_all(pool)
        .await
        .map_err(db_err)?;

    rows.into_iter().map(LessonRow::into_lesson).collect()
}

/// One row of an import payload. `id` absent mints a fresh one; present,
/// it upserts but only if the existing row (if any) already belongs to
/// `tenant` — see the `ON CONFLICT ... WHERE` predicate below.
pub struct ImportLesson {
    pub id: Option<LoreId>,
    pub problem: String,
    pub resolution: String,
    pub context: Option<String>,
    pub tags: Vec<String>,
    pub confidence: f64,
    pub source: Option<String>,
    pub project: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub reputation: i64,
    pub meta: serde_json::Value,
}

pub async fn import_lessons(pool: &PgPool, tenant: LoreId, lessons: Vec<ImportLesson>) -> Result<usize> {
    let mut tx = pool.begin().await.map_err(db_err)?;
    let mut imported = 0usize;
    let now = Utc::now();

    for item in lessons {
        let id = item.id.unwrap_or_default();
        let tags_json = encode_tags(&item.tags)?;
        let embedding = item.embedding.map(pgvector::Vector::from);

        let result = sqlx::query(
            "INSERT INTO lessons
                (id, org_id, problem, resolution, context, tags, confidence, source, project,
                 embedding, created_at, updated_at, expires_at, upvotes, downvotes, reputation, meta)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11, $12, $13, $14, $15, $16)
             ON CONFLICT (id) DO UPDATE SET
                org_id = EXCLUDED.org_id,
                problem = EXCLUDED.problem,
                resolution = EXCLUDED.resolution,
                context = EXCLUDED.context,
                tags = EXCLUDED.tags,
                confidence = EXCLUDED.confidence,
                source = EXCLUDED.source,
                project = EXCLUDED.project,
                embedding = EXCLUDED.embedding,
                updated_at = EXCLUDED.updated_at,
                expires_at = EXCLUDED.expires_at,
                upvotes = EXCLUDED.upvotes,
                downvotes = EXCLUDED.downvotes,
                reputation = EXCLUDED.reputation,
                meta = EXCLUDED.meta
             WHERE lessons.org_id = EXCLUDED.org_id",
        )
        .bind(id.to_string())
        .bind(tenant.to_string())
        .bind(&item.problem)
        .bind(&item.resolution)
        .bind(&item.context)
        .bind(tags_json)
        .bind(item.confidence)
        .bind(&item.source)
        .bind(&item.project)
        .bind(embedding)
        .bind(now)
        .bind(item.expires_at)
        .bind(item.upvotes)
        .bind(item.downvotes)
        .bind(item.reputation)
        .bind(item.meta)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() > 0 {
            imported += 1;
        }
    }

    tx.commit().await.map_err(db_err)?;
    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_neutralizes_wildcard_characters() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("plain text"), "plain text");
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(LessonPatch::default().is_empty());
        let with_delta = LessonPatch { upvotes_delta: Some(1), ..Default::default() };
        assert!(!with_delta.is_empty());
    }

    #[test]
    fn import_without_id_mints_a_fresh_one() {
        let item = ImportLesson {
            id: None,
            problem: "p".into(),
            resolution: "r".into(),
            context: None,
            tags: vec![],
            confidence: 0.5,
            source: None,
            project: None,
            embedding: None,
            expires_at: None,
            upvotes: 0,
            downvotes: 0,
            reputation: 0,
            meta: serde_json::json!({}),
        };
        assert!(item.id.is_none());
        let minted = item.id.unwrap_or_default();
        assert_ne!(minted, LoreId::default());
    }
}
