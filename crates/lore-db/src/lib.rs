//! Connection pool, migrations, and persisted queries for the Lore memory
//! service (§4.1, §4.5, §4.6, §4.7, §4.10).
//!
//! Every query is issued through `sqlx::query`/`query_as` — the
//! runtime-checked form — never the `query!`/`query_as!` compile-time
//! macros, since those require a live database at build time.

mod err;

pub mod keys;
pub mod lessons;
pub mod migrate;
pub mod org;
pub mod pool;
pub mod ready;
pub mod sharing;

pub use keys::RevokeOutcome;
pub use lessons::{ImportLesson, LessonListFilter, LessonPatch, NewLesson, RecallQuery};
pub use migrate::run_migrations;
pub use pool::{build_pool, DEFAULT_POOL_MAX, DEFAULT_POOL_MIN};
pub use ready::{check as check_readiness, Readiness};
pub use sharing::SharingConfigPatch;
