//! Core data model, error taxonomy, identifiers, and pure domain logic for
//! the Lore memory service. No I/O lives here — `lore-db`, `lore-auth`, and
//! `lore-server` depend on this crate, never the reverse (§9, layering).

pub mod credential;
pub mod error;
pub mod id;
pub mod model;
pub mod scoring;

pub use error::{LoreError, Result};
pub use id::LoreId;
pub use model::{
    AgentConfig, AuditEvent, AuditStats, AuthMode, Credential, DenyRule, Lesson, Principal,
    PrincipalSubject, Role, ScoredLesson, SharingConfig, Tenant, EMBEDDING_DIM,
};
