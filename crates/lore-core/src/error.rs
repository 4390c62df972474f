//! The error taxonomy shared by every Lore component.
//!
//! A single enum spans the whole service. Each wire-facing variant knows its
//! stable error code and HTTP status (§7 of the design); the error-envelope
//! middleware in `lore-server` is the only place that renders a variant into
//! a response body, so the mapping from variant to `{error, message}` is
//! defined exactly once, here.

use thiserror::Error;

/// Errors produced anywhere in the Lore service.
#[derive(Debug, Error)]
pub enum LoreError {
    #[error("missing bearer credential")]
    MissingApiKey,

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("this API key has been revoked")]
    KeyRevoked,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("OIDC is not configured for this server")]
    OidcNotConfigured,

    #[error("API keys are not accepted in this auth mode")]
    ApiKeyNotAllowed,

    #[error("token is missing the configured tenant claim")]
    MissingOrgClaim,

    #[error("credential does not have the required role")]
    InsufficientRole,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("request body exceeds {limit} bytes")]
    RequestTooLarge { limit: u64 },

    #[error("request body contains invalid JSON")]
    MalformedJson,

    #[error("{0}")]
    Validation(String),

    #[error("too many requests, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    /// Catch-all for everything that should never reach a caller in detail:
    /// database failures, serialization bugs, I/O errors. Logged in full,
    /// rendered to the caller as `internal_error` with no further context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl LoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        Self::Validation(what.into())
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::RateLimitExceeded { retry_after_secs }
    }

    pub fn request_too_large(limit: u64) -> Self {
        Self::RequestTooLarge { limit }
    }

    pub fn internal(what: impl std::fmt::Display) -> Self {
        Self::Internal(anyhow::anyhow!(what.to_string()))
    }

    /// The stable wire code from §7, used verbatim as the `error` field of
    /// the response envelope and as the Prometheus error-category label.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "missing_api_key",
            Self::InvalidApiKey => "invalid_api_key",
            Self::KeyRevoked => "key_revoked",
            Self::InvalidToken => "invalid_token",
            Self::OidcNotConfigured => "oidc_not_configured",
            Self::ApiKeyNotAllowed => "api_key_not_allowed",
            Self::MissingOrgClaim => "missing_org_claim",
            Self::InsufficientRole => "insufficient_role",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::RequestTooLarge { .. } => "request_too_large",
            Self::MalformedJson => "malformed_json",
            Self::Validation(_) => "validation_error",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::Internal(_) => "internal_error",
        }
    }

    /// HTTP status this variant maps to (§7).
    pub fn status(&self) -> u16 {
        match self {
            Self::MissingApiKey
            | Self::InvalidApiKey
            | Self::KeyRevoked
            | Self::InvalidToken
            | Self::OidcNotConfigured
            | Self::ApiKeyNotAllowed => 401,
            Self::MissingOrgClaim | Self::InsufficientRole => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::RequestTooLarge { .. } => 413,
            Self::MalformedJson => 400,
            Self::Validation(_) => 422,
            Self::RateLimitExceeded { .. } => 429,
            Self::Internal(_) => 500,
        }
    }

    /// Whether this failure is safe to retry without changing the request.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded { .. } | Self::Internal(_))
    }
}

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, LoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_and_status_agree_with_the_stable_table() {
        assert_eq!(LoreError::MissingApiKey.code(), "missing_api_key");
        assert_eq!(LoreError::MissingApiKey.status(), 401);
        assert_eq!(LoreError::not_found("lesson").code(), "not_found");
        assert_eq!(LoreError::not_found("lesson").status(), 404);
        assert_eq!(LoreError::rate_limited(3).status(), 429);
        assert_eq!(LoreError::request_too_large(1_048_576).status(), 413);
    }

    #[test]
    fn internal_errors_are_recoverable_but_auth_errors_are_not() {
        assert!(LoreError::internal("boom").is_recoverable());
        assert!(!LoreError::InvalidApiKey.is_recoverable());
    }

    #[test]
    fn key_revoked_is_distinct_from_invalid_api_key() {
        // Revocation must surface its own code so a caller can tell a dead
        // key from one that never existed (§8, scenario 5).
        assert_ne!(LoreError::KeyRevoked.code(), LoreError::InvalidApiKey.code());
    }
}
