//! The error envelope (§4.4, §4.12, §7): the one place a `LoreError` is
//! rendered into a response body. Every non-2xx JSON response is exactly
//! `{error, message}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lore_core::LoreError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

pub struct AppError(pub LoreError);

impl From<LoreError> for AppError {
    fn from(err: LoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "unhandled error");
        }
        let body = ErrorBody { error: self.0.code(), message: self.0.to_string() };
        (status, Json(body)).into_response()
    }
}

pub fn envelope(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: code, message: message.into() })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_renders_as_404() {
        let response = AppError(LoreError::not_found("lesson")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_errors_render_as_500_without_leaking_detail() {
        let response = AppError(LoreError::internal("db connection reset")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_errors_render_as_422() {
        let response = AppError(LoreError::validation("bad input")).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
