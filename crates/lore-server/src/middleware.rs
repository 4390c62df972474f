//! Request pipeline middleware (§4.4), applied outermost-first in the order
//! request-id → body-size-cap → rate-limit → context-log.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use lore_ratelimit::RateLimitBackend;
use uuid::Uuid;

use crate::error::envelope;
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Written once resolution succeeds (§auth), read back by `context_log` after
/// the handler runs — the only way to thread the tenant into the access-log
/// line without every handler logging it itself.
#[derive(Clone, Default)]
pub struct TenantSlot(pub Arc<Mutex<Option<String>>>);

/// Trusts an incoming `X-Request-Id`; otherwise mints a UUIDv4. Echoed on
/// every response, success or failure.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Rejects with `request_too_large` (413) when `Content-Length` exceeds the
/// configured cap. An absent or unparsable header is advisory only — the
/// body is never buffered just to re-derive its size.
pub async fn body_size_cap(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let limit = state.body_size_limit_bytes;
    let too_large = req
        .headers()
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .is_some_and(|len| len > limit);

    if too_large {
        return envelope(
            StatusCode::PAYLOAD_TOO_LARGE,
            "request_too_large",
            format!("request body exceeds {limit} bytes"),
        );
    }

    next.run(req).await
}

/// Per-credential sliding-window rate limit (§4.3), keyed by the raw bearer
/// string so even an unauthenticated caller is limited by what it presents.
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let key = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let decision = state.rate_limiter.check(&key).await;

    if !decision.allowed {
        let mut response = envelope(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limit_exceeded",
            format!("too many requests, retry after {}s", decision.retry_after_secs),
        );
        insert_rate_limit_headers(&mut response, decision.limit, decision.remaining, Some(decision.retry_after_secs));
        return response;
    }

    let mut response = next.run(req).await;
    insert_rate_limit_headers(&mut response, decision.limit, decision.remaining, None);
    response
}

fn insert_rate_limit_headers(response: &mut Response, limit: u32, remaining: u32, retry_after: Option<u64>) {
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&limit.to_string()) {
        headers.insert("x-ratelimit-limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", v);
    }
    if let Some(secs) = retry_after {
        if let Ok(v) = HeaderValue::from_str(&secs.to_string()) {
            headers.insert(axum::http::header::RETRY_AFTER, v);
        }
    }
}

/// One structured access-log line per request plus the HTTP RED metrics.
/// `/metrics` and `/health` are excluded from labeled metrics to bound
/// cardinality, but still logged.
pub async fn context_log(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = req.extensions().get::<RequestId>().map(|r| r.0.clone()).unwrap_or_default();

    let tenant_slot = TenantSlot::default();
    req.extensions_mut().insert(tenant_slot.clone());

    let started = Instant::now();
    let response = next.run(req).await;
    let latency = started.elapsed();

    let status = response.status().as_u16();
    let tenant = tenant_slot.0.lock().unwrap().clone().unwrap_or_else(|| "-".to_string());

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status,
        latency_ms = latency.as_millis() as u64,
        tenant = %tenant,
        "request completed"
    );

    if state.metrics_enabled && path != "/metrics" && path != "/health" {
        state.metrics.record_http_request(method.as_str(), &path, status, latency.as_secs_f64());
    }

    response
}
