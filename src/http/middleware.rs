//! The readiness, CORS, and rate-limit gates, applied in that order ahead
//! of every handler. Each is an `axum::middleware::from_fn_with_state`
//! function: inspect the request, short-circuit with a typed error
//! response, or call `next.run`.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::errors::UserError;

use super::state::AppState;

/// `/healthz` and `/readyz` report the gate's own state rather than being
/// blocked by it; every other route is refused while the gate is closed.
fn bypasses_readiness_gate(path: &str) -> bool {
    path == "/healthz" || path == "/readyz"
}

pub async fn readiness_gate(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    if bypasses_readiness_gate(request.uri().path()) {
        return next.run(request).await;
    }
    if !state.readiness.load(Ordering::Relaxed) {
        return UserError::NotReady.into_response();
    }
    next.run(request).await
}

fn origin_allowed(cors_origins: &[String], origin: &str) -> bool {
    cors_origins.is_empty() || cors_origins.iter().any(|allowed| allowed == origin)
}

/// Preflight always returns 204; CORS headers are attached only when the
/// origin is allowed, so the browser's own CORS check blocks the follow-up
/// request when it isn't. Non-preflight requests from a disallowed origin
/// get an explicit 403 instead of a silently header-less response, since
/// there's no browser-side gate to rely on for the real request.
pub async fn cors_gate(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let cors_origins = state.config.get().server.cors_origins.clone();
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let is_preflight = request.method() == Method::OPTIONS;

    let Some(origin) = origin else {
        // Server-to-server request: no Origin header, no CORS headers, no gate.
        return next.run(request).await;
    };

    let allowed = origin_allowed(&cors_origins, &origin);

    if is_preflight {
        let mut response = StatusCode::NO_CONTENT.into_response();
        if allowed {
            apply_cors_headers(&mut response, &origin);
        }
        return response;
    }

    if !allowed {
        return UserError::CorsRejected.into_response();
    }

    let mut response = next.run(request).await;
    apply_cors_headers(&mut response, &origin);
    response
}

fn apply_cors_headers(response: &mut Response, origin: &str) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        response.headers_mut().insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type, x-language-hint"),
    );
}

fn is_rate_limited_route(method: &Method, path: &str) -> bool {
    matches!(
        (method, path),
        (&Method::POST, "/api/voice/turn") | (&Method::POST, "/api/settings")
    )
}

pub async fn rate_limit_gate(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !is_rate_limited_route(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    let limit = state.config.get().server.rate_limit_per_minute;
    if !state.rate_limiter.check(addr.ip(), limit) {
        return UserError::RateLimited.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_gate_exempts_only_health_routes() {
        assert!(bypasses_readiness_gate("/healthz"));
        assert!(bypasses_readiness_gate("/readyz"));
        assert!(!bypasses_readiness_gate("/api/voice/turn"));
        assert!(!bypasses_readiness_gate("/api/settings"));
    }

    #[test]
    fn empty_allowlist_permits_every_origin() {
        assert!(origin_allowed(&[], "http://evil.example"));
    }

    #[test]
    fn non_empty_allowlist_rejects_unlisted_origins() {
        let origins = vec!["http://localhost:3001".to_string()];
        assert!(origin_allowed(&origins, "http://localhost:3001"));
        assert!(!origin_allowed(&origins, "http://evil.example"));
    }

    #[test]
    fn only_the_two_rate_limited_routes_are_gated() {
        assert!(is_rate_limited_route(&Method::POST, "/api/voice/turn"));
        assert!(is_rate_limited_route(&Method::POST, "/api/settings"));
        assert!(!is_rate_limited_route(&Method::GET, "/api/settings"));
        assert!(!is_rate_limited_route(&Method::GET, "/readyz"));
    }
}
