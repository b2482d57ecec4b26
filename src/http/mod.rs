//! The HTTP plane: route table, middleware chain, and the app state
//! every handler and middleware function shares. Router assembly follows
//! the usual `axum` merge-then-layer pattern:
//! `Router::new().route(...).layer(...)`.

mod handlers;
mod middleware;
mod rate_limit;
mod state;

pub use rate_limit::RateLimiter;
pub use state::AppState;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the complete router. `.layer()` calls wrap inside-out, so the
/// order here (rate limiter nearest the routes, then CORS, then readiness,
/// then tracing outermost) executes as readiness → CORS → rate limiter →
/// handler on every incoming request.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/voice/turn", post(handlers::voice_turn))
        .route(
            "/api/settings",
            get(handlers::get_settings).post(handlers::post_settings),
        )
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit_gate,
        ))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::cors_gate))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::readiness_gate,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
