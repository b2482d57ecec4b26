//! Route handlers. Each handler reads whatever it needs from `AppState` as
//! a fresh snapshot and never holds the config store's internal lock;
//! per-route body-size enforcement happens here via
//! `axum::body::to_bytes(body, limit)`, whose documented behavior (success
//! at exactly `limit` bytes, error past it) matches the size boundary
//! without any extra arithmetic.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::domain::AudioPayload;
use crate::errors::UserError;
use crate::logging::TurnContext;
use crate::validation::{validate_audio_size, validate_content_type};

use super::state::AppState;

const SETTINGS_BODY_LIMIT: usize = 64 * 1024;

pub async fn voice_turn(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Body) -> Response {
    let Some(content_type_raw) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return UserError::invalid_content_type("missing Content-Type header").into_response();
    };
    let content_type = match validate_content_type(content_type_raw) {
        Ok(ct) => ct,
        Err(e) => return e.into_response(),
    };

    let config = state.config.get();
    let max_audio_bytes = config.server.max_audio_bytes;
    let bytes = match axum::body::to_bytes(body, max_audio_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return UserError::audio_too_large(format!(
                "audio payload exceeds the {max_audio_bytes}-byte limit"
            ))
            .into_response()
        }
    };

    if let Err(e) = validate_audio_size(bytes.len(), max_audio_bytes) {
        return e.into_response();
    }

    let language_hint = headers
        .get("x-language-hint")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let turn_id = crate::domain::TurnId::new();
    let session_key = config.openclaw_session_key.clone();
    let turn_context = TurnContext::new(&turn_id, &session_key);
    let _entered = turn_context.enter();

    let audio = AudioPayload {
        bytes,
        content_type,
        language_hint,
    };

    let result = state
        .orchestrator
        .run(turn_id, session_key, config.stt_provider, audio, CancellationToken::new())
        .await;

    match result {
        Ok(envelope) => Json(envelope).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_settings(State(state): State<Arc<AppState>>) -> Response {
    Json(state.config.get_safe()).into_response()
}

pub async fn post_settings(State(state): State<Arc<AppState>>, body: Body) -> Response {
    let bytes = match axum::body::to_bytes(body, SETTINGS_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return UserError::invalid_config(format!(
                "settings patch exceeds the {SETTINGS_BODY_LIMIT}-byte limit"
            ))
            .into_response()
        }
    };

    let raw: Value = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => return UserError::invalid_config(format!("malformed JSON body: {e}")).into_response(),
    };

    let patch = match crate::config::validate_settings_patch(&raw) {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };

    let updated = state.config.update(patch);
    Json(updated.to_safe()).into_response()
}

#[derive(Serialize)]
struct HealthzBody {
    status: &'static str,
    timestamp: u64,
}

fn unix_epoch_seconds() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub async fn healthz() -> Response {
    Json(HealthzBody {
        status: "ok",
        timestamp: unix_epoch_seconds(),
    })
    .into_response()
}

#[derive(Serialize)]
struct ReadyzChecks {
    stt: bool,
    openclaw: bool,
}

#[derive(Serialize)]
struct ReadyzBody {
    status: &'static str,
    checks: ReadyzChecks,
}

pub async fn readyz(State(state): State<Arc<AppState>>) -> Response {
    let readiness_open = state.readiness.load(Ordering::Relaxed);
    let config = state.config.get();

    let stt_healthy = match state.providers.get(&config.stt_provider) {
        Some(provider) => provider.value().health_check().await.healthy,
        None => false,
    };
    let openclaw_healthy = state.session_client.load().is_healthy();

    let ready = readiness_open && stt_healthy && openclaw_healthy;
    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(ReadyzBody {
            status: if ready { "ready" } else { "not_ready" },
            checks: ReadyzChecks {
                stt: stt_healthy,
                openclaw: openclaw_healthy,
            },
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthz_always_reports_ok() {
        let response = healthz().await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
