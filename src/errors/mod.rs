//! Two-class error taxonomy: `UserError` (safe, end-user-facing, 4xx) and
//! `OperatorError` (internal diagnostic, 5xx with a generic public message).
//! One `thiserror` enum per class, each variant closed over a code, each
//! with its own `IntoResponse` impl.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    error: String,
}

/// Safe, end-user-facing errors. Every message here is assumed fit to
/// return verbatim in an HTTP response body.
#[derive(Debug, Clone, Error)]
pub enum UserError {
    #[error("{0}")]
    InvalidContentType(String),
    #[error("{0}")]
    InvalidAudio(String),
    #[error("{0}")]
    AudioTooLarge(String),
    #[error("{0}")]
    InvalidConfig(String),
    #[error("cross-origin request rejected")]
    CorsRejected,
    #[error("Too many requests. Please wait.")]
    RateLimited,
    #[error("service is not ready")]
    NotReady,
    #[error("agent did not respond in time")]
    OpenclawTimeout,
    #[error("agent session error: {0}")]
    OpenclawSessionError(String),
}

impl UserError {
    pub fn invalid_content_type(msg: impl Into<String>) -> Self {
        Self::InvalidContentType(msg.into())
    }
    pub fn invalid_audio(msg: impl Into<String>) -> Self {
        Self::InvalidAudio(msg.into())
    }
    pub fn audio_too_large(msg: impl Into<String>) -> Self {
        Self::AudioTooLarge(msg.into())
    }
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            UserError::InvalidContentType(_) => "INVALID_CONTENT_TYPE",
            UserError::InvalidAudio(_) => "INVALID_AUDIO",
            UserError::AudioTooLarge(_) => "AUDIO_TOO_LARGE",
            UserError::InvalidConfig(_) => "INVALID_CONFIG",
            UserError::CorsRejected => "CORS_REJECTED",
            UserError::RateLimited => "RATE_LIMITED",
            UserError::NotReady => "NOT_READY",
            UserError::OpenclawTimeout => "OPENCLAW_TIMEOUT",
            UserError::OpenclawSessionError(_) => "OPENCLAW_SESSION_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            UserError::CorsRejected => StatusCode::FORBIDDEN,
            UserError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            UserError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            code: self.code(),
            error: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}

/// Internal diagnostic errors. The public message is always generic; full
/// detail is logged by the caller before this is converted into a response.
#[derive(Debug, Clone, Error)]
pub enum OperatorError {
    #[error("required configuration is missing: {0}")]
    MissingConfig(String),
    #[error("invalid configuration at boot: {0}")]
    InvalidConfig(String),
    #[error("agent gateway unavailable: {0}")]
    OpenclawUnavailable(String),
    #[error("speech-to-text backend unavailable: {0}")]
    SttUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl OperatorError {
    pub fn code(&self) -> &'static str {
        match self {
            OperatorError::MissingConfig(_) => "MISSING_CONFIG",
            OperatorError::InvalidConfig(_) => "INVALID_CONFIG",
            OperatorError::OpenclawUnavailable(_) => "OPENCLAW_UNAVAILABLE",
            OperatorError::SttUnavailable(_) => "STT_UNAVAILABLE",
            OperatorError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for OperatorError {
    fn into_response(self) -> Response {
        tracing::error!(code = self.code(), detail = %self, "operator error");
        let status = match self {
            OperatorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        };
        let body = ErrorBody {
            code: self.code(),
            error: "an internal error occurred".to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}

/// Everything a turn can fail with, on its way to the HTTP boundary.
#[derive(Debug, Clone, Error)]
pub enum TurnError {
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Operator(#[from] OperatorError),
}

impl IntoResponse for TurnError {
    fn into_response(self) -> Response {
        match self {
            TurnError::User(e) => e.into_response(),
            TurnError::Operator(e) => e.into_response(),
        }
    }
}

impl From<crate::domain::SttError> for TurnError {
    fn from(e: crate::domain::SttError) -> Self {
        use crate::domain::SttError as S;
        match e {
            S::Timeout => TurnError::Operator(OperatorError::SttUnavailable("stt request timed out".to_string())),
            S::Unavailable(msg) => TurnError::Operator(OperatorError::SttUnavailable(msg)),
            S::AudioInvalid(msg) => TurnError::User(UserError::invalid_audio(msg)),
            S::RateLimited => TurnError::User(UserError::RateLimited),
            S::Auth => TurnError::Operator(OperatorError::SttUnavailable(
                "provider rejected credentials".to_string(),
            )),
            S::Unknown(msg) => TurnError::Operator(OperatorError::SttUnavailable(msg)),
        }
    }
}

impl From<crate::agent::SessionError> for TurnError {
    fn from(e: crate::agent::SessionError) -> Self {
        use crate::agent::SessionError as A;
        match e {
            A::Timeout => TurnError::User(UserError::OpenclawTimeout),
            A::Unavailable(msg) => TurnError::Operator(OperatorError::OpenclawUnavailable(msg)),
            A::SessionError(msg) => TurnError::User(UserError::OpenclawSessionError(msg)),
            A::Auth => {
                TurnError::Operator(OperatorError::OpenclawUnavailable("credentials rejected".to_string()))
            }
            A::Config(msg) => TurnError::Operator(OperatorError::OpenclawUnavailable(msg)),
        }
    }
}
