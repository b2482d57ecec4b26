//! Errors internal to the agent session client, mirroring the closed shape
//! of `crate::domain::SttError` so the HTTP boundary (`errors::TurnError`)
//! maps both adapters' failures the same way.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    #[error("agent session timed out")]
    Timeout,
    #[error("agent session unavailable: {0}")]
    Unavailable(String),
    #[error("agent session error: {0}")]
    SessionError(String),
    /// Credentials rejected by the gateway. Terminal: never retried.
    #[error("agent gateway rejected credentials")]
    Auth,
    /// Malformed client configuration (e.g. an unparsable URL). Terminal.
    #[error("agent session misconfigured: {0}")]
    Config(String),
}

impl SessionError {
    /// Transient failures are eligible for the dial/retry backoff loop;
    /// terminal failures (auth, config) are returned immediately.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionError::Auth | SessionError::Config(_))
    }
}
