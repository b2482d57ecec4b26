use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::ProviderId;

/// Confidence score in `[0, 1]`, or absent when a provider does not report
/// one. Validated at construction so downstream code never has to re-check
/// the bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(f32);

impl Confidence {
    pub fn new(value: f32) -> Option<Self> {
        if (0.0..=1.0).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

/// Normalized transcription output. Every provider must produce this exact
/// shape regardless of its native wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttResult {
    pub text: String,
    pub language: Option<String>,
    pub confidence: Option<Confidence>,
    pub provider_id: ProviderId,
    pub model: Option<String>,
    pub duration_ms: u64,
}

/// Closed set of STT failure classes. Adapters map every native transport
/// failure into one of these; the orchestrator never sees a provider-native
/// error shape.
#[derive(Debug, Clone, Error)]
pub enum SttError {
    #[error("speech-to-text request timed out")]
    Timeout,
    #[error("speech-to-text provider unavailable: {0}")]
    Unavailable(String),
    #[error("audio payload invalid: {0}")]
    AudioInvalid(String),
    #[error("speech-to-text provider rate limited the request")]
    RateLimited,
    #[error("speech-to-text provider rejected credentials")]
    Auth,
    #[error("unexpected speech-to-text failure: {0}")]
    Unknown(String),
}
