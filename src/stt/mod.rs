//! The STT provider contract and its three concrete adapters: a closed
//! trait with a `transcribe`/`health_check` pair, implemented by an
//! async-poll adapter (multipart submit + poll loop), a synchronous
//! single-round-trip adapter, and a generic field-mapped HTTP adapter.

mod custom_http;
mod openai;
mod whisperx;

pub use custom_http::CustomHttpSTT;
pub use openai::OpenAiSTT;
pub use whisperx::WhisperXSTT;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{AudioPayload, SttError, SttResult, TurnId};

/// Context threaded through a single `Transcribe` call.
pub struct TranscribeContext {
    pub turn_id: TurnId,
    pub language_hint: Option<String>,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: String,
    pub latency_ms: u64,
}

/// The full STT provider contract. Every adapter owns its own
/// transport, polling, and result normalization; the orchestrator only ever
/// sees this trait.
#[async_trait]
pub trait SttProvider: Send + Sync {
    async fn transcribe(&self, audio: AudioPayload, ctx: TranscribeContext) -> Result<SttResult, SttError>;

    async fn health_check(&self) -> HealthStatus;
}

/// Clamp a configured poll interval so cadence never exceeds 1 Hz,
/// regardless of what the operator configured.
pub fn clamp_poll_interval_ms(configured_ms: u64) -> u64 {
    configured_ms.max(1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_interval_is_clamped_to_at_least_1hz() {
        assert_eq!(clamp_poll_interval_ms(100), 1000);
        assert_eq!(clamp_poll_interval_ms(1500), 1500);
        assert_eq!(clamp_poll_interval_ms(0), 1000);
    }
}
