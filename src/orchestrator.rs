//! The turn orchestrator: the per-request sequencer that selects a
//! provider, transcribes, forwards the transcript to the agent session,
//! shapes the reply, and assembles the timed envelope. A fixed three-step
//! pipeline; there is no branching to express.

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::agent::SessionClient;
use crate::domain::{AssistantReply, AudioPayload, ProviderId, ReplyEnvelope, ReplyMeta, SessionKey, Timing, TurnId};
use crate::errors::{OperatorError, TurnError};
use crate::shaper::{self, ShapeOptions};
use crate::stt::{SttProvider, TranscribeContext};

/// Keyed by `ProviderId` so a rebuild only ever replaces one key; readers
/// hold onto whatever `Arc<dyn SttProvider>` they already fetched even if
/// the map is rebuilt mid-turn.
pub type ProviderMap = DashMap<ProviderId, Arc<dyn SttProvider>>;

/// The dependency bundle a turn needs, borrowed for the duration of exactly
/// one `run` call. `providers` and `session_client` are shared with every
/// other in-flight turn and with the rebuilders; neither is owned by
/// the orchestrator.
pub struct Orchestrator {
    providers: Arc<ProviderMap>,
    session_client: Arc<ArcSwap<SessionClient>>,
    shape_opts: ShapeOptions,
}

impl Orchestrator {
    pub fn new(providers: Arc<ProviderMap>, session_client: Arc<ArcSwap<SessionClient>>) -> Self {
        Self {
            providers,
            session_client,
            shape_opts: ShapeOptions::default(),
        }
    }

    /// Sequence one turn: select provider by id, transcribe, send the
    /// transcript to the agent, shape the response, and assemble the reply
    /// envelope with per-step timing. Steps run strictly in order;
    /// at most one in-flight provider call and one in-flight agent send per
    /// turn. Dropping the enclosing future (e.g. the caller's HTTP
    /// connection closing) cancels whichever step is in flight.
    pub async fn run(
        &self,
        turn_id: TurnId,
        session_key: SessionKey,
        active_provider: ProviderId,
        audio: AudioPayload,
        cancel: CancellationToken,
    ) -> Result<ReplyEnvelope, TurnError> {
        let total_start = Instant::now();

        let provider = self
            .providers
            .get(&active_provider)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                OperatorError::MissingConfig(format!("no STT provider configured for '{active_provider}'"))
            })?;

        tracing::info!(provider = %active_provider, "orchestrator: transcribe start");
        let stt_start = Instant::now();
        let ctx = TranscribeContext {
            turn_id: turn_id.clone(),
            language_hint: audio.language_hint.clone(),
            cancel: cancel.clone(),
        };
        let stt_result = provider.transcribe(audio, ctx).await?;
        let stt_ms = stt_start.elapsed().as_millis() as u64;
        tracing::info!(stt_ms, "orchestrator: transcribe done");

        tracing::info!("orchestrator: agent send start");
        let agent_start = Instant::now();
        let session_client = self.session_client.load_full();
        let agent_response = session_client
            .send_transcript(session_key.as_str(), &stt_result.text, cancel)
            .await?;
        let agent_ms = agent_start.elapsed().as_millis() as u64;
        tracing::info!(agent_ms, "orchestrator: agent send done");

        let shaped = shaper::shape(&agent_response.text, self.shape_opts);
        let total_ms = total_start.elapsed().as_millis() as u64;

        Ok(ReplyEnvelope {
            turn_id,
            session_key,
            assistant: AssistantReply {
                full_text: agent_response.text,
                segments: shaped.segments,
                truncated: shaped.truncated,
            },
            timing: Timing {
                stt_ms,
                agent_ms,
                total_ms,
            },
            meta: ReplyMeta {
                provider: stt_result.provider_id,
                model: stt_result.model,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::SessionClientConfig;
    use crate::domain::ContentType;
    use crate::stt::HealthStatus;
    use async_trait::async_trait;

    struct StubProvider {
        text: &'static str,
    }

    #[async_trait]
    impl SttProvider for StubProvider {
        async fn transcribe(
            &self,
            _audio: AudioPayload,
            _ctx: TranscribeContext,
        ) -> Result<crate::domain::SttResult, crate::domain::SttError> {
            Ok(crate::domain::SttResult {
                text: self.text.to_string(),
                language: Some("en".to_string()),
                confidence: None,
                provider_id: ProviderId::WhisperX,
                model: None,
                duration_ms: 5,
            })
        }

        async fn health_check(&self) -> HealthStatus {
            HealthStatus {
                healthy: true,
                message: "ok".to_string(),
                latency_ms: 0,
            }
        }
    }

    fn audio() -> AudioPayload {
        AudioPayload {
            bytes: bytes::Bytes::from_static(b"fake-wav-audio-data"),
            content_type: ContentType::Wav,
            language_hint: None,
        }
    }

    #[tokio::test]
    async fn missing_active_provider_is_an_operator_error() {
        let providers: Arc<ProviderMap> = Arc::new(ProviderMap::new());
        let session_client = Arc::new(ArcSwap::from_pointee(SessionClient::new(SessionClientConfig::new(
            "ws://localhost:1",
            None,
        ))));
        let orchestrator = Orchestrator::new(providers, session_client);

        let result = orchestrator
            .run(
                TurnId::new(),
                SessionKey::new("default"),
                ProviderId::WhisperX,
                audio(),
                CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(TurnError::Operator(OperatorError::MissingConfig(_)))));
    }

    #[tokio::test]
    async fn a_provider_that_cannot_reach_the_session_client_fails_the_turn() {
        let providers: Arc<ProviderMap> = Arc::new(ProviderMap::new());
        providers.insert(ProviderId::WhisperX, Arc::new(StubProvider { text: "hello" }));
        // Unreachable dial target: the agent send fails, proving transcribe
        // ran (no provider error returned) before the agent step is reached.
        let session_client = Arc::new(ArcSwap::from_pointee(SessionClient::new(SessionClientConfig::new(
            "ws://127.0.0.1:1",
            None,
        ))));
        let orchestrator = Orchestrator::new(providers, session_client);

        let result = orchestrator
            .run(
                TurnId::new(),
                SessionKey::new("default"),
                ProviderId::WhisperX,
                audio(),
                CancellationToken::new(),
            )
            .await;

        assert!(result.is_err());
    }
}
