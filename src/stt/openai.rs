//! Synchronous STT provider (OpenAI Whisper REST API). One round trip per
//! request; upstream status codes map onto this crate's closed `SttError`
//! set.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::OpenAiConfig;
use crate::domain::{AudioPayload, Confidence, ProviderId, SttError, SttResult};

use super::{HealthStatus, SttProvider, TranscribeContext};

const MAX_UPSTREAM_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
    language: Option<String>,
}

pub struct OpenAiSTT {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiSTT {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl SttProvider for OpenAiSTT {
    async fn transcribe(&self, audio: AudioPayload, ctx: TranscribeContext) -> Result<SttResult, SttError> {
        if audio.len() > MAX_UPSTREAM_BYTES {
            return Err(SttError::AudioInvalid(format!(
                "audio payload of {} bytes exceeds provider limit of {MAX_UPSTREAM_BYTES}",
                audio.len()
            )));
        }

        let started = Instant::now();

        let file_name = format!("audio.{}", extension_for(&audio.content_type.to_string()));
        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.bytes.to_vec())
                    .file_name(file_name)
                    .mime_str(&audio.content_type.to_string())
                    .map_err(|e| SttError::Unknown(e.to_string()))?,
            )
            .text("model", self.config.model.clone());

        if let Some(lang) = ctx.language_hint.as_deref().or(self.config.language.as_deref()) {
            form = form.text("language", lang.to_string());
        }

        let response = tokio::select! {
            result = self
                .client
                .post("https://api.openai.com/v1/audio/transcriptions")
                .bearer_auth(&self.config.api_key)
                .multipart(form)
                .send() => result.map_err(map_transport_error)?,
            _ = ctx.cancel.cancelled() => return Err(SttError::Timeout),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(map_status_error(status));
        }

        let parsed: TranscriptionResponse = response.json().await.map_err(|e| SttError::Unknown(e.to_string()))?;

        if parsed.text.trim().is_empty() {
            return Err(SttError::AudioInvalid("provider returned empty transcript".to_string()));
        }

        Ok(SttResult {
            text: parsed.text,
            language: parsed.language,
            confidence: Confidence::new(1.0),
            provider_id: ProviderId::OpenAI,
            model: Some(self.config.model.clone()),
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn health_check(&self) -> HealthStatus {
        let started = Instant::now();
        if self.config.api_key.is_empty() {
            return HealthStatus {
                healthy: false,
                message: "no API key configured".to_string(),
                latency_ms: 0,
            };
        }

        let result = self
            .client
            .get("https://api.openai.com/v1/models")
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_secs(3))
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => HealthStatus {
                healthy: true,
                message: "ok".to_string(),
                latency_ms: started.elapsed().as_millis() as u64,
            },
            Ok(resp) => HealthStatus {
                healthy: false,
                message: format!("unhealthy status {}", resp.status()),
                latency_ms: started.elapsed().as_millis() as u64,
            },
            Err(e) => HealthStatus {
                healthy: false,
                message: e.to_string(),
                latency_ms: started.elapsed().as_millis() as u64,
            },
        }
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/pcm" => "pcm",
        "audio/ogg" => "ogg",
        "audio/mpeg" => "mp3",
        "audio/webm" => "webm",
        _ => "bin",
    }
}

fn map_transport_error(e: reqwest::Error) -> SttError {
    if e.is_timeout() {
        SttError::Timeout
    } else if e.is_connect() {
        SttError::Unavailable(e.to_string())
    } else {
        SttError::Unknown(e.to_string())
    }
}

fn map_status_error(status: reqwest::StatusCode) -> SttError {
    match status.as_u16() {
        401 | 403 => SttError::Auth,
        429 => SttError::RateLimited,
        500..=599 => SttError::Unavailable(format!("upstream status {status}")),
        _ => SttError::Unknown(format!("upstream status {status}")),
    }
}
