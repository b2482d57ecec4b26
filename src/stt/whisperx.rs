//! Async-poll STT provider (WhisperX). Submits audio as a multipart form
//! (`reqwest::multipart::Form`/`Part`), extracts an opaque task id, then
//! polls a status endpoint until a terminal state or the overall deadline.
//! Each poll wait races the sleep against a cancellation signal via
//! `tokio::select!`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::WhisperXConfig;
use crate::domain::{AudioPayload, SttError, SttResult};

use super::{clamp_poll_interval_ms, HealthStatus, SttProvider, TranscribeContext};

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    text: Option<String>,
    language: Option<String>,
    confidence: Option<f32>,
}

const TERMINAL_COMPLETED: &str = "COMPLETED";
const TERMINAL_FAILED: &str = "FAILED";

pub struct WhisperXSTT {
    client: reqwest::Client,
    config: WhisperXConfig,
}

impl WhisperXSTT {
    pub fn new(config: WhisperXConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn submit(&self, audio: &AudioPayload, language_hint: Option<&str>) -> Result<String, SttError> {
        let mut form = reqwest::multipart::Form::new()
            .part(
                "audio",
                reqwest::multipart::Part::bytes(audio.bytes.to_vec())
                    .mime_str(&audio.content_type.to_string())
                    .map_err(|e| SttError::Unknown(e.to_string()))?,
            )
            .text("model", self.config.model.clone());

        if let Some(lang) = language_hint.or(self.config.language.as_deref()) {
            form = form.text("language", lang.to_string());
        }

        let response = self
            .client
            .post(format!("{}/transcribe", self.config.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(map_status_error(response.status()));
        }

        let parsed: SubmitResponse = response.json().await.map_err(|e| SttError::Unknown(e.to_string()))?;
        Ok(parsed.task_id)
    }

    async fn poll_once(&self, task_id: &str) -> Result<StatusResponse, SttError> {
        let response = self
            .client
            .get(format!("{}/tasks/{task_id}", self.config.base_url))
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(map_status_error(response.status()));
        }

        response.json().await.map_err(|e| SttError::Unknown(e.to_string()))
    }
}

#[async_trait]
impl SttProvider for WhisperXSTT {
    async fn transcribe(&self, audio: AudioPayload, ctx: TranscribeContext) -> Result<SttResult, SttError> {
        let started = Instant::now();
        let deadline = Duration::from_millis(self.config.timeout_ms);
        let poll_interval = Duration::from_millis(clamp_poll_interval_ms(self.config.poll_interval_ms));

        let task_id = tokio::select! {
            result = self.submit(&audio, ctx.language_hint.as_deref()) => result?,
            _ = ctx.cancel.cancelled() => return Err(SttError::Timeout),
        };

        loop {
            if started.elapsed() >= deadline {
                return Err(SttError::Timeout);
            }

            let status = tokio::select! {
                result = self.poll_once(&task_id) => result?,
                _ = ctx.cancel.cancelled() => return Err(SttError::Timeout),
            };

            match status.status.as_str() {
                TERMINAL_COMPLETED => {
                    let text = status.text.unwrap_or_default();
                    if text.is_empty() {
                        return Err(SttError::AudioInvalid("provider returned empty transcript".to_string()));
                    }
                    return Ok(SttResult {
                        text,
                        language: status.language,
                        confidence: status.confidence.and_then(crate::domain::Confidence::new),
                        provider_id: crate::domain::ProviderId::WhisperX,
                        model: Some(self.config.model.clone()),
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                }
                TERMINAL_FAILED => return Err(SttError::Unavailable("whisperx task failed".to_string())),
                _ => {
                    let remaining = deadline.saturating_sub(started.elapsed());
                    let wait = poll_interval.min(remaining.max(Duration::from_millis(1)));
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = ctx.cancel.cancelled() => return Err(SttError::Timeout),
                    }
                }
            }
        }
    }

    async fn health_check(&self) -> HealthStatus {
        let started = Instant::now();
        let result = self
            .client
            .get(format!("{}/health", self.config.base_url))
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
