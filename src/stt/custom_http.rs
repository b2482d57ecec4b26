//! Generic HTTP STT provider. POSTs audio to a configured URL with a single
//! auth header, then extracts `text`/`language`/`confidence` from the JSON
//! response by configurable dotted field paths. Field extraction is a
//! small pure helper walking `serde_json::Value` rather than a JSONPath
//! dependency.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{CustomHttpConfig, ResponseMapping};
use crate::domain::{AudioPayload, Confidence, ProviderId, SttError, SttResult};

use super::{HealthStatus, SttProvider, TranscribeContext};

pub struct CustomHttpSTT {
    client: reqwest::Client,
    config: CustomHttpConfig,
}

impl CustomHttpSTT {
    pub fn new(config: CustomHttpConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

/// Resolve a dotted path (`"result.text"`) against a JSON value. A bare
/// field name (`"text"`) resolves against the top level, the common case.
fn extract_field<'a>(value: &'a Value, dotted_path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in dotted_path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

fn extract_string(value: &Value, path: &str) -> Option<String> {
    extract_field(value, path).and_then(|v| v.as_str().map(str::to_string))
}

fn extract_confidence(value: &Value, path: &str) -> Option<Confidence> {
    extract_field(value, path)
        .and_then(|v| v.as_f64())
        .and_then(|v| Confidence::new(v as f32))
}

#[async_trait]
impl SttProvider for CustomHttpSTT {
    async fn transcribe(&self, audio: AudioPayload, ctx: TranscribeContext) -> Result<SttResult, SttError> {
        let started = Instant::now();

        let form = reqwest::multipart::Form::new().part(
            "audio",
            reqwest::multipart::Part::bytes(audio.bytes.to_vec())
                .mime_str(&audio.content_type.to_string())
                .map_err(|e| SttError::Unknown(e.to_string()))?,
        );

        let mut request = self.client.post(&self.config.url).multipart(form);
        if !self.config.auth_header.is_empty() {
            request = request.header("Authorization", self.config.auth_header.clone());
        }

        let response = tokio::select! {
            result = request.send() => result.map_err(map_transport_error)?,
            _ = ctx.cancel.cancelled() => return Err(SttError::Timeout),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(SttError::Unavailable(format!("upstream status {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|_| SttError::Unavailable("unparseable JSON response".to_string()))?;

        let mapping: &ResponseMapping = &self.config.response_mapping;
        let text = extract_string(&body, &mapping.text_field).unwrap_or_default();
        if text.is_empty() {
            return Err(SttError::AudioInvalid("response mapping produced no text".to_string()));
        }

        let language = mapping
            .language_field
            .as_deref()
            .and_then(|path| extract_string(&body, path));
        let confidence = mapping
            .confidence_field
            .as_deref()
            .and_then(|path| extract_confidence(&body, path));

        Ok(SttResult {
            text,
            language,
            confidence,
            provider_id: ProviderId::Custom,
            model: None,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn health_check(&self) -> HealthStatus {
        let started = Instant::now();
        let mut request = self.client.head(&self.config.url).timeout(Duration::from_secs(3));
        if !self.config.auth_header.is_empty() {
            request = request.header("Authorization", self.config.auth_header.clone());
        }

        match request.send().await {
            Ok(resp) if resp.status().is_success() || resp.status().as_u16() == 405 => HealthStatus {
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
    } else {
        SttError::Unavailable(e.to_string())
    }
}
