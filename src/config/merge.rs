//! Patch application: top-level scalars overwrite, nested groups
//! shallow-merge (sibling fields inside an untouched group are preserved).

use super::{CustomHttpConfig, GatewayConfig, OpenAiConfig, ResponseMapping, ServerSection, WhisperXConfig};
use super::patch::ConfigPatch;

pub fn apply(current: &GatewayConfig, patch: &ConfigPatch) -> GatewayConfig {
    let mut next = current.clone();

    if let Some(v) = &patch.openclaw_gateway_url {
        next.openclaw_gateway_url = v.clone();
    }
    if let Some(v) = &patch.openclaw_gateway_token {
        next.openclaw_gateway_token = v.clone();
    }
    if let Some(v) = &patch.openclaw_session_key {
        next.openclaw_session_key = v.clone();
    }
    if let Some(v) = patch.stt_provider {
        next.stt_provider = v;
    }

    if let Some(p) = &patch.whisperx {
        next.whisperx = WhisperXConfig {
            base_url: p.base_url.clone().unwrap_or(current.whisperx.base_url.clone()),
            model: p.model.clone().unwrap_or(current.whisperx.model.clone()),
            language: p.language.clone().or(current.whisperx.language.clone()),
            poll_interval_ms: p.poll_interval_ms.unwrap_or(current.whisperx.poll_interval_ms),
            timeout_ms: p.timeout_ms.unwrap_or(current.whisperx.timeout_ms),
        };
    }

    if let Some(p) = &patch.openai {
        next.openai = OpenAiConfig {
            api_key: p.api_key.clone().unwrap_or(current.openai.api_key.clone()),
            model: p.model.clone().unwrap_or(current.openai.model.clone()),
            language: p.language.clone().or(current.openai.language.clone()),
        };
    }

    if let Some(p) = &patch.custom_http {
        let response_mapping = if let Some(m) = &p.response_mapping {
            ResponseMapping {
                text_field: m
                    .text_field
                    .clone()
                    .unwrap_or(current.custom_http.response_mapping.text_field.clone()),
                language_field: m
                    .language_field
                    .clone()
                    .or(current.custom_http.response_mapping.language_field.clone()),
                confidence_field: m
                    .confidence_field
                    .clone()
                    .or(current.custom_http.response_mapping.confidence_field.clone()),
            }
        } else {
            current.custom_http.response_mapping.clone()
        };
        next.custom_http = CustomHttpConfig {
            url: p.url.clone().unwrap_or(current.custom_http.url.clone()),
            auth_header: p.auth_header.clone().unwrap_or(current.custom_http.auth_header.clone()),
            response_mapping,
        };
    }

    if let Some(p) = &patch.server {
        next.server = ServerSection {
            port: p.port.unwrap_or(current.server.port),
            host: p.host.clone().unwrap_or(current.server.host.clone()),
            cors_origins: p.cors_origins.clone().unwrap_or(current.server.cors_origins.clone()),
            max_audio_bytes: p.max_audio_bytes.unwrap_or(current.server.max_audio_bytes),
            rate_limit_per_minute: p.rate_limit_per_minute.unwrap_or(current.server.rate_limit_per_minute),
        };
    }

    next
}
