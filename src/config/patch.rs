//! The validated-patch shape. Instances are produced only by
//! `validate_settings_patch`; handlers never see raw JSON input applied
//! directly to a `GatewayConfig`.

use crate::domain::{ProviderId, SessionKey};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhisperXPatch {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenAiPatch {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMappingPatch {
    pub text_field: Option<String>,
    pub language_field: Option<String>,
    pub confidence_field: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomHttpPatch {
    pub url: Option<String>,
    pub auth_header: Option<String>,
    pub response_mapping: Option<ResponseMappingPatch>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerPatch {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub cors_origins: Option<Vec<String>>,
    pub max_audio_bytes: Option<usize>,
    pub rate_limit_per_minute: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigPatch {
    pub openclaw_gateway_url: Option<String>,
    pub openclaw_gateway_token: Option<String>,
    pub openclaw_session_key: Option<SessionKey>,
    pub stt_provider: Option<ProviderId>,
    pub whisperx: Option<WhisperXPatch>,
    pub openai: Option<OpenAiPatch>,
    pub custom_http: Option<CustomHttpPatch>,
    pub server: Option<ServerPatch>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        self == &ConfigPatch::default()
    }

    /// Whether this patch touches any field that should trigger the STT
    /// rebuilder.
    pub fn touches_stt(&self) -> bool {
        self.whisperx.is_some() || self.openai.is_some() || self.custom_http.is_some() || self.stt_provider.is_some()
    }

    /// Whether this patch touches any field that should trigger the
    /// session-client rebuilder.
    pub fn touches_session_client(&self) -> bool {
        self.openclaw_gateway_url.is_some() || self.openclaw_gateway_token.is_some()
    }
}
