//! Runtime configuration: the full record (`GatewayConfig`), its masked
//! projection (`SafeGatewayConfig`), environment-variable boot loading, and
//! the in-memory store that drives validated partial updates with listener
//! fanout. `mod.rs` owns the record types; `env`/`validation`/`merge` stay
//! as separate concerns.

mod env;
mod merge;
mod patch;
mod store;
mod validation;

pub use patch::{ConfigPatch, CustomHttpPatch, OpenAiPatch, ResponseMappingPatch, ServerPatch, WhisperXPatch};
pub use store::{ChangeListener, ConfigStore};
pub use validation::validate_settings_patch;

use serde::Serialize;

use crate::domain::{ProviderId, SessionKey};

pub const SECRET_MASK: &str = "********";

#[derive(Debug, Clone, PartialEq)]
pub struct WhisperXConfig {
    pub base_url: String,
    pub model: String,
    pub language: Option<String>,
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for WhisperXConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".to_string(),
            model: "large-v2".to_string(),
            language: None,
            poll_interval_ms: 1000,
            timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub language: Option<String>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "whisper-1".to_string(),
            language: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseMapping {
    pub text_field: String,
    pub language_field: Option<String>,
    pub confidence_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomHttpConfig {
    pub url: String,
    pub auth_header: String,
    pub response_mapping: ResponseMapping,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerSection {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub max_audio_bytes: usize,
    pub rate_limit_per_minute: u32,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: 4400,
            host: "0.0.0.0".to_string(),
            cors_origins: Vec::new(),
            max_audio_bytes: 25 * 1024 * 1024,
            rate_limit_per_minute: 60,
        }
    }
}

/// The full configuration record. Owned exclusively by `ConfigStore`; every
/// other component receives a snapshot (`Arc<GatewayConfig>`), never a
/// reference into the live store.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub openclaw_gateway_url: String,
    pub openclaw_gateway_token: String,
    pub openclaw_session_key: SessionKey,
    pub stt_provider: ProviderId,
    pub whisperx: WhisperXConfig,
    pub openai: OpenAiConfig,
    pub custom_http: CustomHttpConfig,
    pub server: ServerSection,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            openclaw_gateway_url: "ws://localhost:3000".to_string(),
            openclaw_gateway_token: String::new(),
            openclaw_session_key: SessionKey::new("default"),
            stt_provider: ProviderId::WhisperX,
            whisperx: WhisperXConfig::default(),
            openai: OpenAiConfig::default(),
            custom_http: CustomHttpConfig::default(),
            server: ServerSection::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, crate::errors::OperatorError> {
        env::load()
    }

    pub fn to_safe(&self) -> SafeGatewayConfig {
        SafeGatewayConfig {
            openclaw_gateway_url: self.openclaw_gateway_url.clone(),
            openclaw_gateway_token: SECRET_MASK.to_string(),
            openclaw_session_key: self.openclaw_session_key.clone(),
            stt_provider: self.stt_provider,
            whisperx: self.whisperx.clone(),
            openai: SafeOpenAiConfig {
                api_key: SECRET_MASK.to_string(),
                model: self.openai.model.clone(),
                language: self.openai.language.clone(),
            },
            custom_http: SafeCustomHttpConfig {
                url: self.custom_http.url.clone(),
                auth_header: SECRET_MASK.to_string(),
                response_mapping: self.custom_http.response_mapping.clone(),
            },
            server: self.server.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SafeOpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SafeCustomHttpConfig {
    pub url: String,
    pub auth_header: String,
    #[serde(rename = "responseMapping")]
    pub response_mapping: ResponseMapping,
}

impl Serialize for ResponseMapping {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("ResponseMapping", 3)?;
        s.serialize_field("textField", &self.text_field)?;
        s.serialize_field("languageField", &self.language_field)?;
        s.serialize_field("confidenceField", &self.confidence_field)?;
        s.end()
    }
}

impl Serialize for WhisperXConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("WhisperXConfig", 5)?;
        s.serialize_field("baseUrl", &self.base_url)?;
        s.serialize_field("model", &self.model)?;
        s.serialize_field("language", &self.language)?;
        s.serialize_field("pollIntervalMs", &self.poll_interval_ms)?;
        s.serialize_field("timeoutMs", &self.timeout_ms)?;
        s.end()
    }
}

impl Serialize for ServerSection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("ServerSection", 5)?;
        s.serialize_field("port", &self.port)?;
        s.serialize_field("host", &self.host)?;
        s.serialize_field("corsOrigins", &self.cors_origins)?;
        s.serialize_field("maxAudioBytes", &self.max_audio_bytes)?;
        s.serialize_field("rateLimitPerMinute", &self.rate_limit_per_minute)?;
        s.end()
    }
}

/// The masked projection of `GatewayConfig`. No branch of construction can
/// produce an instance carrying an unmasked secret: the three secret fields
/// are mask literals by type, not by convention.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeGatewayConfig {
    pub openclaw_gateway_url: String,
    pub openclaw_gateway_token: String,
    pub openclaw_session_key: SessionKey,
    pub stt_provider: ProviderId,
    pub whisperx: WhisperXConfig,
    pub openai: SafeOpenAiConfig,
    pub custom_http: CustomHttpConfigSafeAlias,
    pub server: ServerSection,
}

// `SafeCustomHttpConfig` already carries the masked shape; alias it under
// the field name serde expects so `to_safe` doesn't need a second type.
pub type CustomHttpConfigSafeAlias = SafeCustomHttpConfig;

/// Zeroize the three secret fields when a `GatewayConfig` is dropped (a
/// superseded snapshot after `ConfigStore::update`, or process exit).
impl Drop for GatewayConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.openclaw_gateway_token.zeroize();
        self.openai.api_key.zeroize();
        self.custom_http.auth_header.zeroize();
    }
}
