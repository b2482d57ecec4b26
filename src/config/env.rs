//! Boot-time configuration from environment variables. Priority is simply
//! "env var present, else default" — there is no file-based config layer;
//! environment variables are the only boot source.

use std::env;

use crate::domain::{ProviderId, SessionKey};
use crate::errors::OperatorError;

use super::{CustomHttpConfig, GatewayConfig, OpenAiConfig, ResponseMapping, ServerSection, WhisperXConfig};

fn parse_u16(name: &str, default: u16) -> Result<u16, OperatorError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u16>()
            .map_err(|_| OperatorError::InvalidConfig(format!("{name} must be a positive integer, got '{raw}'"))),
        Err(_) => Ok(default),
    }
}

fn parse_u32(name: &str, default: u32) -> Result<u32, OperatorError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u32>()
            .map_err(|_| OperatorError::InvalidConfig(format!("{name} must be a positive integer, got '{raw}'"))),
        Err(_) => Ok(default),
    }
}

fn parse_u64(name: &str, default: u64) -> Result<u64, OperatorError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|_| OperatorError::InvalidConfig(format!("{name} must be a positive integer, got '{raw}'"))),
        Err(_) => Ok(default),
    }
}

fn parse_usize(name: &str, default: usize) -> Result<usize, OperatorError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<usize>()
            .map_err(|_| OperatorError::InvalidConfig(format!("{name} must be a positive integer, got '{raw}'"))),
        Err(_) => Ok(default),
    }
}

fn string_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn optional_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.is_empty())
}

pub fn load() -> Result<GatewayConfig, OperatorError> {
    let defaults = GatewayConfig::default();

    let stt_provider_raw = string_or("STT_PROVIDER", "whisperx");
    let stt_provider = ProviderId::parse(&stt_provider_raw)
        .ok_or_else(|| OperatorError::InvalidConfig(format!("unknown STT_PROVIDER '{stt_provider_raw}'")))?;

    let cors_origins = env::var("CORS_ORIGINS")
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Ok(GatewayConfig {
        openclaw_gateway_url: string_or("OPENCLAW_GATEWAY_URL", &defaults.openclaw_gateway_url),
        openclaw_gateway_token: string_or("OPENCLAW_GATEWAY_TOKEN", ""),
        openclaw_session_key: SessionKey::new(string_or(
            "OPENCLAW_SESSION_KEY",
            defaults.openclaw_session_key.as_str(),
        )),
        stt_provider,
        whisperx: WhisperXConfig {
            base_url: string_or("WHISPERX_BASE_URL", &defaults.whisperx.base_url),
            model: string_or("WHISPERX_MODEL", &defaults.whisperx.model),
            language: optional_string("WHISPERX_LANGUAGE"),
            poll_interval_ms: parse_u64("WHISPERX_POLL_INTERVAL_MS", defaults.whisperx.poll_interval_ms)?,
            timeout_ms: parse_u64("WHISPERX_TIMEOUT_MS", defaults.whisperx.timeout_ms)?,
        },
        openai: OpenAiConfig {
            api_key: string_or("OPENAI_API_KEY", ""),
            model: string_or("OPENAI_STT_MODEL", &defaults.openai.model),
            language: optional_string("OPENAI_STT_LANGUAGE"),
        },
        custom_http: CustomHttpConfig {
            url: string_or("CUSTOM_STT_URL", ""),
            auth_header: string_or("CUSTOM_STT_AUTH", ""),
            response_mapping: ResponseMapping {
                text_field: string_or("CUSTOM_STT_TEXT_FIELD", "text"),
                language_field: optional_string("CUSTOM_STT_LANGUAGE_FIELD"),
                confidence_field: optional_string("CUSTOM_STT_CONFIDENCE_FIELD"),
            },
        },
        server: ServerSection {
            port: parse_u16("PORT", defaults.server.port)?,
            host: string_or("HOST", &defaults.server.host),
            cors_origins,
            max_audio_bytes: parse_usize("MAX_AUDIO_BYTES", defaults.server.max_audio_bytes)?,
            rate_limit_per_minute: parse_u32("RATE_LIMIT_PER_MINUTE", defaults.server.rate_limit_per_minute)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "STT_PROVIDER",
            "PORT",
            "MAX_AUDIO_BYTES",
            "RATE_LIMIT_PER_MINUTE",
            "CORS_ORIGINS",
        ] {
            unsafe { env::remove_var(key) };
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_when_unset() {
        clear_env();
        let cfg = load().expect("defaults should load cleanly");
        assert_eq!(cfg.stt_provider, ProviderId::WhisperX);
        assert_eq!(cfg.server.port, 4400);
    }

    #[test]
    #[serial]
    fn non_numeric_port_is_a_boot_error() {
        clear_env();
        unsafe { env::set_var("PORT", "not-a-number") };
        let result = load();
        assert!(result.is_err());
        unsafe { env::remove_var("PORT") };
    }

    #[test]
    #[serial]
    fn unknown_stt_provider_is_a_boot_error() {
        clear_env();
        unsafe { env::set_var("STT_PROVIDER", "bogus") };
        assert!(load().is_err());
        unsafe { env::remove_var("STT_PROVIDER") };
    }

    #[test]
    #[serial]
    fn cors_origins_split_on_comma() {
        clear_env();
        unsafe { env::set_var("CORS_ORIGINS", "https://a.example, https://b.example") };
        let cfg = load().unwrap();
        assert_eq!(cfg.server.cors_origins, vec!["https://a.example", "https://b.example"]);
        unsafe { env::remove_var("CORS_ORIGINS") };
    }
}
