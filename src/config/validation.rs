//! `validateSettingsPatch`: the sole path from arbitrary JSON to a
//! `ConfigPatch`. Unknown top-level keys are ignored (forward
//! compatibility); unknown nested keys inside recognized groups are
//! ignored; recognized fields run through the same guards in
//! `crate::validation`, and any guard failure becomes a `UserError`
//! (`INVALID_CONFIG`) so the HTTP layer maps it to 400, never 500.

use serde_json::Value;

use crate::domain::{ProviderId, SessionKey};
use crate::errors::UserError;
use crate::validation::{validate_non_empty, validate_positive_u32, validate_positive_u64, validate_url};

use super::patch::{ConfigPatch, CustomHttpPatch, OpenAiPatch, ResponseMappingPatch, ServerPatch, WhisperXPatch};

fn get_str(obj: &serde_json::Map<String, Value>, key: &str) -> Option<Result<String, UserError>> {
    obj.get(key).map(|v| match v.as_str() {
        Some(s) => Ok(s.to_string()),
        None => Err(UserError::invalid_config(format!("{key} must be a string"))),
    })
}

fn get_u64(obj: &serde_json::Map<String, Value>, key: &str) -> Option<Result<i64, UserError>> {
    obj.get(key).map(|v| match v.as_i64() {
        Some(n) => Ok(n),
        None => Err(UserError::invalid_config(format!("{key} must be an integer"))),
    })
}

pub fn validate_settings_patch(raw: &Value) -> Result<ConfigPatch, UserError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| UserError::invalid_config("settings patch must be a JSON object"))?;

    let mut patch = ConfigPatch::default();

    if let Some(v) = get_str(obj, "openclawGatewayUrl") {
        let url = v?;
        validate_url(&url)?;
        patch.openclaw_gateway_url = Some(url);
    }
    if let Some(v) = get_str(obj, "openclawGatewayToken") {
        patch.openclaw_gateway_token = Some(v?);
    }
    if let Some(v) = get_str(obj, "openclawSessionKey") {
        let key = validate_non_empty(&v?, "openclawSessionKey")?;
        patch.openclaw_session_key = Some(SessionKey::new(key));
    }
    if let Some(v) = get_str(obj, "sttProvider") {
        let raw = v?;
        let provider = ProviderId::parse(&raw)
            .ok_or_else(|| UserError::invalid_config(format!("unknown sttProvider '{raw}'")))?;
        patch.stt_provider = Some(provider);
    }

    if let Some(Value::Object(whisperx)) = obj.get("whisperx") {
        patch.whisperx = Some(validate_whisperx(whisperx)?);
    }
    if let Some(Value::Object(openai)) = obj.get("openai") {
        patch.openai = Some(validate_openai(openai)?);
    }
    if let Some(Value::Object(custom_http)) = obj.get("customHttp") {
        patch.custom_http = Some(validate_custom_http(custom_http)?);
    }
    if let Some(Value::Object(server)) = obj.get("server") {
        patch.server = Some(validate_server(server)?);
    }

    Ok(patch)
}

fn validate_whisperx(obj: &serde_json::Map<String, Value>) -> Result<WhisperXPatch, UserError> {
    let mut p = WhisperXPatch::default();
    if let Some(v) = get_str(obj, "baseUrl") {
        let url = v?;
        validate_url(&url)?;
        p.base_url = Some(url);
    }
    if let Some(v) = get_str(obj, "model") {
        p.model = Some(validate_non_empty(&v?, "whisperx.model")?);
    }
    if let Some(v) = get_str(obj, "language") {
        p.language = Some(v?);
    }
    if let Some(v) = get_u64(obj, "pollIntervalMs") {
        p.poll_interval_ms = Some(validate_positive_u64(v?, "whisperx.pollIntervalMs")?);
    }
    if let Some(v) = get_u64(obj, "timeoutMs") {
        p.timeout_ms = Some(validate_positive_u64(v?, "whisperx.timeoutMs")?);
    }
    Ok(p)
}

fn validate_openai(obj: &serde_json::Map<String, Value>) -> Result<OpenAiPatch, UserError> {
    let mut p = OpenAiPatch::default();
    if let Some(v) = get_str(obj, "apiKey") {
        p.api_key = Some(v?);
    }
    if let Some(v) = get_str(obj, "model") {
        p.model = Some(validate_non_empty(&v?, "openai.model")?);
    }
    if let Some(v) = get_str(obj, "language") {
        p.language = Some(v?);
    }
    Ok(p)
}

fn validate_custom_http(obj: &serde_json::Map<String, Value>) -> Result<CustomHttpPatch, UserError> {
    let mut p = CustomHttpPatch::default();
    if let Some(v) = get_str(obj, "url") {
        let url = v?;
        validate_url(&url)?;
        p.url = Some(url);
    }
    if let Some(v) = get_str(obj, "authHeader") {
        p.auth_header = Some(v?);
    }
    if let Some(Value::Object(mapping)) = obj.get("responseMapping") {
        let mut m = ResponseMappingPatch::default();
        if let Some(v) = get_str(mapping, "textField") {
            m.text_field = Some(validate_non_empty(&v?, "customHttp.responseMapping.textField")?);
        }
        if let Some(v) = get_str(mapping, "languageField") {
            m.language_field = Some(v?);
        }
        if let Some(v) = get_str(mapping, "confidenceField") {
            m.confidence_field = Some(v?);
        }
        p.response_mapping = Some(m);
    }
    Ok(p)
}

fn validate_server(obj: &serde_json::Map<String, Value>) -> Result<ServerPatch, UserError> {
    let mut p = ServerPatch::default();
    if let Some(v) = get_u64(obj, "port") {
        p.port = Some(validate_positive_u32(v?, "server.port")? as u16);
    }
    if let Some(v) = get_str(obj, "host") {
        p.host = Some(validate_non_empty(&v?, "server.host")?);
    }
    if let Some(Value::Array(origins)) = obj.get("corsOrigins") {
        let mut parsed = Vec::with_capacity(origins.len());
        for o in origins {
            let s = o
                .as_str()
                .ok_or_else(|| UserError::invalid_config("corsOrigins entries must be strings"))?;
            parsed.push(s.to_string());
        }
        p.cors_origins = Some(parsed);
    }
    if let Some(v) = get_u64(obj, "maxAudioBytes") {
        p.max_audio_bytes = Some(validate_positive_u64(v?, "server.maxAudioBytes")? as usize);
    }
    if let Some(v) = get_u64(obj, "rateLimitPerMinute") {
        p.rate_limit_per_minute = Some(validate_positive_u32(v?, "server.rateLimitPerMinute")?);
    }
    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_top_level_keys_are_ignored() {
        let patch = validate_settings_patch(&json!({ "somethingUnknown": 42 })).unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn unknown_nested_keys_are_ignored() {
        let patch = validate_settings_patch(&json!({ "whisperx": { "bogus": 1, "model": "large-v3" } })).unwrap();
        assert_eq!(patch.whisperx.unwrap().model, Some("large-v3".to_string()));
    }

    #[test]
    fn invalid_url_is_a_user_error() {
        let result = validate_settings_patch(&json!({ "openclawGatewayUrl": "not a url" }));
        assert!(result.is_err());
    }

    #[test]
    fn invalid_provider_is_a_user_error() {
        let result = validate_settings_patch(&json!({ "sttProvider": "bogus" }));
        assert!(result.is_err());
    }

    #[test]
    fn empty_patch_round_trips_to_empty() {
        let patch = validate_settings_patch(&json!({})).unwrap();
        assert!(patch.is_empty());
        // Idempotence: validating again (conceptually re-validating the
        // patch's own JSON-equivalent shape) still yields an empty patch.
        assert!(validate_settings_patch(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn settings_patch_allows_partial_whisperx_update() {
        let patch = validate_settings_patch(&json!({ "whisperx": { "model": "large-v3" } })).unwrap();
        assert_eq!(patch.whisperx.unwrap().model, Some("large-v3".to_string()));
    }
}
