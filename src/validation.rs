//! Pure predicates used both by the HTTP plane (audio ingestion) and by
//! `config::validate_settings_patch` (settings ingestion). Kept free of any
//! I/O so they can be unit tested directly as plain functions.

use url::Url;

use crate::domain::ContentType;
use crate::errors::UserError;

pub fn validate_content_type(raw: &str) -> Result<ContentType, UserError> {
    ContentType::parse(raw).ok_or_else(|| {
        UserError::invalid_content_type(format!("unsupported content type: {raw}"))
    })
}

pub fn validate_audio_size(len: usize, max_audio_bytes: usize) -> Result<(), UserError> {
    if len == 0 {
        return Err(UserError::invalid_audio("audio payload is empty"));
    }
    if len > max_audio_bytes {
        return Err(UserError::audio_too_large(format!(
            "audio payload of {len} bytes exceeds the {max_audio_bytes}-byte limit"
        )));
    }
    Ok(())
}

pub fn validate_url(raw: &str) -> Result<Url, UserError> {
    Url::parse(raw).map_err(|e| UserError::invalid_config(format!("invalid URL '{raw}': {e}")))
}

pub fn validate_non_empty(raw: &str, field: &str) -> Result<String, UserError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UserError::invalid_config(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

pub fn validate_positive_u32(value: i64, field: &str) -> Result<u32, UserError> {
    if value <= 0 || value > u32::MAX as i64 {
        return Err(UserError::invalid_config(format!(
            "{field} must be a positive integer, got {value}"
        )));
    }
    Ok(value as u32)
}

pub fn validate_positive_u64(value: i64, field: &str) -> Result<u64, UserError> {
    if value <= 0 {
        return Err(UserError::invalid_config(format!(
            "{field} must be a positive integer, got {value}"
        )));
    }
    Ok(value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_size_boundary_exactly_max_is_admitted() {
        assert!(validate_audio_size(100, 100).is_ok());
    }

    #[test]
    fn audio_size_one_over_max_is_rejected() {
        assert!(validate_audio_size(101, 100).is_err());
    }

    #[test]
    fn audio_size_zero_is_rejected() {
        assert!(validate_audio_size(0, 100).is_err());
    }

    #[test]
    fn content_type_whitelist() {
        assert!(validate_content_type("audio/wav").is_ok());
        assert!(validate_content_type("application/json").is_err());
    }

    #[test]
    fn positive_integer_guard() {
        assert!(validate_positive_u32(0, "x").is_err());
        assert!(validate_positive_u32(-1, "x").is_err());
        assert!(validate_positive_u32(1, "x").is_ok());
    }

    #[test]
    fn non_empty_guard_trims() {
        assert_eq!(validate_non_empty("  hi  ", "x").unwrap(), "hi");
        assert!(validate_non_empty("   ", "x").is_err());
    }
}
