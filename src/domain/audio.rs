use std::fmt;

/// Audio content-type whitelist. Anything outside this closed set is
/// rejected by the validation guards before it reaches a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Wav,
    XWav,
    Pcm,
    Ogg,
    Mpeg,
    WebM,
}

impl ContentType {
    pub fn parse(raw: &str) -> Option<Self> {
        // Content-Type headers may carry parameters (`; codecs=...`); match
        // only the media type itself.
        let media_type = raw.split(';').next().unwrap_or(raw).trim();
        match media_type {
            "audio/wav" => Some(ContentType::Wav),
            "audio/x-wav" => Some(ContentType::XWav),
            "audio/pcm" => Some(ContentType::Pcm),
            "audio/ogg" => Some(ContentType::Ogg),
            "audio/mpeg" => Some(ContentType::Mpeg),
            "audio/webm" => Some(ContentType::WebM),
            _ => None,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContentType::Wav => "audio/wav",
            ContentType::XWav => "audio/x-wav",
            ContentType::Pcm => "audio/pcm",
            ContentType::Ogg => "audio/ogg",
            ContentType::Mpeg => "audio/mpeg",
            ContentType::WebM => "audio/webm",
        };
        write!(f, "{s}")
    }
}

/// A complete, transient audio payload. Held in memory only for the
/// duration of a transcription call and discarded thereafter.
#[derive(Debug, Clone)]
pub struct AudioPayload {
    pub bytes: bytes::Bytes,
    pub content_type: ContentType,
    pub language_hint: Option<String>,
}

impl AudioPayload {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whitelisted_types() {
        assert_eq!(ContentType::parse("audio/wav"), Some(ContentType::Wav));
        assert_eq!(
            ContentType::parse("audio/webm; codecs=opus"),
            Some(ContentType::WebM)
        );
    }

    #[test]
    fn rejects_unlisted_type() {
        assert_eq!(ContentType::parse("video/mp4"), None);
        assert_eq!(ContentType::parse("text/plain"), None);
    }
}
