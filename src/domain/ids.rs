use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-request correlation token. Generated at request entry; lifetime is a
/// single turn. Structurally a string, nominally distinct from every other
/// branded identifier in the crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(String);

impl TurnId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TurnId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Logical agent conversation channel. Constant across every turn within a
/// session; lifetime is whatever the operator configures it to be.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Construct from an already-validated non-empty string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Selects the active STT provider. Closed set; mutable at runtime via
/// `/api/settings`, but never extended without a code change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    WhisperX,
    OpenAI,
    Custom,
}

impl ProviderId {
    pub fn all() -> [ProviderId; 3] {
        [ProviderId::WhisperX, ProviderId::OpenAI, ProviderId::Custom]
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "whisperx" => Some(ProviderId::WhisperX),
            "openai" => Some(ProviderId::OpenAI),
            "custom" => Some(ProviderId::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderId::WhisperX => write!(f, "whisperx"),
            ProviderId::OpenAI => write!(f, "openai"),
            ProviderId::Custom => write!(f, "custom"),
        }
    }
}
