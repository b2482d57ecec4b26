use serde::Serialize;

use super::ids::{ProviderId, SessionKey, TurnId};
use crate::shaper::Segment;

/// Per-turn timing breakdown, all in milliseconds.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    pub stt_ms: u64,
    pub agent_ms: u64,
    pub total_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    pub full_text: String,
    pub segments: Vec<Segment>,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyMeta {
    pub provider: ProviderId,
    pub model: Option<String>,
}

/// The complete HTTP response body for a voice turn.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyEnvelope {
    pub turn_id: TurnId,
    pub session_key: SessionKey,
    pub assistant: AssistantReply,
    pub timing: Timing,
    pub meta: ReplyMeta,
}
