//! The three-frame wire protocol: `req`/`res`/`event`, plus the
//! typed params/payloads this client actually sends and parses. A tagged
//! enum (`#[serde(tag = "type")]`) discriminates the three frame kinds;
//! this protocol has exactly two methods (`connect`, `chat.send`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_MIN: u32 = 1;
pub const PROTOCOL_MAX: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct ClientRequestFrame {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    pub id: String,
    pub method: String,
    pub params: Value,
}

impl ClientRequestFrame {
    pub fn new(id: String, method: impl Into<String>, params: Value) -> Self {
        Self {
            frame_type: "req",
            id,
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    #[serde(rename = "res")]
    Response {
        id: String,
        ok: bool,
        #[serde(default)]
        payload: Option<Value>,
        #[serde(default)]
        error: Option<FrameError>,
    },
    #[serde(rename = "event")]
    Event {
        event: String,
        payload: Value,
        #[serde(default)]
        seq: Option<u64>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrameError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub version: String,
    pub platform: String,
    pub mode: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// `connect` request params. The backend-auth flow never carries a
/// top-level `nonce`; a cached handshake nonce, when present, belongs
/// under `client.mode`-specific device params this crate does not use.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub min_protocol: u32,
    pub max_protocol: u32,
    pub client: ClientInfo,
    pub caps: Vec<String>,
    pub role: String,
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthParams>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendParams {
    pub session_key: String,
    pub message: String,
    pub idempotency_key: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatEventPayload {
    pub run_id: String,
    pub state: String,
    #[serde(default)]
    pub message: Option<ChatMessage>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub content: ContentValue,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContentValue {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

pub const CHAT_STATE_DELTA: &str = "delta";
pub const CHAT_STATE_FINAL: &str = "final";
pub const CHAT_STATE_ABORTED: &str = "aborted";
pub const CHAT_STATE_ERROR: &str = "error";

pub const EVENT_CHAT: &str = "chat";
pub const EVENT_CONNECT_CHALLENGE: &str = "connect.challenge";

/// Extract plain text from a message's content, whether it's a bare string
/// or an array of typed blocks (only `type="text"` blocks contribute).
pub fn extract_text(content: &ContentValue) -> String {
    match content {
        ContentValue::Text(text) => text.clone(),
        ContentValue::Blocks(blocks) => blocks
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_frame_always_carries_type_req() {
        let frame = ClientRequestFrame::new("abc".to_string(), "connect", serde_json::json!({}));
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "req");
        assert_eq!(value["id"], "abc");
        assert_eq!(value["method"], "connect");
    }

    #[test]
    fn request_frame_has_no_top_level_session_fields() {
        let frame = ClientRequestFrame::new(
            "abc".to_string(),
            "chat.send",
            serde_json::json!({ "sessionKey": "s", "message": "hi" }),
        );
        let value = serde_json::to_value(&frame).unwrap();
        assert!(value.get("sessionKey").is_none());
        assert!(value.get("turnId").is_none());
        assert!(value.get("text").is_none());
        assert!(value.get("timestamp").is_none());
    }

    #[test]
    fn extract_text_handles_plain_string() {
        let content = ContentValue::Text("hello".to_string());
        assert_eq!(extract_text(&content), "hello");
    }

    #[test]
    fn extract_text_filters_non_text_blocks() {
        let content = ContentValue::Blocks(vec![
            ContentBlock {
                block_type: "text".to_string(),
                text: Some("hi".to_string()),
            },
            ContentBlock {
                block_type: "tool_use".to_string(),
                text: None,
            },
            ContentBlock {
                block_type: "text".to_string(),
                text: Some(" there".to_string()),
            },
        ]);
        assert_eq!(extract_text(&content), "hi there");
    }

    #[test]
    fn response_frame_parses_error_variant() {
        let raw = r#"{"type":"res","id":"1","ok":false,"error":{"code":"bad","message":"nope"}}"#;
        let frame: ServerFrame = serde_json::from_str(raw).unwrap();
        match frame {
            ServerFrame::Response { ok, error, .. } => {
                assert!(!ok);
                assert_eq!(error.unwrap().message, "nope");
            }
            ServerFrame::Event { .. } => panic!("expected response frame"),
        }
    }
}
