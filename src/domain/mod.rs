//! Shared domain types: branded identifiers, transport DTOs, and the result
//! shapes every STT provider and the agent session client must agree on.

mod audio;
mod envelope;
mod ids;
mod stt_result;

pub use audio::{AudioPayload, ContentType};
pub use envelope::{AssistantReply, ReplyEnvelope, ReplyMeta, Timing};
pub use ids::{ProviderId, SessionKey, TurnId};
pub use stt_result::{Confidence, SttError, SttResult};
