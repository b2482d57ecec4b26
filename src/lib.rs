//! Voice-turn gateway: accepts a complete audio payload over HTTP, dispatches
//! it to a configurable speech-to-text backend, forwards the transcript to a
//! persistent conversational-agent session, and returns the shaped response.

pub mod agent;
pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod orchestrator;
pub mod rebuilders;
pub mod shaper;
pub mod startup;
pub mod stt;
pub mod validation;

pub use config::{ConfigStore, GatewayConfig, SafeGatewayConfig};
pub use domain::{ProviderId, SessionKey, TurnId};
pub use errors::{OperatorError, UserError};
