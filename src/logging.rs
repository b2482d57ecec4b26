//! JSON-line structured logging with child-context chaining and recursive
//! secret redaction by field-name pattern. Context chaining is built on
//! `tracing::Span` rather than a bespoke logger struct, since `tracing`
//! already gives every `#[instrument]`-derived span the "child inherits
//! parent fields" behavior a hand-rolled `.child()` logger would need.

use std::fmt;

use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Field names treated as secrets wherever they appear, at any nesting
/// depth, in a logged value.
const SECRET_FIELDS: &[&str] = &[
    "token",
    "apikey",
    "api_key",
    "authheader",
    "auth_header",
    "authorization",
    "secret",
    "password",
];

const MASK: &str = "********";

/// Initialize the global JSON-line subscriber. Call once at process start.
pub fn init() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_current_span(true)
        .with_span_list(true)
        .init();
}

/// Recursively replace any object value whose key matches the secret
/// allowlist (case-insensitive) with the mask literal. Used both by
/// `GatewayConfig::to_safe` and, defensively, by anything that logs a raw
/// config-shaped value.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let lowered = k.to_lowercase();
                if SECRET_FIELDS.iter().any(|f| lowered.contains(f)) {
                    out.insert(k.clone(), Value::String(MASK.to_string()));
                } else {
                    out.insert(k.clone(), redact(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

/// A bound child context: a set of key/value pairs that should appear on
/// every log line emitted while it's alive. Thin wrapper over a
/// `tracing::Span` so dropping it ends the context the way a `.child()`
/// logger would fall out of scope.
pub struct TurnContext {
    span: tracing::Span,
}

impl TurnContext {
    pub fn new(turn_id: &crate::domain::TurnId, session_key: &crate::domain::SessionKey) -> Self {
        let span = tracing::info_span!("turn", turn_id = %turn_id, session_key = %session_key);
        Self { span }
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl fmt::Debug for TurnContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnContext").finish()
    }
}
