//! The persistent agent session client: one duplex connection per
//! client instance, a five-state handshake machine, and two correlation
//! maps (`PendingRequest` by request id, `PendingTurn` by idempotency key).
//! A single spawned task owns the split WebSocket sink and stream and
//! multiplexes outbound sends against inbound frames via `tokio::select!`;
//! callers talk to it only through an `mpsc` channel and the two pending
//! maps.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::backoff::RetryPolicy;
use super::error::SessionError;
use super::protocol::{
    extract_text, AuthParams, ChatEventPayload, ChatSendParams, ClientInfo, ClientRequestFrame, ConnectParams,
    ServerFrame, CHAT_STATE_ABORTED, CHAT_STATE_DELTA, CHAT_STATE_ERROR, CHAT_STATE_FINAL, EVENT_CHAT,
    EVENT_CONNECT_CHALLENGE, PROTOCOL_MAX, PROTOCOL_MIN,
};

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Dialing,
    AwaitingHello,
    Ready,
    Draining,
}

struct PendingTurn {
    accumulated: String,
    completion: Option<oneshot::Sender<Result<String, SessionError>>>,
}

enum PendingRequestKind {
    Connect,
    ChatSend { idempotency_key: String },
}

struct PendingRequest {
    kind: PendingRequestKind,
    completion: Option<oneshot::Sender<Result<serde_json::Value, SessionError>>>,
}

type PendingRequests = Arc<SyncMutex<HashMap<String, PendingRequest>>>;
type PendingTurns = Arc<SyncMutex<HashMap<String, PendingTurn>>>;

#[derive(Debug, Clone)]
pub struct SessionClientConfig {
    pub url: String,
    pub token: Option<String>,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
    pub retry: RetryPolicy,
}

impl SessionClientConfig {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            url: url.into(),
            token,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            response_timeout: Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS),
            retry: RetryPolicy::default(),
        }
    }
}

/// One persistent duplex connection to the agent gateway, rebuilt wholesale
/// (never mutated in place) whenever `openclawGatewayUrl`/`Token` change.
pub struct SessionClient {
    config: SessionClientConfig,
    state: Arc<RwLock<SessionState>>,
    outbound: AsyncMutex<Option<mpsc::UnboundedSender<Message>>>,
    pending_requests: PendingRequests,
    pending_turns: PendingTurns,
    reader_task: AsyncMutex<Option<JoinHandle<()>>>,
    dial_lock: AsyncMutex<()>,
    // Cheap readiness probe (for `/readyz`): true until a dial
    // attempt is exhausted or the wire closes unexpectedly. Never triggers
    // I/O of its own, unlike the STT providers' `HealthCheck`, since this
    // client must not eagerly dial on every readiness poll.
    dial_healthy: Arc<AtomicBool>,
}

impl SessionClient {
    pub fn new(config: SessionClientConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(SessionState::Disconnected)),
            outbound: AsyncMutex::new(None),
            pending_requests: Arc::new(SyncMutex::new(HashMap::new())),
            pending_turns: Arc::new(SyncMutex::new(HashMap::new())),
            reader_task: AsyncMutex::new(None),
            dial_lock: AsyncMutex::new(()),
            dial_healthy: Arc::new(AtomicBool::new(true)),
        }
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Last known health, updated on dial outcome and unexpected wire
    /// closure. Never dials; safe to poll on every `/readyz` request.
    pub fn is_healthy(&self) -> bool {
        self.dial_healthy.load(Ordering::Relaxed)
    }

    /// Translate `SendTranscript(sessionKey, turnId, text)` into the wire
    /// protocol and back. Connects lazily under the retry policy if not
    /// already READY.
    pub async fn send_transcript(
        &self,
        session_key: &str,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<AgentResponse, SessionError> {
        tokio::select! {
            result = self.ensure_ready(&cancel) => result?,
            _ = cancel.cancelled() => return Err(SessionError::Timeout),
        }

        let idempotency_key = Uuid::new_v4().to_string();
        let request_id = Uuid::new_v4().to_string();
        let timeout_ms = self.config.response_timeout.as_millis() as u64;
        let params = ChatSendParams {
            session_key: session_key.to_string(),
            message: text.to_string(),
            idempotency_key: idempotency_key.clone(),
            timeout_ms,
        };
        let frame = ClientRequestFrame::new(
            request_id.clone(),
            "chat.send",
            serde_json::to_value(&params).expect("ChatSendParams always serializes"),
        );

        let (turn_tx, turn_rx) = oneshot::channel();
        self.pending_turns.lock().insert(
            idempotency_key.clone(),
            PendingTurn {
                accumulated: String::new(),
                completion: Some(turn_tx),
            },
        );
        self.pending_requests.lock().insert(
            request_id.clone(),
            PendingRequest {
                kind: PendingRequestKind::ChatSend {
                    idempotency_key: idempotency_key.clone(),
                },
                completion: None,
            },
        );

        let outbound = self.outbound.lock().await.clone();
        let Some(outbound) = outbound else {
            self.pending_turns.lock().remove(&idempotency_key);
            self.pending_requests.lock().remove(&request_id);
            return Err(SessionError::Unavailable("no active connection".to_string()));
        };

        let text_frame = serde_json::to_string(&frame).map_err(|e| SessionError::Unavailable(e.to_string()))?;
        if outbound.send(Message::Text(text_frame.into())).is_err() {
            self.pending_turns.lock().remove(&idempotency_key);
            self.pending_requests.lock().remove(&request_id);
            return Err(SessionError::Unavailable("connection writer gone".to_string()));
        }

        tokio::select! {
            result = tokio::time::timeout(self.config.response_timeout, turn_rx) => match result {
                Ok(Ok(turn_result)) => turn_result.map(|text| AgentResponse { text }),
                Ok(Err(_)) => Err(SessionError::Unavailable("turn tracker dropped".to_string())),
                Err(_) => {
                    self.pending_turns.lock().remove(&idempotency_key);
                    Err(SessionError::Timeout)
                }
            },
            _ = cancel.cancelled() => {
                self.pending_turns.lock().remove(&idempotency_key);
                Err(SessionError::Timeout)
            }
        }
    }

    /// Tear down the connection: every pending turn and request rejects
    /// with a user-safe `Unavailable` error. Exactly N pending turns are
    /// rejected; none is resolved after disconnect.
    pub async fn disconnect(&self) {
        *self.state.write().await = SessionState::Draining;
        self.outbound.lock().await.take();
        if let Some(handle) = self.reader_task.lock().await.take() {
            handle.abort();
        }
        fail_all_pending(&self.pending_requests, &self.pending_turns, "session disconnected");
        *self.state.write().await = SessionState::Disconnected;
        self.dial_healthy.store(false, Ordering::Relaxed);
    }

    async fn ensure_ready(&self, cancel: &CancellationToken) -> Result<(), SessionError> {
        if *self.state.read().await == SessionState::Ready {
            return Ok(());
        }
        let _guard = self.dial_lock.lock().await;
        if *self.state.read().await == SessionState::Ready {
            return Ok(());
        }
        self.dial_with_retry(cancel).await
    }

    async fn dial_with_retry(&self, cancel: &CancellationToken) -> Result<(), SessionError> {
        let mut attempt = 0u32;
        loop {
            match self.dial_once().await {
                Ok(()) => {
                    self.dial_healthy.store(true, Ordering::Relaxed);
                    return Ok(());
                }
                Err(e) if e.is_terminal() => {
                    self.dial_healthy.store(false, Ordering::Relaxed);
                    return Err(e);
                }
                Err(e) => {
                    if !self.config.retry.should_retry(attempt) {
                        self.dial_healthy.store(false, Ordering::Relaxed);
                        return Err(e);
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.retry.calculate_delay(attempt)) => {}
                        _ = cancel.cancelled() => return Err(SessionError::Timeout),
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn dial_once(&self) -> Result<(), SessionError> {
        *self.state.write().await = SessionState::Dialing;

        let (ws_stream, _response) =
            tokio::time::timeout(self.config.connect_timeout, tokio_tungstenite::connect_async(&self.config.url))
                .await
                .map_err(|_| SessionError::Timeout)?
                .map_err(|e| SessionError::Unavailable(e.to_string()))?;

        let (mut sink, mut stream) = ws_stream.split();

        // A short grace window during which the server may push a
        // connect.challenge event; the nonce is cached for device-paired
        // flows this client doesn't use, so it's parsed but not acted on.
        let grace = tokio::time::sleep(Duration::from_millis(750));
        tokio::pin!(grace);
        loop {
            tokio::select! {
                _ = &mut grace => break,
                maybe_msg = stream.next() => match maybe_msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(ServerFrame::Event { event, .. }) = serde_json::from_str::<ServerFrame>(&text) {
                            if event == EVENT_CONNECT_CHALLENGE {
                                break;
                            }
                        }
                    }
                    Some(_) => continue,
                    None => return Err(SessionError::Unavailable("connection closed during handshake".to_string())),
                },
            }
        }

        *self.state.write().await = SessionState::AwaitingHello;

        let request_id = Uuid::new_v4().to_string();
        let params = ConnectParams {
            min_protocol: PROTOCOL_MIN,
            max_protocol: PROTOCOL_MAX,
            client: ClientInfo {
                id: "openclaw-voice-gateway".to_string(),
                display_name: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                platform: std::env::consts::OS.to_string(),
                mode: "backend".to_string(),
            },
            caps: Vec::new(),
            role: "voice-gateway".to_string(),
            scopes: Vec::new(),
            auth: self.config.token.clone().map(|token| AuthParams { token: Some(token) }),
        };
        let frame = ClientRequestFrame::new(
            request_id.clone(),
            "connect",
            serde_json::to_value(&params).expect("ConnectParams always serializes"),
        );

        let (hello_tx, hello_rx) = oneshot::channel();
        self.pending_requests.lock().insert(
            request_id.clone(),
            PendingRequest {
                kind: PendingRequestKind::Connect,
                completion: Some(hello_tx),
            },
        );

        let text = serde_json::to_string(&frame).map_err(|e| SessionError::Unavailable(e.to_string()))?;
        if sink.send(Message::Text(text.into())).await.is_err() {
            self.pending_requests.lock().remove(&request_id);
            return Err(SessionError::Unavailable("failed to send connect frame".to_string()));
        }

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let pending_requests = self.pending_requests.clone();
        let pending_turns = self.pending_turns.clone();
        let reader_state = self.state.clone();
        let reader_dial_healthy = self.dial_healthy.clone();
        let reader = tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = out_rx.recv() => match outgoing {
                        Some(msg) => {
                            if sink.send(msg).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    incoming = stream.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            handle_frame(&text, &pending_requests, &pending_turns);
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = sink.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(_)) => break,
                        _ => {}
                    },
                }
            }
            *reader_state.write().await = SessionState::Disconnected;
            reader_dial_healthy.store(false, Ordering::Relaxed);
            fail_all_pending(&pending_requests, &pending_turns, "connection closed");
        });

        *self.outbound.lock().await = Some(out_tx);
        *self.reader_task.lock().await = Some(reader);

        let hello = tokio::time::timeout(self.config.connect_timeout, hello_rx).await;
        let payload = match hello {
            Ok(Ok(Ok(payload))) => payload,
            Ok(Ok(Err(err))) => {
                self.teardown_failed_dial().await;
                return Err(err);
            }
            Ok(Err(_)) => {
                self.teardown_failed_dial().await;
                return Err(SessionError::Unavailable("connect request dropped".to_string()));
            }
            Err(_) => {
                self.pending_requests.lock().remove(&request_id);
                self.teardown_failed_dial().await;
                return Err(SessionError::Timeout);
            }
        };

        let is_hello_ok = payload.get("type").and_then(|v| v.as_str()) == Some("hello-ok");
        if !is_hello_ok {
            self.teardown_failed_dial().await;
            return Err(SessionError::Unavailable("handshake did not return hello-ok".to_string()));
        }

        *self.state.write().await = SessionState::Ready;
        Ok(())
    }

    async fn teardown_failed_dial(&self) {
        *self.state.write().await = SessionState::Disconnected;
        self.outbound.lock().await.take();
        if let Some(handle) = self.reader_task.lock().await.take() {
            handle.abort();
        }
    }
}

/// Parse one inbound text frame and resolve whatever it correlates to.
/// Unparseable frames and frames correlating to nothing (already timed out,
/// already resolved) are silently dropped.
fn handle_frame(text: &str, pending_requests: &PendingRequests, pending_turns: &PendingTurns) {
    let Ok(frame) = serde_json::from_str::<ServerFrame>(text) else {
        return;
    };

    match frame {
        ServerFrame::Response { id, ok, payload, error } => {
            let Some(pending) = pending_requests.lock().remove(&id) else {
                return;
            };
            match pending.kind {
                PendingRequestKind::Connect => {
                    if let Some(tx) = pending.completion {
                        let result = if ok {
                            Ok(payload.unwrap_or(serde_json::Value::Null))
                        } else {
                            Err(SessionError::SessionError(
                                error.map(|e| e.message).unwrap_or_else(|| "connect rejected".to_string()),
                            ))
                        };
                        let _ = tx.send(result);
                    }
                }
                PendingRequestKind::ChatSend { idempotency_key } => {
                    if !ok {
                        if let Some(turn) = pending_turns.lock().remove(&idempotency_key) {
                            if let Some(tx) = turn.completion {
                                let message = error.map(|e| e.message).unwrap_or_else(|| "chat.send rejected".to_string());
                                let _ = tx.send(Err(SessionError::SessionError(message)));
                            }
                        }
                    }
                    // ok=true is logged by the caller; the turn resolves via events.
                }
            }
        }
        ServerFrame::Event { event, payload, .. } => {
            if event != EVENT_CHAT {
                return;
            }
            let Ok(chat) = serde_json::from_value::<ChatEventPayload>(payload) else {
                return;
            };
            handle_chat_event(chat, pending_turns);
        }
    }
}

fn handle_chat_event(chat: ChatEventPayload, pending_turns: &PendingTurns) {
    match chat.state.as_str() {
        CHAT_STATE_DELTA => {
            if let Some(message) = &chat.message {
                let mut turns = pending_turns.lock();
                if let Some(turn) = turns.get_mut(&chat.run_id) {
                    turn.accumulated.push_str(&extract_text(&message.content));
                }
            }
        }
        CHAT_STATE_FINAL => {
            let mut turns = pending_turns.lock();
            if let Some(turn) = turns.remove(&chat.run_id) {
                let final_text = chat.message.as_ref().map(|m| extract_text(&m.content)).filter(|t| !t.is_empty());
                let text = final_text.unwrap_or(turn.accumulated);
                if let Some(tx) = turn.completion {
                    let _ = tx.send(Ok(text));
                }
            }
        }
        CHAT_STATE_ABORTED => {
            let mut turns = pending_turns.lock();
            if let Some(turn) = turns.remove(&chat.run_id) {
                let result = if !turn.accumulated.is_empty() {
                    Ok(turn.accumulated)
                } else {
                    Err(SessionError::SessionError("turn aborted with no content".to_string()))
                };
                if let Some(tx) = turn.completion {
                    let _ = tx.send(result);
                }
            }
        }
        CHAT_STATE_ERROR => {
            let mut turns = pending_turns.lock();
            if let Some(turn) = turns.remove(&chat.run_id) {
                let message = chat.error.clone().unwrap_or_else(|| "agent reported an error".to_string());
                if let Some(tx) = turn.completion {
                    let _ = tx.send(Err(SessionError::SessionError(message)));
                }
            }
        }
        _ => {}
    }
}

fn fail_all_pending(pending_requests: &PendingRequests, pending_turns: &PendingTurns, reason: &str) {
    for (_, pending) in pending_requests.lock().drain() {
        if let PendingRequestKind::Connect = pending.kind {
            if let Some(tx) = pending.completion {
                let _ = tx.send(Err(SessionError::Unavailable(reason.to_string())));
            }
        }
    }
    for (_, turn) in pending_turns.lock().drain() {
        if let Some(tx) = turn.completion {
            let _ = tx.send(Err(SessionError::Unavailable(reason.to_string())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_turn(turns: &PendingTurns, run_id: &str) -> oneshot::Receiver<Result<String, SessionError>> {
        let (tx, rx) = oneshot::channel();
        turns.lock().insert(
            run_id.to_string(),
            PendingTurn {
                accumulated: String::new(),
                completion: Some(tx),
            },
        );
        rx
    }

    #[tokio::test]
    async fn delta_then_final_resolves_with_final_text() {
        let turns: PendingTurns = Arc::new(SyncMutex::new(HashMap::new()));
        let requests: PendingRequests = Arc::new(SyncMutex::new(HashMap::new()));
        let rx = insert_turn(&turns, "run-1");

        let delta = r#"{"type":"event","event":"chat","payload":{"runId":"run-1","state":"delta","message":{"content":"Hello "}}}"#;
        handle_frame(delta, &requests, &turns);

        let finaly = r#"{"type":"event","event":"chat","payload":{"runId":"run-1","state":"final","message":{"content":"Hello world"}}}"#;
        handle_frame(finaly, &requests, &turns);

        let resolved = rx.await.unwrap().unwrap();
        assert_eq!(resolved, "Hello world");
    }

    #[tokio::test]
    async fn final_without_message_falls_back_to_accumulated_text() {
        let turns: PendingTurns = Arc::new(SyncMutex::new(HashMap::new()));
        let requests: PendingRequests = Arc::new(SyncMutex::new(HashMap::new()));
        let rx = insert_turn(&turns, "run-2");

        let delta = r#"{"type":"event","event":"chat","payload":{"runId":"run-2","state":"delta","message":{"content":"accumulated text"}}}"#;
        handle_frame(delta, &requests, &turns);

        let finaly = r#"{"type":"event","event":"chat","payload":{"runId":"run-2","state":"final"}}"#;
        handle_frame(finaly, &requests, &turns);

        let resolved = rx.await.unwrap().unwrap();
        assert_eq!(resolved, "accumulated text");
    }

    #[tokio::test]
    async fn error_event_rejects_the_turn() {
        let turns: PendingTurns = Arc::new(SyncMutex::new(HashMap::new()));
        let requests: PendingRequests = Arc::new(SyncMutex::new(HashMap::new()));
        let rx = insert_turn(&turns, "run-3");

        let err_frame = r#"{"type":"event","event":"chat","payload":{"runId":"run-3","state":"error","error":"boom"}}"#;
        handle_frame(err_frame, &requests, &turns);

        let result = rx.await.unwrap();
        assert!(matches!(result, Err(SessionError::SessionError(msg)) if msg == "boom"));
    }

    #[tokio::test]
    async fn aborted_with_empty_accumulated_text_is_rejected() {
        let turns: PendingTurns = Arc::new(SyncMutex::new(HashMap::new()));
        let requests: PendingRequests = Arc::new(SyncMutex::new(HashMap::new()));
        let rx = insert_turn(&turns, "run-4");

        let aborted = r#"{"type":"event","event":"chat","payload":{"runId":"run-4","state":"aborted"}}"#;
        handle_frame(aborted, &requests, &turns);

        assert!(rx.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn aborted_with_accumulated_text_resolves() {
        let turns: PendingTurns = Arc::new(SyncMutex::new(HashMap::new()));
        let requests: PendingRequests = Arc::new(SyncMutex::new(HashMap::new()));
        let rx = insert_turn(&turns, "run-5");

        let delta = r#"{"type":"event","event":"chat","payload":{"runId":"run-5","state":"delta","message":{"content":"partial"}}}"#;
        handle_frame(delta, &requests, &turns);
        let aborted = r#"{"type":"event","event":"chat","payload":{"runId":"run-5","state":"aborted"}}"#;
        handle_frame(aborted, &requests, &turns);

        assert_eq!(rx.await.unwrap().unwrap(), "partial");
    }

    #[tokio::test]
    async fn disconnect_rejects_every_pending_turn_exactly_once() {
        let turns: PendingTurns = Arc::new(SyncMutex::new(HashMap::new()));
        let requests: PendingRequests = Arc::new(SyncMutex::new(HashMap::new()));
        let rx_a = insert_turn(&turns, "run-a");
        let rx_b = insert_turn(&turns, "run-b");

        fail_all_pending(&requests, &turns, "connection closed");

        assert!(rx_a.await.unwrap().is_err());
        assert!(rx_b.await.unwrap().is_err());
        assert!(turns.lock().is_empty());
    }

    #[test]
    fn a_freshly_constructed_client_reports_healthy() {
        let client = SessionClient::new(SessionClientConfig::new("ws://localhost:1", None));
        assert!(client.is_healthy());
    }

    #[tokio::test]
    async fn chat_send_ack_failure_rejects_the_correlated_turn() {
        let turns: PendingTurns = Arc::new(SyncMutex::new(HashMap::new()));
        let requests: PendingRequests = Arc::new(SyncMutex::new(HashMap::new()));
        let rx = insert_turn(&turns, "idem-1");
        requests.lock().insert(
            "req-1".to_string(),
            PendingRequest {
                kind: PendingRequestKind::ChatSend {
                    idempotency_key: "idem-1".to_string(),
                },
                completion: None,
            },
        );

        let nack = r#"{"type":"res","id":"req-1","ok":false,"error":{"code":"bad","message":"rejected"}}"#;
        handle_frame(nack, &requests, &turns);

        let result = rx.await.unwrap();
        assert!(matches!(result, Err(SessionError::SessionError(msg)) if msg == "rejected"));
    }
}
