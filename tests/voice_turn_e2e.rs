//! End-to-end test for a complete voice turn: a real `axum` router driven
//! through `tower::ServiceExt::oneshot`, a `wiremock` STT backend, and an
//! in-process mock agent gateway speaking the real WebSocket wire protocol.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::extract::connect_info::ConnectInfo;
use axum::http::{Request, StatusCode};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use openclaw_voice_gateway::agent::{SessionClient, SessionClientConfig};
use openclaw_voice_gateway::config::{ConfigStore, CustomHttpPatch, GatewayConfig, ResponseMappingPatch};
use openclaw_voice_gateway::http::{self, AppState, RateLimiter};
use openclaw_voice_gateway::orchestrator::Orchestrator;
use openclaw_voice_gateway::stt::CustomHttpSTT;
use openclaw_voice_gateway::ProviderId;

/// Accepts exactly one connection, answers the `connect` request with a
/// `hello-ok` response, then replies to the first `chat.send` with a single
/// `final` chat event carrying `reply_text`.
async fn spawn_mock_agent(reply_text: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock agent");
    let addr = listener.local_addr().expect("mock agent local addr");

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept mock agent connection");
        let mut ws = tokio_tungstenite::accept_async(stream).await.expect("mock agent handshake");

        let connect_frame = loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame: Value = serde_json::from_str(&text).expect("connect frame is JSON");
                    if frame["method"] == "connect" {
                        break frame;
                    }
                }
                Some(Ok(_)) => continue,
                _ => return,
            }
        };

        let hello_ok = json!({
            "type": "res",
            "id": connect_frame["id"],
            "ok": true,
            "payload": { "type": "hello-ok", "protocol": 1, "sessionResumed": false },
        });
        ws.send(Message::Text(hello_ok.to_string().into())).await.expect("send hello-ok");

        let chat_send_frame = loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame: Value = serde_json::from_str(&text).expect("chat.send frame is JSON");
                    if frame["method"] == "chat.send" {
                        break frame;
                    }
                }
                Some(Ok(_)) => continue,
                _ => return,
            }
        };

        let idempotency_key = chat_send_frame["params"]["idempotencyKey"].clone();
        let chat_send_id = chat_send_frame["id"].clone();
        let ack = json!({ "type": "res", "id": chat_send_id, "ok": true, "payload": {} });
        ws.send(Message::Text(ack.to_string().into())).await.expect("send chat.send ack");

        let final_event = json!({
            "type": "event",
            "event": "chat",
            "payload": {
                "runId": idempotency_key,
                "state": "final",
                "message": { "content": reply_text },
            },
        });
        ws.send(Message::Text(final_event.to_string().into()))
            .await
            .expect("send final chat event");

        // Keep the task alive long enough for the client to read the frame
        // before the socket drops.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    });

    addr
}

fn with_peer(mut request: Request<Body>) -> Request<Body> {
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 54321)));
    request
}

#[tokio::test]
async fn happy_turn_round_trips_through_stt_and_agent() {
    let stt_mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "what's the weather" })))
        .mount(&stt_mock)
        .await;

    let agent_addr = spawn_mock_agent("Looks clear and sunny today.").await;

    let mut config = GatewayConfig::default();
    config.stt_provider = ProviderId::Custom;
    config.openclaw_gateway_url = format!("ws://{agent_addr}");
    let store = Arc::new(ConfigStore::new(config));
    store.update(openclaw_voice_gateway::config::ConfigPatch {
        custom_http: Some(CustomHttpPatch {
            url: Some(format!("{}/transcribe", stt_mock.uri())),
            response_mapping: Some(ResponseMappingPatch {
                text_field: Some("text".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    });

    let providers = Arc::new(DashMap::new());
    providers.insert(
        ProviderId::Custom,
        Arc::new(CustomHttpSTT::new(store.get().custom_http.clone())) as Arc<dyn openclaw_voice_gateway::stt::SttProvider>,
    );

    let session_client = Arc::new(ArcSwap::from_pointee(SessionClient::new(SessionClientConfig::new(
        format!("ws://{agent_addr}"),
        None,
    ))));
    let orchestrator = Arc::new(Orchestrator::new(providers.clone(), session_client.clone()));

    let state = Arc::new(AppState {
        config: store,
        providers,
        session_client,
        orchestrator,
        readiness: Arc::new(AtomicBool::new(true)),
        rate_limiter: Arc::new(RateLimiter::new()),
    });

    let router = http::build_router(state);
    let response = router
        .oneshot(with_peer(
            Request::post("/api/voice/turn")
                .header("content-type", "audio/wav")
                .body(Body::from(vec![0u8; 32]))
                .unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let envelope: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(envelope["assistant"]["fullText"], "Looks clear and sunny today.");
    assert_eq!(envelope["meta"]["provider"], "custom");
    assert!(envelope["timing"]["totalMs"].as_u64().is_some());
}

#[tokio::test]
async fn voice_turn_rejects_audio_over_the_configured_limit() {
    let mut config = GatewayConfig::default();
    config.server.max_audio_bytes = 16;
    let store = Arc::new(ConfigStore::new(config));

    let providers: Arc<DashMap<ProviderId, Arc<dyn openclaw_voice_gateway::stt::SttProvider>>> = Arc::new(DashMap::new());
    let session_client = Arc::new(ArcSwap::from_pointee(SessionClient::new(SessionClientConfig::new(
        "ws://127.0.0.1:1",
        None,
    ))));
    let orchestrator = Arc::new(Orchestrator::new(providers.clone(), session_client.clone()));

    let state = Arc::new(AppState {
        config: store,
        providers,
        session_client,
        orchestrator,
        readiness: Arc::new(AtomicBool::new(true)),
        rate_limiter: Arc::new(RateLimiter::new()),
    });

    let router = http::build_router(state);
    let response = router
        .oneshot(with_peer(
            Request::post("/api/voice/turn")
                .header("content-type", "audio/wav")
                .body(Body::from(vec![0u8; 64]))
                .unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
