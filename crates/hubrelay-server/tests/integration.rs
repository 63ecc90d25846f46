//! End-to-end tests against a real listener, driven with `reqwest` and a
//! `tokio-tungstenite` client.

use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use hubrelay_core::{SharedSecret, SignatureVerifier, TokenVerifier};
use hubrelay_server::{RelayServer, ServerConfig};

const SECRET: &str = "integration-secret-value";
const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn boot_with(config: ServerConfig) -> (SocketAddr, RelayServer) {
    let server = RelayServer::new(config, SharedSecret::new(SECRET).unwrap());
    let (addr, _handle) = server.listen().await.unwrap();
    (addr, server)
}

async fn boot() -> (SocketAddr, RelayServer) {
    boot_with(ServerConfig::default()).await
}

async fn connect(addr: SocketAddr, token: Option<&str>) -> Result<WsStream, WsError> {
    let mut request = format!("ws://{addr}/v1/ws").into_client_request()?;
    if let Some(token) = token {
        let _ = request
            .headers_mut()
            .insert("X-Authorization", HeaderValue::from_str(token).unwrap());
    }
    connect_async(request).await.map(|(ws, _)| ws)
}

async fn subscribe(addr: SocketAddr) -> WsStream {
    connect(addr, Some(&TokenVerifier::encode(SECRET))).await.unwrap()
}

async fn post_event(addr: SocketAddr, user: &str, body: &str, signature: Option<String>) -> u16 {
    let mut request = reqwest::Client::new()
        .post(format!("http://{addr}/v1/stream/{user}"))
        .header("Content-Type", "application/json")
        .body(body.to_owned());
    if let Some(sig) = signature {
        request = request.header("X-Hub-Signature", sig);
    }
    request.send().await.unwrap().status().as_u16()
}

fn sign(body: &str) -> String {
    SignatureVerifier::new(SharedSecret::new(SECRET).unwrap()).sign(body.as_bytes())
}

/// Next text frame, skipping pings.
async fn next_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn wait_for_subscribers(server: &RelayServer, expected: usize) {
    timeout(TIMEOUT, async {
        while server.registry().len().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("registry never reached expected size");
}

#[tokio::test]
async fn signed_event_reaches_every_subscriber() {
    let (addr, server) = boot().await;
    let mut first = subscribe(addr).await;
    let mut second = subscribe(addr).await;
    assert_eq!(server.registry().len().await, 2);

    let body = r#"{"data":{"x":1}}"#;
    assert_eq!(post_event(addr, "alice", body, Some(sign(body))).await, 202);

    let expected = json!({"type": "stream", "user": "alice", "payload": {"x": 1}});
    assert_eq!(next_json(&mut first).await, expected);
    assert_eq!(next_json(&mut second).await, expected);
}

#[tokio::test]
async fn events_arrive_in_order() {
    let (addr, _server) = boot().await;
    let mut ws = subscribe(addr).await;

    for n in 0..3 {
        let body = json!({ "data": { "n": n } }).to_string();
        assert_eq!(post_event(addr, "bob", &body, Some(sign(&body))).await, 202);
    }
    for n in 0..3 {
        assert_eq!(next_json(&mut ws).await["payload"]["n"], n);
    }
}

#[tokio::test]
async fn tampered_signature_is_rejected_and_not_delivered() {
    let (addr, _server) = boot().await;
    let mut ws = subscribe(addr).await;

    let body = r#"{"data":{"x":1}}"#;
    let mut signature = sign(body);
    let flipped = if signature.ends_with('0') { '1' } else { '0' };
    let _ = signature.pop();
    signature.push(flipped);

    assert_eq!(post_event(addr, "alice", body, Some(signature)).await, 403);
    assert_eq!(post_event(addr, "alice", body, None).await, 403);
    assert!(
        timeout(Duration::from_millis(300), ws.next()).await.is_err(),
        "no frame should be delivered"
    );
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let (addr, _server) = boot().await;
    let body = r#"{"payload":{"x":1}}"#;
    assert_eq!(post_event(addr, "alice", body, Some(sign(body))).await, 400);
}

#[tokio::test]
async fn event_without_subscribers_is_accepted() {
    let (addr, _server) = boot().await;
    let body = r#"{"data":"hello"}"#;
    assert_eq!(post_event(addr, "alice", body, Some(sign(body))).await, 202);
}

#[tokio::test]
async fn challenge_is_echoed_verbatim() {
    let (addr, _server) = boot().await;
    let resp = reqwest::get(format!(
        "http://{addr}/v1/stream/alice?hub.challenge=abc123&hub.mode=subscribe&hub.topic=t"
    ))
    .await
    .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await.unwrap(), "abc123");
}

#[tokio::test]
async fn wrong_token_is_refused_before_upgrade() {
    let (addr, server) = boot().await;
    let wrong = TokenVerifier::encode("not-the-secret");

    for token in [Some(wrong.as_str()), Some("Basic !!!"), None] {
        match connect(addr, token).await {
            Err(WsError::Http(resp)) => assert_eq!(resp.status().as_u16(), 403),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("upgrade should have been refused"),
        }
    }
    assert_eq!(server.registry().len().await, 0);
}

#[tokio::test]
async fn full_registry_refuses_with_503() {
    let config = ServerConfig {
        max_subscribers: 1,
        ..ServerConfig::default()
    };
    let (addr, server) = boot_with(config).await;
    let _first = subscribe(addr).await;

    match connect(addr, Some(&TokenVerifier::encode(SECRET))).await {
        Err(WsError::Http(resp)) => assert_eq!(resp.status().as_u16(), 503),
        other => panic!("expected 503, got {:?}", other.map(|_| ())),
    }
    assert_eq!(server.registry().len().await, 1);
}

#[tokio::test]
async fn client_close_deregisters() {
    let (addr, server) = boot().await;
    let mut ws = subscribe(addr).await;
    assert_eq!(server.registry().len().await, 1);

    ws.close(None).await.unwrap();
    wait_for_subscribers(&server, 0).await;
}

#[tokio::test]
async fn idle_session_is_closed() {
    let config = ServerConfig {
        idle_timeout: Duration::from_millis(300),
        ..ServerConfig::default()
    };
    let (addr, server) = boot_with(config).await;
    let mut ws = subscribe(addr).await;

    let ended = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "idle session was never closed");
    wait_for_subscribers(&server, 0).await;
}

/// A body large enough to fill the socket buffers of a client that never
/// reads.
fn oversized_event() -> String {
    json!({ "data": "x".repeat(16 * 1024 * 1024) }).to_string()
}

fn large_body_config() -> ServerConfig {
    ServerConfig {
        max_body_bytes: 32 * 1024 * 1024,
        ..ServerConfig::default()
    }
}

#[tokio::test]
async fn stalled_reader_is_dropped_after_idle_timeout() {
    let config = ServerConfig {
        idle_timeout: Duration::from_secs(2),
        ..large_body_config()
    };
    let (addr, server) = boot_with(config).await;
    let body = oversized_event();
    let signature = sign(&body);
    let _stalled = subscribe(addr).await;

    assert_eq!(post_event(addr, "alice", &body, Some(signature)).await, 202);
    wait_for_subscribers(&server, 0).await;
}

#[tokio::test]
async fn shutdown_releases_stalled_reader() {
    let (addr, server) = boot_with(large_body_config()).await;
    let body = oversized_event();
    let signature = sign(&body);
    let _stalled = subscribe(addr).await;

    assert_eq!(post_event(addr, "alice", &body, Some(signature)).await, 202);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.registry().len().await, 1);

    server.shutdown().shutdown();
    wait_for_subscribers(&server, 0).await;
}

#[tokio::test]
async fn graceful_shutdown_waits_for_sessions() {
    let (addr, server) = boot().await;
    let mut ws = subscribe(addr).await;
    timeout(TIMEOUT, async {
        while server.shutdown().tasks().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session task never started");

    server
        .shutdown()
        .graceful_shutdown(Vec::new(), TIMEOUT)
        .await;
    assert!(server.shutdown().tasks().is_empty());
    assert_eq!(server.registry().len().await, 0);

    let frame = timeout(TIMEOUT, ws.next()).await.unwrap();
    assert!(matches!(frame, Some(Ok(Message::Close(_)))));
}

#[tokio::test]
async fn shutdown_closes_sessions() {
    let (addr, server) = boot().await;
    let mut ws = subscribe(addr).await;

    server.shutdown().shutdown();

    let frame = timeout(TIMEOUT, ws.next()).await.unwrap();
    assert!(matches!(frame, Some(Ok(Message::Close(_))) | None | Some(Err(_))));
    wait_for_subscribers(&server, 0).await;
}

#[tokio::test]
async fn health_reports_subscribers() {
    let (addr, _server) = boot().await;
    let _ws = subscribe(addr).await;

    let health: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["subscribers"], 1);
}

#[tokio::test]
async fn secret_never_appears_in_logs() {
    let (logs, _guard) = hubrelay_logging::capture_logs();
    let (addr, server) = boot().await;

    let token = TokenVerifier::encode(SECRET);
    let mut ws = subscribe(addr).await;
    let _ = connect(addr, Some(&TokenVerifier::encode("wrong"))).await;

    let body = r#"{"data":{"x":1}}"#;
    let signature = sign(body);
    assert_eq!(post_event(addr, "alice", body, Some(signature.clone())).await, 202);
    assert_eq!(post_event(addr, "alice", body, Some("sha256=00".into())).await, 403);
    let _ = next_json(&mut ws).await;

    ws.close(None).await.unwrap();
    wait_for_subscribers(&server, 0).await;

    assert!(logs.has_message("subscriber connected"));
    assert!(logs.has_message("event relayed"));
    assert_eq!(
        logs.field("subscriber disconnected", "frames_sent").as_deref(),
        Some("1")
    );
    assert!(!logs.contains_anywhere(SECRET));
    assert!(!logs.contains_anywhere(token.trim_start_matches("Basic ")));
    assert!(!logs.contains_anywhere(signature.trim_start_matches("sha256=")));
}
