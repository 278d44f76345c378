/*
[INPUT]:  Scripted responder closures
[OUTPUT]: In-process WebSocket server that records requests and replies
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for deriv-trader-adapter tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use deriv_trader_adapter::ClientConfig;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Responder output that makes the server close the socket
pub const CLOSE_MARKER: &str = "__close__";

/// Responder output `{DELAY_MARKER: ms}` pauses before the next reply
pub const DELAY_MARKER: &str = "__delay_ms__";

pub struct MockServer {
    pub endpoint: String,
    received: Arc<Mutex<Vec<Value>>>,
}

impl MockServer {
    /// Requests received so far, across all connections
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.endpoint.clone(),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            ..ClientConfig::default()
        }
    }
}

/// Start a server that answers every text frame with `responder(request)`
pub async fn spawn_mock_server<F>(responder: F) -> MockServer
where
    F: Fn(&Value) -> Vec<Value> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let responder = Arc::new(responder);

    let recorded = received.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let responder = responder.clone();
            let recorded = recorded.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    let text = match message {
                        Message::Text(text) => text.to_string(),
                        Message::Close(_) => break,
                        _ => continue,
                    };
                    let request: Value = serde_json::from_str(&text).unwrap();
                    recorded.lock().unwrap().push(request.clone());

                    for reply in responder(&request) {
                        if reply.get(CLOSE_MARKER).is_some() {
                            let _ = ws.close(None).await;
                            return;
                        }
                        if let Some(ms) = reply.get(DELAY_MARKER).and_then(Value::as_u64) {
                            tokio::time::sleep(Duration::from_millis(ms)).await;
                            continue;
                        }
                        if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });

    MockServer {
        endpoint: format!("ws://{addr}"),
        received,
    }
}

/// Copy the request's `req_id` into `body`
pub fn reply_to(request: &Value, mut body: Value) -> Value {
    if let (Some(req_id), Value::Object(map)) = (request.get("req_id").cloned(), &mut body) {
        map.insert("req_id".to_string(), req_id);
    }
    body
}

/// Behaves like the live service for the calls the client makes
pub fn deriv_responder(request: &Value) -> Vec<Value> {
    if let Some(token) = request.get("authorize") {
        if token == "T1" {
            return vec![reply_to(
                request,
                json!({
                    "msg_type": "authorize",
                    "authorize": {"loginid": "VRTC100", "currency": "USD", "balance": 100, "is_virtual": 1}
                }),
            )];
        }
        return vec![reply_to(
            request,
            json!({
                "msg_type": "authorize",
                "error": {"code": "InvalidToken", "message": "The token is invalid."}
            }),
        )];
    }
    if request.get("balance").is_some() {
        return vec![reply_to(request, json!({"msg_type": "balance", "balance": {"balance": 100}}))];
    }
    if request.get("buy").is_some() {
        return vec![reply_to(request, json!({"msg_type": "buy", "buy": {"contract_id": "C1"}}))];
    }
    if request.get("ping").is_some() {
        return vec![reply_to(request, json!({"msg_type": "ping", "ping": "pong"}))];
    }
    Vec::new()
}

/// Address nothing listens on
pub async fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}")
}
