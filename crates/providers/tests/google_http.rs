//! Drives `GoogleProvider` against an in-process stand-in for the Gemini
//! REST endpoint.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use dq_domain::config::LlmConfig;
use dq_domain::error::Error;
use dq_domain::tool::Message;
use dq_providers::{ChatRequest, GoogleProvider, LlmProvider};
use serde_json::{json, Value};
use tokio::sync::Mutex;

#[derive(Clone, Default)]
struct Seen {
    bodies: Arc<Mutex<Vec<(String, String, Value)>>>,
}

async fn generate(
    State(seen): State<Seen>,
    Path(model_action): Path<String>,
    Query(q): Query<std::collections::HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let key = q.get("key").cloned().unwrap_or_default();
    seen.bodies
        .lock()
        .await
        .push((model_action.clone(), key.clone(), body));
    if key != "good-key" {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"message": "API key not valid"}})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "pong"}]},
                "finishReason": "STOP"
            }]
        })),
    )
}

async fn spawn_fake_gemini() -> (String, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route("/v1beta/models/:model_action", post(generate))
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

fn config(base_url: &str, key: &str) -> LlmConfig {
    LlmConfig {
        google_api_key: Some(key.into()),
        base_url: base_url.into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn chat_round_trip() {
    let (base, seen) = spawn_fake_gemini().await;
    let provider = GoogleProvider::from_config(&config(&base, "good-key")).unwrap();

    let req = ChatRequest::new(vec![Message::system("sys"), Message::user("ping")]);
    let resp = provider.chat(&req).await.unwrap();
    assert_eq!(resp.content, "pong");
    assert_eq!(resp.model, "gemini-2.0-flash");

    let bodies = seen.bodies.lock().await;
    assert_eq!(bodies.len(), 1);
    let (model_action, key, body) = &bodies[0];
    assert_eq!(model_action, "gemini-2.0-flash:generateContent");
    assert_eq!(key, "good-key");
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
    assert_eq!(body["contents"][0]["parts"][0]["text"], "ping");
}

#[tokio::test]
async fn http_error_becomes_provider_error() {
    let (base, _seen) = spawn_fake_gemini().await;
    let provider = GoogleProvider::from_config(&config(&base, "bad-key")).unwrap();

    let err = provider
        .chat(&ChatRequest::new(vec![Message::user("ping")]))
        .await
        .unwrap_err();
    match err {
        Error::Provider { provider, message } => {
            assert_eq!(provider, "google");
            assert!(message.starts_with("HTTP 403"));
            assert!(message.contains("API key not valid"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
