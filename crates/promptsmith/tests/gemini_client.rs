//! GeminiClient against a local stand-in for the generateContent endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use promptsmith::{GeminiClient, GenerationError, TextGenerator};
use serde_json::{Value, json};

#[derive(Default)]
struct Recorded {
    path: Option<String>,
    query: HashMap<String, String>,
    body: Option<Value>,
}

struct FakeEndpoint {
    status: StatusCode,
    reply: String,
    recorded: Mutex<Recorded>,
}

async fn handle(
    State(fake): State<Arc<FakeEndpoint>>,
    Path(model_action): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> (StatusCode, String) {
    let mut recorded = fake.recorded.lock().unwrap();
    recorded.path = Some(model_action);
    recorded.query = query;
    recorded.body = serde_json::from_str(&body).ok();
    (fake.status, fake.reply.clone())
}

async fn spawn_fake(status: StatusCode, reply: Value) -> (Arc<FakeEndpoint>, GeminiClient) {
    let fake = Arc::new(FakeEndpoint {
        status,
        reply: reply.to_string(),
        recorded: Mutex::new(Recorded::default()),
    });
    let router = Router::new()
        .route("/v1beta/models/{model_action}", post(handle))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = GeminiClient::with_endpoint(
        format!("http://{addr}/v1beta/"),
        "gemini-test",
        "test-key",
        Duration::from_secs(5),
    )
    .unwrap();
    (fake, client)
}

#[tokio::test]
async fn sends_single_turn_request_and_extracts_text() {
    let (fake, client) = spawn_fake(
        StatusCode::OK,
        json!({
            "candidates": [{
                "content": {"parts": [{"text": "Write a haiku about tide pools."}], "role": "model"},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 40, "candidatesTokenCount": 8, "totalTokenCount": 48}
        }),
    )
    .await;

    let text = client.generate("the instruction").await.unwrap();
    assert_eq!(text, "Write a haiku about tide pools.");

    let recorded = fake.recorded.lock().unwrap();
    assert_eq!(
        recorded.path.as_deref(),
        Some("gemini-test:generateContent")
    );
    assert_eq!(recorded.query.get("key").map(String::as_str), Some("test-key"));
    assert_eq!(
        recorded.body,
        Some(json!({"contents": [{"parts": [{"text": "the instruction"}]}]}))
    );
}

#[tokio::test]
async fn non_success_status_is_transport_error() {
    let (_fake, client) = spawn_fake(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": {"code": 429, "message": "quota exceeded"}}),
    )
    .await;

    let err = client.generate("x").await.unwrap_err();
    match err {
        GenerationError::Transport { message } => {
            assert!(message.contains("429"), "{message}");
            assert!(message.contains("quota exceeded"), "{message}");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_candidates_is_malformed() {
    let (_fake, client) = spawn_fake(StatusCode::OK, json!({"candidates": []})).await;

    let err = client.generate("x").await.unwrap_err();
    assert!(
        matches!(err, GenerationError::MalformedResponse { .. }),
        "{err:?}"
    );
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = GeminiClient::with_endpoint(
        format!("http://{addr}"),
        "gemini-test",
        "secret-key",
        Duration::from_secs(2),
    )
    .unwrap();

    let err = client.generate("x").await.unwrap_err();
    match err {
        GenerationError::Transport { message } => {
            assert!(!message.contains("secret-key"), "{message}");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}
