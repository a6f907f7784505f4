//! Integration tests for the HTTP API against a live server.
//!
//! Each test binds a real listener, serves the router with `axum::serve` and
//! talks to it over HTTP with `reqwest`.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use techtales_orchestrator::{
    create_router, AppState, Config, LessonOrchestrator, MemoryLessonStore, Reply, ScriptedModel,
    TextAdapter, SERVICE_BANNER,
};

const STORY: &str = "A router is like a postal sorting office.\n\
```json\n[\"Network nodes forwarding a packet\", \"A routing table in storage\"]\n```";

const QUIZ: &str = r#"[
  {"question": "What does a router forward?", "options": ["Packets", "Letters", "Songs", "Pictures"], "correct_answer": "Packets", "explanation": "Routers move packets."},
  {"question": "Where are routes kept?", "options": ["A routing table", "A shoe box", "A poem", "A cloud"], "correct_answer": "A routing table", "explanation": "Routes live in a table."}
]"#;

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Spawns a server answering with `replies` and returns its base URL.
async fn spawn_test_server(replies: Vec<Reply>) -> (String, tokio::task::JoinHandle<()>) {
    let mut config = Config::default();
    config.request_timeout_seconds = 1;
    config.lesson.quiz_question_count = 2;

    let model = Arc::new(ScriptedModel::new(replies));
    let orchestrator = LessonOrchestrator::new(
        TextAdapter::new(model),
        Arc::new(MemoryLessonStore::new()),
        &config,
    );
    let router = create_router(AppState::new(config, orchestrator));

    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://{addr}/api"), handle)
}

async fn generate(client: &reqwest::Client, base: &str, body: Value) -> reqwest::Response {
    client
        .post(format!("{base}/generate-lesson"))
        .json(&body)
        .send()
        .await
        .expect("Request failed")
}

#[tokio::test]
async fn test_banner() {
    let (base, handle) = spawn_test_server(vec![Reply::text(STORY)]).await;

    let response = reqwest::get(format!("{base}/")).await.expect("Request failed");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(body["message"], SERVICE_BANNER);

    handle.abort();
}

#[tokio::test]
async fn test_generate_then_fetch_lesson() {
    let (base, handle) =
        spawn_test_server(vec![Reply::text(STORY), Reply::text(QUIZ)]).await;
    let client = reqwest::Client::new();

    let response = generate(
        &client,
        &base,
        json!({"topic": "Routers", "age_group": "child", "difficulty": "beginner"}),
    )
    .await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let lesson: Value = response.json().await.expect("Invalid JSON");
    let id = lesson["id"].as_str().expect("lesson id").to_string();
    assert_eq!(lesson["topic"], "Routers");
    assert_eq!(lesson["age_group"], "child");
    assert_eq!(lesson["visual_cues"].as_array().map(Vec::len), Some(2));
    assert_eq!(lesson["images"].as_array().map(Vec::len), Some(2));
    assert_eq!(lesson["quiz"].as_array().map(Vec::len), Some(2));
    assert!(lesson["images"][0]
        .as_str()
        .is_some_and(|image| image.starts_with("iVBORw0KGgo")));
    assert!(lesson["created_at"].is_string());

    let listed: Value = client
        .get(format!("{base}/lessons"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["id"], id.as_str());

    let fetched = client
        .get(format!("{base}/lessons/{id}"))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(fetched.status(), reqwest::StatusCode::OK);
    let fetched: Value = fetched.json().await.expect("Invalid JSON");
    assert_eq!(fetched, lesson);

    handle.abort();
}

#[tokio::test]
async fn test_invalid_request_is_bad_request() {
    let (base, handle) = spawn_test_server(vec![Reply::text(STORY)]).await;
    let client = reqwest::Client::new();

    let response = generate(
        &client,
        &base,
        json!({"topic": "Routers", "age_group": "grandparent", "difficulty": "beginner"}),
    )
    .await;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("Invalid JSON");
    assert!(body["error"]
        .as_str()
        .is_some_and(|error| error.contains("age_group")));

    handle.abort();
}

#[tokio::test]
async fn test_story_failure_is_bad_gateway() {
    let (base, handle) = spawn_test_server(vec![Reply::Hang]).await;
    let client = reqwest::Client::new();

    let response = generate(
        &client,
        &base,
        json!({"topic": "Routers", "age_group": "teen", "difficulty": "advanced"}),
    )
    .await;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);

    let listed: Value = client
        .get(format!("{base}/lessons"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(listed, json!([]));

    handle.abort();
}

#[tokio::test]
async fn test_unknown_lesson_is_not_found() {
    let (base, handle) = spawn_test_server(vec![Reply::text(STORY)]).await;

    let response = reqwest::get(format!("{base}/lessons/does-not-exist"))
        .await
        .expect("Request failed");
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = response.json().await.expect("Invalid JSON");
    assert!(body["error"].is_string());

    handle.abort();
}

#[tokio::test]
async fn test_cors_allows_other_origins() {
    let (base, handle) = spawn_test_server(vec![Reply::text(STORY)]).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{base}/"))
        .header("Origin", "http://localhost:3000")
        .send()
        .await
        .expect("Request failed");
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|value| value.to_str().ok()),
        Some("*")
    );

    handle.abort();
}
