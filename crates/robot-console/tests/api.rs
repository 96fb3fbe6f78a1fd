//! Operator API endpoint tests

use async_trait::async_trait;
use axum::http::{StatusCode, header};
use axum_test::TestServer;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;

use robot_console::{
    config::Config,
    errors::{AppError, AppResult},
    services::{
        ChatBackend, CommandReceipt, ConversationTurn, DriveCommand, RobotCommandBackend,
        ScriptedChatBackend,
    },
    web::{AppState, create_router},
};

struct FailingChat;

#[async_trait]
impl ChatBackend for FailingChat {
    async fn reply(&self, _turns: &[ConversationTurn]) -> AppResult<String> {
        Err(AppError::external_service("chat", "invalid API key"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

struct UnreachableRobot;

#[async_trait]
impl RobotCommandBackend for UnreachableRobot {
    async fn drive(&self, _command: DriveCommand) -> AppResult<CommandReceipt> {
        Err(AppError::external_service("robot", "connection refused"))
    }
}

fn test_config(data_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.upstream.base_url = "http://robot.local:8000".to_string();
    config.storage.state_file = data_dir.path().join("state.json");
    config.chat.api_key = None;
    config
}

fn server_with(configure: impl FnOnce(AppState) -> AppState) -> (TestServer, TempDir) {
    let data_dir = TempDir::new().expect("temp dir");
    let state = AppState::from_config(test_config(&data_dir)).expect("app state");
    let server = TestServer::new(create_router(configure(state))).expect("test server");
    (server, data_dir)
}

fn server() -> (TestServer, TempDir) {
    server_with(|state| state.with_chat_backend(Arc::new(ScriptedChatBackend)))
}

#[tokio::test]
async fn test_health_check() {
    let (server, _data) = server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["upstream"], "http://robot.local:8000");
    assert_eq!(body["data"]["chat_backend"], "scripted");
}

#[tokio::test]
async fn test_chat_replies_in_plain_text_and_records_history() {
    let (server, _data) = server();

    let response = server
        .post("/api/chat")
        .json(&json!({
            "messages": [{ "role": "user", "content": "scan the room" }]
        }))
        .await;

    response.assert_status_ok();
    assert!(
        response
            .header(header::CONTENT_TYPE)
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    assert!(response.text().starts_with("Scanning surroundings"));

    let history: Value = server.get("/api/chat/history").await.json();
    let messages = history["data"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["text"], "scan the room");
    assert_eq!(messages[1]["role"], "robot");

    server.delete("/api/chat/history").await.assert_status_ok();
    let history: Value = server.get("/api/chat/history").await.json();
    assert!(history["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_backend_failure_returns_apology() {
    let (server, _data) = server_with(|state| state.with_chat_backend(Arc::new(FailingChat)));

    let response = server
        .post("/api/chat")
        .json(&json!({ "messages": [{ "role": "user", "content": "hello" }] }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.text(),
        "I'm sorry, I encountered an error. Please check your OpenAI API key and try again."
    );
}

#[tokio::test]
async fn test_manual_control_accepts_wasd() {
    let (server, _data) = server();

    let response = server
        .post("/api/manual")
        .json(&json!({ "direction": "w", "speed": 1 }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["accepted"], true);
    assert_eq!(body["message"], "Command received: W at speed 1");
    assert_eq!(
        body["note"],
        "Tracking backend not connected - command logged only"
    );
}

#[tokio::test]
async fn test_manual_control_backend_failure_is_internal_error() {
    let (server, _data) = server_with(|state| state.with_robot_backend(Arc::new(UnreachableRobot)));

    let response = server
        .post("/api/manual")
        .json(&json!({ "direction": "d", "speed": 0.5 }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["accepted"], false);
    assert_eq!(body["message"], "Internal server error");
    assert!(body.get("note").is_none());
}

#[tokio::test]
async fn test_manual_control_rejects_bad_direction() {
    let (server, _data) = server();

    for payload in [
        json!({ "direction": "x" }),
        json!({ "direction": "wa" }),
        json!({ "speed": 2 }),
    ] {
        let response = server.post("/api/manual").json(&payload).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["accepted"], false);
        assert_eq!(body["message"], "direction must be one of w,a,s,d");
    }
}

#[tokio::test]
async fn test_manual_control_rejects_malformed_body() {
    let (server, _data) = server();

    let response = server
        .post("/api/manual")
        .content_type("application/json")
        .text("{not json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["accepted"], false);
}

#[tokio::test]
async fn test_stream_url_setting_defaults_and_updates() {
    let (server, _data) = server();

    let initial: Value = server.get("/api/settings/stream-url").await.json();
    assert_eq!(
        initial["data"]["url"],
        "https://test-streams.mux.dev/x36xhzz/x36xhzz.m3u8"
    );
    assert_eq!(initial["data"]["proxied"], false);

    let response = server
        .put("/api/settings/stream-url")
        .json(&json!({ "url": "http://robot.local:8000/live/index.m3u8" }))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert_eq!(updated["data"]["url"], "/api/stream/live/index.m3u8");
    assert_eq!(updated["data"]["proxied"], true);
    assert_eq!(
        updated["data"]["display_url"],
        "http://robot.local:8000/live/index.m3u8 (proxied)"
    );

    let stored: Value = server.get("/api/settings/stream-url").await.json();
    assert_eq!(stored["data"]["url"], "/api/stream/live/index.m3u8");
}

#[tokio::test]
async fn test_stream_url_setting_rejects_blank() {
    let (server, _data) = server();

    let response = server
        .put("/api/settings/stream-url")
        .json(&json!({ "url": "  " }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
}
