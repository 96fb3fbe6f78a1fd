//! Operator chat HTTP handlers

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{error, warn};

use crate::services::chat::FAILURE_REPLY;
use crate::services::{ChatMessage, ChatRole, ConversationTurn, TurnRole};
use crate::web::AppState;
use crate::web::responses::handle_result;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ConversationTurn>,
}

/// `POST /api/chat`: plain-text reply from the chat backend
pub async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    match state.chat.reply(&request.messages).await {
        Ok(reply) => {
            record_exchange(&state, &request.messages, &reply).await;
            (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_PLAIN)], reply).into_response()
        }
        Err(e) => {
            error!(backend = state.chat.name(), error = %e, "Chat backend failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, TEXT_PLAIN)],
                FAILURE_REPLY,
            )
                .into_response()
        }
    }
}

async fn record_exchange(state: &AppState, turns: &[ConversationTurn], reply: &str) {
    let mut messages = Vec::with_capacity(2);
    if let Some(last) = turns.last().filter(|turn| turn.role == TurnRole::User) {
        messages.push(ChatMessage::new(ChatRole::User, last.content.clone()));
    }
    messages.push(ChatMessage::new(ChatRole::Robot, reply));

    if let Err(e) = state.store.append_chat(messages).await {
        warn!(error = %e, "Failed to record chat history");
    }
}

/// `GET /api/chat/history`
pub async fn history(State(state): State<AppState>) -> Response {
    handle_result(state.store.load_chat().await)
}

/// `DELETE /api/chat/history`
pub async fn clear_history(State(state): State<AppState>) -> Response {
    handle_result(
        state
            .store
            .clear_chat()
            .await
            .map(|_| serde_json::json!({ "cleared": true })),
    )
}
