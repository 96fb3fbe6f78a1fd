//! Operator chat backends
//!
//! With an API key configured, conversations go to an OpenAI-compatible chat
//! completion endpoint. Without one, scripted keyword replies stand in.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ChatConfig;
use crate::errors::{AppError, AppResult};

pub const SYSTEM_PROMPT: &str = "You are Aura-67, a robot assistant. You can help with navigation and object detection tasks.

Currently, the tracking backend is not connected, so you can't scan for objects or navigate automatically. \
However, you can provide guidance on how to use the manual controls and explain what you would do if the tracking system was available.

For manual control, use the WASD keys or the control buttons in the manual tab.
- W: Move forward
- A: Turn left
- S: Move backward
- D: Turn right

When the tracking system is connected, you'll be able to:
- Scan the area for objects like apples, blocks, etc.
- Navigate toward specific targets
- Make decisions about which direction to move based on object detection";

pub const EMPTY_REPLY: &str = "I'm sorry, I couldn't generate a response.";
pub const FAILURE_REPLY: &str =
    "I'm sorry, I encountered an error. Please check your OpenAI API key and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One turn of the conversation sent to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ConversationTurn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
        }
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Produce the robot's reply to the conversation so far
    async fn reply(&self, turns: &[ConversationTurn]) -> AppResult<String>;

    fn name(&self) -> &'static str;
}

/// Pick the backend the configuration allows
pub fn chat_backend_from_config(config: &ChatConfig) -> AppResult<Arc<dyn ChatBackend>> {
    match config.api_key.as_deref().filter(|key| !key.trim().is_empty()) {
        Some(_) => {
            info!(model = %config.model, "Using chat completion backend");
            Ok(Arc::new(OpenAiChatBackend::new(config.clone())?))
        }
        None => {
            info!("No chat API key configured, using scripted replies");
            Ok(Arc::new(ScriptedChatBackend))
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<&'a ConversationTurn>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenAiChatBackend {
    http: Client,
    config: ChatConfig,
    system: ConversationTurn,
}

impl OpenAiChatBackend {
    pub fn new(config: ChatConfig) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::configuration(format!("failed to build chat client: {e}")))?;
        Ok(Self {
            http,
            config,
            system: ConversationTurn::new(TurnRole::System, SYSTEM_PROMPT),
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ChatBackend for OpenAiChatBackend {
    async fn reply(&self, turns: &[ConversationTurn]) -> AppResult<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::configuration("chat API key is not set"))?;

        let request = CompletionRequest {
            model: &self.config.model,
            messages: std::iter::once(&self.system).chain(turns.iter()).collect(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!(turns = turns.len(), model = %self.config.model, "Requesting chat completion");
        let resp = self
            .http
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::external_service(
                "chat",
                format!("HTTP {status}: {body}"),
            ));
        }

        let completion: CompletionResponse = resp.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .unwrap_or_else(|| EMPTY_REPLY.to_string());

        Ok(content)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Keyword-matched canned replies
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptedChatBackend;

impl ScriptedChatBackend {
    pub fn reply_to(text: &str) -> &'static str {
        let text = text.to_lowercase();
        if text.contains("scan") {
            "Scanning surroundings… detected: table, chair, apple 2.3 m ahead."
        } else if text.contains("apple") {
            "Navigating toward the apple using visual detection…"
        } else if text.contains("return") || text.contains("base") {
            "Returning to base. ETA 14s."
        } else if text.contains("avoid") || text.contains("obstacle") {
            "Obstacle avoidance mode activated. Adjusting path."
        } else {
            "Acknowledged. Executing command."
        }
    }
}

#[async_trait]
impl ChatBackend for ScriptedChatBackend {
    async fn reply(&self, turns: &[ConversationTurn]) -> AppResult<String> {
        let last_user = turns
            .iter()
            .rev()
            .find(|turn| turn.role == TurnRole::User)
            .map(|turn| turn.content.as_str())
            .unwrap_or_default();
        Ok(Self::reply_to(last_user).to_string())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
