//! Console state persisted across restarts
//!
//! One JSON document holds the last stream URL and the chat history. A
//! missing file means first run; callers supply the defaults.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strum::Display;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::AppResult;
use crate::playback::StreamUrlStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatRole {
    User,
    Robot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub text: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConsoleState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stream_url: Option<String>,
    #[serde(default)]
    chat_messages: Vec<ChatMessage>,
}

#[derive(Debug)]
pub struct ConsoleStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ConsoleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_state(&self) -> AppResult<ConsoleState> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ConsoleState::default());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&contents) {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable console state");
                Ok(ConsoleState::default())
            }
        }
    }

    async fn write_state(&self, state: &ConsoleState) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_vec_pretty(state)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        debug!(path = %self.path.display(), "Saved console state");
        Ok(())
    }

    async fn update<F>(&self, apply: F) -> AppResult<()>
    where
        F: FnOnce(&mut ConsoleState),
    {
        let _guard = self.write_lock.lock().await;
        let mut state = self.read_state().await?;
        apply(&mut state);
        self.write_state(&state).await
    }

    /// Stored stream URL, or `default` on first run
    pub async fn load_stream_url(&self, default: &str) -> AppResult<String> {
        Ok(self
            .read_state()
            .await?
            .stream_url
            .unwrap_or_else(|| default.to_string()))
    }

    pub async fn save_stream_url(&self, url: &str) -> AppResult<()> {
        let url = url.to_string();
        self.update(move |state| state.stream_url = Some(url)).await
    }

    pub async fn load_chat(&self) -> AppResult<Vec<ChatMessage>> {
        Ok(self.read_state().await?.chat_messages)
    }

    pub async fn append_chat(&self, messages: Vec<ChatMessage>) -> AppResult<()> {
        self.update(move |state| state.chat_messages.extend(messages))
            .await
    }

    pub async fn clear_chat(&self) -> AppResult<()> {
        self.update(|state| state.chat_messages.clear()).await
    }
}

#[async_trait]
impl StreamUrlStore for ConsoleStore {
    async fn save_stream_url(&self, url: &str) -> AppResult<()> {
        ConsoleStore::save_stream_url(self, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ConsoleStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ConsoleStore::new(dir.path().join("state").join("console.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_first_run_uses_caller_defaults() {
        let (_dir, store) = store();
        assert_eq!(
            store.load_stream_url("https://example.com/a.m3u8").await.unwrap(),
            "https://example.com/a.m3u8"
        );
        assert!(store.load_chat().await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_stream_url_and_chat_persist_independently() {
        let (_dir, store) = store();
        store.save_stream_url("/api/stream/live/index.m3u8").await.unwrap();
        store
            .append_chat(vec![
                ChatMessage::new(ChatRole::User, "scan the room"),
                ChatMessage::new(ChatRole::Robot, "Scanning now."),
            ])
            .await
            .unwrap();

        let reopened = ConsoleStore::new(store.path());
        assert_eq!(
            reopened.load_stream_url("unused").await.unwrap(),
            "/api/stream/live/index.m3u8"
        );
        let chat = reopened.load_chat().await.unwrap();
        assert_eq!(chat.len(), 2);
        assert_eq!(chat[0].role, ChatRole::User);
        assert_eq!(chat[1].text, "Scanning now.");

        reopened.clear_chat().await.unwrap();
        assert!(reopened.load_chat().await.unwrap().is_empty());
        assert_eq!(
            reopened.load_stream_url("unused").await.unwrap(),
            "/api/stream/live/index.m3u8"
        );
    }

    #[tokio::test]
    async fn test_corrupt_state_falls_back_to_defaults() {
        let (_dir, store) = store();
        tokio::fs::create_dir_all(store.path().parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(store.path(), b"{not json").await.unwrap();

        assert_eq!(store.load_stream_url("fallback").await.unwrap(), "fallback");
    }

    #[test]
    fn test_chat_message_json_shape() {
        let message = ChatMessage::new(ChatRole::Robot, "Acknowledged.");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "robot");
        assert!(json["timestamp"].as_i64().unwrap() > 0);
        assert_eq!(ChatRole::User.to_string(), "user");
    }
}
