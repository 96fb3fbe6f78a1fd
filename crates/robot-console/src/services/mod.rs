//! Collaborators behind the operator-facing endpoints

pub mod chat;
pub mod robot;
pub mod storage;

pub use chat::{
    ChatBackend, ConversationTurn, OpenAiChatBackend, ScriptedChatBackend, TurnRole,
    chat_backend_from_config,
};
pub use robot::{CommandReceipt, Direction, DriveCommand, LoggingRobotBackend, RobotCommandBackend};
pub use storage::{ChatMessage, ChatRole, ConsoleStore};
