//! Manual drive commands
//!
//! The robot's command API is not wired up yet, so the only backend records
//! the command and acknowledges it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::info;

use crate::errors::{AppError, AppResult};

pub const INVALID_DIRECTION_MESSAGE: &str = "direction must be one of w,a,s,d";
pub const DEFAULT_SPEED: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum Direction {
    #[serde(rename = "w")]
    #[strum(serialize = "w")]
    Forward,
    #[serde(rename = "a")]
    #[strum(serialize = "a")]
    Left,
    #[serde(rename = "s")]
    #[strum(serialize = "s")]
    Backward,
    #[serde(rename = "d")]
    #[strum(serialize = "d")]
    Right,
}

impl Direction {
    /// Key label shown back to the operator
    pub fn key(self) -> char {
        match self {
            Self::Forward => 'W',
            Self::Left => 'A',
            Self::Backward => 'S',
            Self::Right => 'D',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriveCommand {
    pub direction: Direction,
    #[serde(default = "default_speed")]
    pub speed: f64,
}

fn default_speed() -> f64 {
    DEFAULT_SPEED
}

impl DriveCommand {
    /// Build a command from loosely typed request fields
    pub fn parse(direction: Option<&str>, speed: Option<f64>) -> AppResult<Self> {
        let direction = direction
            .and_then(|d| d.parse::<Direction>().ok())
            .ok_or_else(|| AppError::validation(INVALID_DIRECTION_MESSAGE))?;
        let speed = speed.unwrap_or(DEFAULT_SPEED);
        if !speed.is_finite() || speed < 0.0 {
            return Err(AppError::validation("speed must be a non-negative number"));
        }
        Ok(Self { direction, speed })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandReceipt {
    pub accepted: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CommandReceipt {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
            note: None,
        }
    }
}

#[async_trait]
pub trait RobotCommandBackend: Send + Sync {
    async fn drive(&self, command: DriveCommand) -> AppResult<CommandReceipt>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRobotBackend;

#[async_trait]
impl RobotCommandBackend for LoggingRobotBackend {
    async fn drive(&self, command: DriveCommand) -> AppResult<CommandReceipt> {
        info!(
            direction = %command.direction,
            speed = command.speed,
            "Manual control command"
        );
        Ok(CommandReceipt {
            accepted: true,
            message: format!(
                "Command received: {} at speed {}",
                command.direction.key(),
                command.speed
            ),
            note: Some("Tracking backend not connected - command logged only".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("w", Direction::Forward)]
    #[case("a", Direction::Left)]
    #[case("s", Direction::Backward)]
    #[case("d", Direction::Right)]
    fn test_direction_codes(#[case] code: &str, #[case] expected: Direction) {
        assert_eq!(code.parse::<Direction>().unwrap(), expected);
        assert_eq!(expected.to_string(), code);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("x"))]
    #[case(Some("W"))]
    #[case(Some("wa"))]
    fn test_invalid_directions(#[case] direction: Option<&str>) {
        let err = DriveCommand::parse(direction, None).unwrap_err();
        assert_eq!(err.to_string(), format!("Validation error: {INVALID_DIRECTION_MESSAGE}"));
    }

    #[tokio::test]
    async fn test_logging_backend_receipt() {
        let command = DriveCommand::parse(Some("w"), None).unwrap();
        let receipt = LoggingRobotBackend.drive(command).await.unwrap();
        assert!(receipt.accepted);
        assert_eq!(receipt.message, "Command received: W at speed 1");
        assert!(receipt.note.is_some());

        let command = DriveCommand::parse(Some("d"), Some(0.5)).unwrap();
        let receipt = LoggingRobotBackend.drive(command).await.unwrap();
        assert_eq!(receipt.message, "Command received: D at speed 0.5");
    }
}
