//! Centralized error handling for the robot console
//!
//! Error types are grouped by the layer that raises them:
//!
//! - **Application Errors**: service and web layer failures (`AppError`)
//! - **Proxy Errors**: upstream stream-server fetch and relay failures (`ProxyError`)
//! - **Playback Errors**: playback controller rejections and client faults (`PlaybackError`)
//!
//! # Usage
//!
//! ```rust
//! use robot_console::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(AppError::validation("url must not be empty"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for stream proxy Results
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Convenience type alias for playback controller Results
pub type PlaybackResult<T> = Result<T, PlaybackError>;
