//! Yuri - Slack data assistant
//!
//! Answers business questions by letting a model write SQL against the
//! company database, remembers short conversations per user, and streams
//! each answer into a single Slack message as it is written. A dedicated
//! out-of-office channel turns time-off announcements into database rows
//! and calendar events.

pub mod agent;
pub mod backend;
pub mod channels;
pub mod config;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod publisher;
pub mod session;
pub mod tools;
pub mod utils;

pub use config::Config;
pub use error::{Result, YuriError};
pub use gateway::{Gateway, Services};
pub use providers::{ChatOptions, ClaudeProvider, Completion, LLMProvider, ToolDefinition};
pub use publisher::StreamingPublisher;
pub use session::{SessionKey, SessionStore, Turn};
