//! Session types for Yuri
//!
//! A conversation is an append-only list of [`Turn`]s. The shapes mirror what
//! the completion service accepts, so a stored history can be replayed to the
//! model verbatim on the next message.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an inbound message came from, for session keying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// One-to-one conversation with the bot
    DirectMessage,
    /// Shared channel; sessions are per user within the channel
    Channel,
}

/// Identifies one conversation memory.
///
/// Rendered as `dm_{user}` for direct messages and `ch_{channel}_{user}` for
/// channels, so two users in the same channel never share history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    /// Build a key from the surface kind, channel id and user id.
    ///
    /// # Example
    /// ```
    /// use yuri::session::{SessionKey, SurfaceKind};
    ///
    /// let dm = SessionKey::new(SurfaceKind::DirectMessage, "D123", "U42");
    /// assert_eq!(dm.as_str(), "dm_U42");
    ///
    /// let ch = SessionKey::new(SurfaceKind::Channel, "C9", "U42");
    /// assert_eq!(ch.as_str(), "ch_C9_U42");
    /// ```
    pub fn new(kind: SurfaceKind, channel: &str, user: &str) -> Self {
        match kind {
            SurfaceKind::DirectMessage => Self(format!("dm_{}", user)),
            SurfaceKind::Channel => Self(format!("ch_{}_{}", channel, user)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque id used to pair the call with its result
    pub id: String,
    /// Tool name
    pub name: String,
    /// Arguments as produced by the model
    pub input: serde_json::Value,
}

impl ToolCall {
    pub fn new(id: &str, name: &str, input: serde_json::Value) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }
    }
}

/// One block of assistant output, kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse(ToolCall),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }
}

/// The outcome of one tool call, correlated by `tool_use_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    /// Whether the tool reported success
    pub success: bool,
    /// Serialized result payload shown to the model
    pub content: String,
}

/// One entry of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    /// Text typed by the human. Always starts a new exchange.
    User { text: String },
    /// Results for every tool call of the preceding assistant turn.
    ToolResults { results: Vec<ToolResultBlock> },
    /// Model output: text segments and tool calls, in order.
    Assistant { blocks: Vec<ContentBlock> },
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Turn::User { text: text.into() }
    }

    pub fn assistant(blocks: Vec<ContentBlock>) -> Self {
        Turn::Assistant { blocks }
    }

    pub fn tool_results(results: Vec<ToolResultBlock>) -> Self {
        Turn::ToolResults { results }
    }

    /// Whether this turn begins an exchange.
    ///
    /// Tool results travel in the user role on the wire but never count.
    pub fn starts_exchange(&self) -> bool {
        matches!(self, Turn::User { .. })
    }

    /// Concatenated text segments of an assistant turn.
    pub fn text(&self) -> String {
        match self {
            Turn::User { text } => text.clone(),
            Turn::Assistant { blocks } => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    ContentBlock::ToolUse(_) => None,
                })
                .collect(),
            Turn::ToolResults { .. } => String::new(),
        }
    }

    /// Tool calls requested by an assistant turn, in order.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        match self {
            Turn::Assistant { blocks } => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse(call) => Some(call),
                    ContentBlock::Text { .. } => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}
