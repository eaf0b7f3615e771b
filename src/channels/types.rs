//! Messaging surface trait and inbound event types
//!
//! The gateway talks to chat platforms only through [`MessagingSurface`],
//! and receives work only as [`InboundEvent`]s. Slack is the production
//! implementation; tests use in-memory surfaces.

use async_trait::async_trait;

use crate::agent::UserIdentity;
use crate::error::Result;

/// Outbound operations the assistant needs from a chat platform.
///
/// # Example Implementation
///
/// ```ignore
/// use async_trait::async_trait;
/// use yuri::agent::UserIdentity;
/// use yuri::channels::MessagingSurface;
/// use yuri::error::Result;
///
/// struct Console;
///
/// #[async_trait]
/// impl MessagingSurface for Console {
///     async fn post(&self, channel: &str, text: &str, _thread: Option<&str>) -> Result<String> {
///         println!("[{}] {}", channel, text);
///         Ok("1".into())
///     }
///
///     async fn edit(&self, _channel: &str, _id: &str, text: &str) -> Result<()> {
///         println!("(edit) {}", text);
///         Ok(())
///     }
///
///     async fn user_identity(&self, user_id: &str) -> Result<UserIdentity> {
///         Ok(UserIdentity::new(user_id, "console", None))
///     }
/// }
/// ```
#[async_trait]
pub trait MessagingSurface: Send + Sync {
    /// Post a new message, optionally as a thread reply. Returns its id.
    async fn post(&self, channel: &str, text: &str, thread_id: Option<&str>) -> Result<String>;

    /// Replace the text of a message previously posted by the bot.
    async fn edit(&self, channel: &str, message_id: &str, text: &str) -> Result<()>;

    /// Resolve a user's display name and email.
    async fn user_identity(&self, user_id: &str) -> Result<UserIdentity>;
}

/// How the bot was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The bot was @-mentioned; mention tokens are already stripped from `text`
    Mention,
    /// A plain message (DM, or a post in a monitored channel)
    Message,
}

/// A user message delivered to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub kind: EventKind,
    pub user_id: String,
    pub channel: String,
    /// Platform channel type, `"im"` for direct messages
    pub channel_type: Option<String>,
    pub text: String,
    /// Id of the triggering message, used for thread replies
    pub message_id: Option<String>,
}

impl InboundEvent {
    pub fn mention(user_id: &str, channel: &str, text: &str) -> Self {
        Self {
            kind: EventKind::Mention,
            user_id: user_id.to_string(),
            channel: channel.to_string(),
            channel_type: None,
            text: text.to_string(),
            message_id: None,
        }
    }

    pub fn message(user_id: &str, channel: &str, text: &str) -> Self {
        Self {
            kind: EventKind::Message,
            ..Self::mention(user_id, channel, text)
        }
    }

    pub fn with_channel_type(mut self, channel_type: &str) -> Self {
        self.channel_type = Some(channel_type.to_string());
        self
    }

    pub fn with_message_id(mut self, id: &str) -> Self {
        self.message_id = Some(id.to_string());
        self
    }

    /// Whether this arrived in a one-to-one conversation.
    ///
    /// # Example
    /// ```
    /// use yuri::channels::InboundEvent;
    ///
    /// let dm = InboundEvent::message("U1", "D1", "hi").with_channel_type("im");
    /// assert!(dm.is_direct());
    /// assert!(!InboundEvent::mention("U1", "C1", "hi").is_direct());
    /// ```
    pub fn is_direct(&self) -> bool {
        self.channel_type.as_deref() == Some("im")
    }
}
