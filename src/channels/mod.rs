//! Channels module - the chat surfaces Yuri talks through
//!
//! Slack is the only production surface. It delivers [`InboundEvent`]s over
//! Socket Mode and implements [`MessagingSurface`] for posting and editing.
//!
//! ```text
//! Slack Socket Mode ──> InboundEvent ──> Gateway
//!                                           │
//! Slack Web API <──── MessagingSurface <────┘
//! ```

pub mod slack;
mod slack_markdown;
mod types;

pub use slack::SlackChannel;
pub use slack_markdown::{format_for_slack, strip_mentions};
pub use types::{EventKind, InboundEvent, MessagingSurface};
