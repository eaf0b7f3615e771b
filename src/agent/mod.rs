//! Agent module - conversation logic
//!
//! The agent is responsible for:
//!
//! - Building the system prompt for each conversation kind
//! - Prefixing user messages with who sent them
//! - Calling the completion provider and executing the tools it requests
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Gateway   │────>│  AgentLoop  │────>│ LLMProvider │
//! │  (events)   │     │             │     │  (Claude)   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │                   │
//!        ▼                   ▼
//! ┌─────────────┐     ┌─────────────┐
//! │   Session   │     │    Tools    │
//! │    Store    │     │  Registry   │
//! └─────────────┘     └─────────────┘
//! ```

mod context;
mod r#loop;
pub mod prompts;

pub use context::{contextual_message, user_context, week_dates, PromptBuilder, UserIdentity};
pub use r#loop::{AgentLoop, AgentOutcome, StreamSink, EMPTY_REPLY_FALLBACK};
