//! Providers module - completion services
//!
//! This module defines the `LLMProvider` trait and the types exchanged with
//! it. [`ClaudeProvider`] is the production implementation; tests script
//! their own providers against the same trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use yuri::providers::{ChatOptions, ClaudeProvider, LLMProvider};
//! use yuri::session::Turn;
//!
//! async fn example() {
//!     let provider = ClaudeProvider::new("your-api-key");
//!     let options = ChatOptions::new().with_max_tokens(1000);
//!
//!     let completion = provider
//!         .complete("You are Yuri.", &[Turn::user("Hello!")], &[], &options)
//!         .await
//!         .unwrap();
//!     println!("Response: {}", completion.text_content());
//! }
//! ```

pub mod claude;
pub mod error_classifier;
mod types;

pub use claude::ClaudeProvider;
pub use types::{
    ChatOptions, Completion, LLMProvider, StopReason, StreamEvent, ToolDefinition, Usage,
};
