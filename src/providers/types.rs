//! Provider types for Yuri
//!
//! This module defines the core types and traits for completion providers,
//! including the `LLMProvider` trait, chat options, and response types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{Result, YuriError};
use crate::session::{ContentBlock, ToolCall, Turn};

/// Definition of a tool that can be called by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The name of the tool (must be unique)
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    ///
    /// # Example
    /// ```
    /// use yuri::providers::ToolDefinition;
    /// use serde_json::json;
    ///
    /// let tool = ToolDefinition::new(
    ///     "execute_sql",
    ///     "Run a query",
    ///     json!({
    ///         "type": "object",
    ///         "properties": {
    ///             "query": { "type": "string" }
    ///         },
    ///         "required": ["query"]
    ///     }),
    /// );
    /// assert_eq!(tool.name, "execute_sql");
    /// ```
    pub fn new(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Why the model stopped producing output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StopReason {
    /// The model finished its reply
    #[default]
    EndTurn,
    /// The model wants tool results before continuing
    ToolUse,
    /// Output hit `max_tokens`
    MaxTokens,
    /// Anything else the service reports (`stop_sequence`, `refusal`, ...)
    Other(String),
}

impl StopReason {
    /// Parse the wire value of `stop_reason`.
    pub fn from_api(value: &str) -> Self {
        match value {
            "end_turn" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// Token usage information from a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,
    /// Number of tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens used (prompt + completion)
    pub total_tokens: u32,
}

impl Usage {
    /// # Example
    /// ```
    /// use yuri::providers::Usage;
    ///
    /// let usage = Usage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// One model response.
///
/// `blocks` keeps text and tool calls in the order the model produced them,
/// so the assistant turn can be stored and replayed exactly.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    pub blocks: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: Option<Usage>,
}

impl Completion {
    /// A plain text reply.
    ///
    /// # Example
    /// ```
    /// use yuri::providers::Completion;
    ///
    /// let c = Completion::text("Hello!");
    /// assert_eq!(c.text_content(), "Hello!");
    /// assert!(!c.has_tool_calls());
    /// ```
    pub fn text(content: &str) -> Self {
        Self {
            blocks: vec![ContentBlock::text(content)],
            stop_reason: StopReason::EndTurn,
            usage: None,
        }
    }

    /// A reply that requests tools, with optional leading text.
    pub fn with_tools(content: &str, calls: Vec<ToolCall>) -> Self {
        let mut blocks = Vec::with_capacity(calls.len() + 1);
        if !content.is_empty() {
            blocks.push(ContentBlock::text(content));
        }
        blocks.extend(calls.into_iter().map(ContentBlock::ToolUse));
        Self {
            blocks,
            stop_reason: StopReason::ToolUse,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Text segments joined in order.
    pub fn text_content(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::ToolUse(_) => None,
            })
            .collect()
    }

    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse(call) => Some(call),
                ContentBlock::Text { .. } => None,
            })
            .collect()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.blocks
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolUse(_)))
    }

    /// The assistant turn to append to the conversation.
    pub fn to_turn(&self) -> Turn {
        Turn::assistant(self.blocks.clone())
    }
}

/// Events emitted by [`LLMProvider::complete_stream`].
#[derive(Debug)]
pub enum StreamEvent {
    /// A fragment of reply text, in order
    Delta(String),
    /// The full response, assembled. Always the last event on success.
    Done(Completion),
    /// The stream failed part way; no `Done` follows
    Error(YuriError),
}

/// Options for completion requests.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    pub temperature: Option<f32>,
}

impl ChatOptions {
    /// # Example
    /// ```
    /// use yuri::providers::ChatOptions;
    ///
    /// let options = ChatOptions::new().with_max_tokens(4096).with_temperature(0.0);
    /// assert_eq!(options.max_tokens, Some(4096));
    /// assert_eq!(options.temperature, Some(0.0));
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Trait for completion providers.
///
/// The provider translates the conversation into its wire format. The system
/// prompt travels separately from the turns.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Request one complete response.
    async fn complete(
        &self,
        system: &str,
        turns: &[Turn],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<Completion>;

    /// Request a response as a stream of text fragments.
    ///
    /// The default falls back to [`complete`](Self::complete) and emits the
    /// whole text as a single delta before `Done`.
    async fn complete_stream(
        &self,
        system: &str,
        turns: &[Turn],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let completion = self.complete(system, turns, tools, options).await?;
        let (tx, rx) = mpsc::channel(2);
        let text = completion.text_content();
        if !text.is_empty() {
            let _ = tx.send(StreamEvent::Delta(text)).await;
        }
        let _ = tx.send(StreamEvent::Done(completion)).await;
        Ok(rx)
    }

    /// Model identifier sent with each request.
    fn default_model(&self) -> &str;

    /// Provider name (e.g., "claude").
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Canned(Completion);

    #[async_trait]
    impl LLMProvider for Canned {
        async fn complete(
            &self,
            _system: &str,
            _turns: &[Turn],
            _tools: &[ToolDefinition],
            _options: &ChatOptions,
        ) -> Result<Completion> {
            Ok(self.0.clone())
        }

        fn default_model(&self) -> &str {
            "canned"
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    #[test]
    fn test_stop_reason_from_api() {
        assert_eq!(StopReason::from_api("tool_use"), StopReason::ToolUse);
        assert_eq!(StopReason::from_api("end_turn"), StopReason::EndTurn);
        assert_eq!(StopReason::from_api("max_tokens"), StopReason::MaxTokens);
        assert_eq!(
            StopReason::from_api("refusal"),
            StopReason::Other("refusal".into())
        );
    }

    #[test]
    fn test_completion_with_tools_keeps_order() {
        let c = Completion::with_tools(
            "Let me check.",
            vec![ToolCall::new("t1", "execute_sql", json!({"query": "SELECT 1"}))],
        );
        assert!(c.has_tool_calls());
        assert_eq!(c.text_content(), "Let me check.");
        assert_eq!(c.tool_calls()[0].id, "t1");
        assert!(matches!(c.blocks[0], ContentBlock::Text { .. }));
        assert_eq!(c.stop_reason, StopReason::ToolUse);
    }

    #[test]
    fn test_completion_to_turn() {
        let turn = Completion::text("done").to_turn();
        assert_eq!(turn.text(), "done");
        assert!(!turn.starts_exchange());
    }

    #[tokio::test]
    async fn test_default_stream_falls_back_to_complete() {
        let provider = Canned(Completion::text("Shipped on March 3."));
        let mut rx = provider
            .complete_stream("sys", &[Turn::user("hi")], &[], &ChatOptions::new())
            .await
            .unwrap();

        match rx.recv().await {
            Some(StreamEvent::Delta(text)) => assert_eq!(text, "Shipped on March 3."),
            other => panic!("expected delta, got {:?}", other),
        }
        match rx.recv().await {
            Some(StreamEvent::Done(c)) => assert_eq!(c.text_content(), "Shipped on March 3."),
            other => panic!("expected done, got {:?}", other),
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_default_stream_skips_empty_delta() {
        let provider = Canned(Completion::with_tools(
            "",
            vec![ToolCall::new("t1", "execute_sql", json!({}))],
        ));
        let mut rx = provider
            .complete_stream("sys", &[], &[], &ChatOptions::new())
            .await
            .unwrap();
        assert!(matches!(rx.recv().await, Some(StreamEvent::Done(_))));
    }
}
