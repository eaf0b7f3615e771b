//! Claude (Anthropic) provider implementation
//!
//! This module implements the `LLMProvider` trait for Anthropic's Messages API,
//! handling turn conversion, tool calls, SSE streaming, and response parsing.
//!
//! # Example
//!
//! ```rust,ignore
//! use yuri::providers::{claude::ClaudeProvider, ChatOptions, LLMProvider};
//! use yuri::session::Turn;
//!
//! async fn example() {
//!     let provider = ClaudeProvider::new("your-api-key");
//!     let turns = vec![Turn::user("Hello!")];
//!
//!     let completion = provider
//!         .complete("You are Yuri.", &turns, &[], &ChatOptions::default())
//!         .await
//!         .unwrap();
//!
//!     println!("Claude: {}", completion.text_content());
//! }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::{Config, DEFAULT_MODEL};
use crate::error::{ProviderError, Result, YuriError};
use crate::session::{ContentBlock, ToolCall, Turn};

use super::error_classifier::{classify_error_message, classify_status};
use super::{ChatOptions, Completion, LLMProvider, StopReason, StreamEvent, ToolDefinition, Usage};

/// Default API base; `/v1/messages` is appended.
const CLAUDE_API_BASE: &str = "https://api.anthropic.com";

/// The Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Used when the caller leaves `max_tokens` unset.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Whole-request timeout for non-streamed completions.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Claude/Anthropic completion provider.
pub struct ClaudeProvider {
    /// API key for authentication
    api_key: String,
    /// Model sent with each request
    model: String,
    /// Base URL, without the `/v1/messages` suffix
    api_base: String,
    /// HTTP client for making requests
    client: Client,
}

impl ClaudeProvider {
    /// Create a new Claude provider with the given API key.
    ///
    /// # Example
    /// ```
    /// use yuri::providers::claude::ClaudeProvider;
    /// use yuri::providers::LLMProvider;
    ///
    /// let provider = ClaudeProvider::new("sk-ant-api03-xxx");
    /// assert_eq!(provider.name(), "claude");
    /// assert_eq!(provider.default_model(), "claude-sonnet-4-20250514");
    /// ```
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_base: CLAUDE_API_BASE.to_string(),
            client: Client::builder()
                .connect_timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Build from the loaded config: key, optional base URL and model.
    pub fn from_config(config: &Config) -> Self {
        let api_key = config
            .providers
            .anthropic
            .api_key
            .as_deref()
            .unwrap_or_default();
        let mut provider = Self::new(api_key).with_model(&config.agent.model);
        if let Some(base) = config
            .providers
            .anthropic
            .api_base
            .as_deref()
            .filter(|b| !b.trim().is_empty())
        {
            provider = provider.with_base_url(base);
        }
        provider
    }

    pub fn with_model(mut self, model: &str) -> Self {
        if !model.trim().is_empty() {
            self.model = model.to_string();
        }
        self
    }

    /// Point at a proxy or test server.
    pub fn with_base_url(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    /// Use a custom HTTP client (proxies, custom TLS).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.api_base)
    }

    fn build_request(
        &self,
        system: &str,
        turns: &[Turn],
        tools: &[ToolDefinition],
        options: &ChatOptions,
        stream: bool,
    ) -> ClaudeRequest {
        ClaudeRequest {
            model: self.model.clone(),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: convert_turns(turns),
            system: if system.is_empty() {
                None
            } else {
                Some(system.to_string())
            },
            tools: if tools.is_empty() {
                None
            } else {
                Some(convert_tools(tools))
            },
            temperature: options.temperature,
            stream: stream.then_some(true),
        }
    }

    async fn send(&self, request: &ClaudeRequest) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request);
        if request.stream.is_none() {
            builder = builder.timeout(REQUEST_TIMEOUT);
        }

        let response = builder.send().await.map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(YuriError::from(classify_status(
                status,
                &describe_error_body(&error_text),
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl LLMProvider for ClaudeProvider {
    async fn complete(
        &self,
        system: &str,
        turns: &[Turn],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<Completion> {
        let request = self.build_request(system, turns, tools, options, false);
        let response = self.send(&request).await?;
        let claude_response: ClaudeResponse = response.json().await.map_err(transport_error)?;
        Ok(convert_response(claude_response))
    }

    async fn complete_stream(
        &self,
        system: &str,
        turns: &[Turn],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let request = self.build_request(system, turns, tools, options, true);
        let response = self.send(&request).await?;

        let (tx, rx) = mpsc::channel::<StreamEvent>(64);
        let byte_stream = response.bytes_stream();

        tokio::spawn(async move {
            let mut assembler = StreamAssembler::default();
            let mut line_buffer: Vec<u8> = Vec::new();

            tokio::pin!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(StreamEvent::Error(transport_error(e))).await;
                        return;
                    }
                };

                // Split on raw bytes so a UTF-8 sequence cut by a chunk
                // boundary is decoded whole.
                line_buffer.extend_from_slice(&chunk);
                while let Some(pos) = line_buffer.iter().position(|b| *b == b'\n') {
                    let line_bytes: Vec<u8> = line_buffer.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line_bytes);
                    match assembler.feed_line(line.trim()) {
                        SseStep::Continue => {}
                        SseStep::Delta(text) => {
                            if tx.send(StreamEvent::Delta(text)).await.is_err() {
                                return;
                            }
                        }
                        SseStep::Stop => {
                            let _ = tx.send(StreamEvent::Done(assembler.finish())).await;
                            return;
                        }
                        SseStep::Error(e) => {
                            let _ = tx.send(StreamEvent::Error(e)).await;
                            return;
                        }
                    }
                }
            }

            if assembler.started {
                let _ = tx.send(StreamEvent::Done(assembler.finish())).await;
            } else {
                let _ = tx
                    .send(StreamEvent::Error(YuriError::Provider(
                        "Stream ended before any message was received".into(),
                    )))
                    .await;
            }
        });

        Ok(rx)
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "claude"
    }
}

/// Classify transport failures so timeouts get the right variant.
fn transport_error(e: reqwest::Error) -> YuriError {
    if e.is_timeout() {
        YuriError::from(ProviderError::Timeout(e.to_string()))
    } else {
        YuriError::Http(e)
    }
}

/// Render an error body as `type - message` when it is the standard shape.
fn describe_error_body(text: &str) -> String {
    match serde_json::from_str::<ClaudeErrorResponse>(text) {
        Ok(parsed) => format!("{} - {}", parsed.error.r#type, parsed.error.message),
        Err(_) => text.to_string(),
    }
}

// ============================================================================
// Claude API Request Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ClaudeMessage>,
    /// System prompt (separate from messages in Claude API)
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ClaudeTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClaudeMessage {
    /// "user" or "assistant"
    role: String,
    content: ClaudeContent,
}

/// Claude message content - can be simple text or content blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ClaudeContent {
    Text(String),
    Blocks(Vec<ClaudeContentBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ClaudeContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// Block types this client does not use (thinking, server tools)
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

// ============================================================================
// Claude API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContentBlock>,
    usage: ClaudeUsage,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
    error: ClaudeError,
}

#[derive(Debug, Deserialize)]
struct ClaudeError {
    r#type: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ============================================================================
// Claude SSE Streaming Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SseEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    delta: Option<SseDelta>,
    #[serde(default)]
    content_block: Option<SseContentBlock>,
    #[serde(default)]
    usage: Option<SseUsage>,
    #[serde(default)]
    message: Option<SseMessage>,
    #[serde(default)]
    error: Option<ClaudeError>,
}

#[derive(Debug, Deserialize)]
struct SseDelta {
    #[serde(rename = "type")]
    #[serde(default)]
    delta_type: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    partial_json: Option<String>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SseContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SseUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SseMessage {
    #[serde(default)]
    usage: Option<SseUsage>,
}

/// What the stream loop should do after one SSE line.
#[derive(Debug)]
enum SseStep {
    Continue,
    Delta(String),
    Stop,
    Error(YuriError),
}

#[derive(Debug)]
enum PartialBlock {
    Text(String),
    Tool {
        id: String,
        name: String,
        json: String,
    },
}

/// Rebuilds a [`Completion`] from SSE events, keyed by block index.
#[derive(Debug, Default)]
struct StreamAssembler {
    blocks: BTreeMap<u32, PartialBlock>,
    stop_reason: Option<String>,
    input_tokens: u32,
    output_tokens: u32,
    started: bool,
}

impl StreamAssembler {
    fn feed_line(&mut self, line: &str) -> SseStep {
        if line.is_empty() || line.starts_with("event:") || line.starts_with(':') {
            return SseStep::Continue;
        }
        let data = match line.strip_prefix("data:") {
            Some(d) => d.trim_start(),
            None => return SseStep::Continue,
        };
        let event: SseEvent = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "Skipping unparseable SSE payload");
                return SseStep::Continue;
            }
        };
        self.apply(event)
    }

    fn apply(&mut self, event: SseEvent) -> SseStep {
        match event.event_type.as_str() {
            "message_start" => {
                self.started = true;
                if let Some(usage) = event.message.and_then(|m| m.usage) {
                    self.input_tokens = usage.input_tokens.unwrap_or(0);
                }
            }
            "content_block_start" => {
                let (Some(index), Some(block)) = (event.index, event.content_block) else {
                    return SseStep::Continue;
                };
                match block.block_type.as_str() {
                    "text" => {
                        let initial = block.text.unwrap_or_default();
                        self.blocks.insert(index, PartialBlock::Text(initial.clone()));
                        if !initial.is_empty() {
                            return SseStep::Delta(initial);
                        }
                    }
                    "tool_use" => {
                        self.blocks.insert(
                            index,
                            PartialBlock::Tool {
                                id: block.id.unwrap_or_default(),
                                name: block.name.unwrap_or_default(),
                                json: String::new(),
                            },
                        );
                    }
                    other => debug!(block_type = other, "Ignoring content block"),
                }
            }
            "content_block_delta" => {
                let (Some(index), Some(delta)) = (event.index, event.delta) else {
                    return SseStep::Continue;
                };
                match (delta.delta_type.as_deref(), self.blocks.get_mut(&index)) {
                    (Some("text_delta"), Some(PartialBlock::Text(buf))) => {
                        if let Some(text) = delta.text {
                            buf.push_str(&text);
                            return SseStep::Delta(text);
                        }
                    }
                    (Some("input_json_delta"), Some(PartialBlock::Tool { json, .. })) => {
                        if let Some(chunk) = delta.partial_json {
                            json.push_str(&chunk);
                        }
                    }
                    _ => {}
                }
            }
            "message_delta" => {
                if let Some(reason) = event.delta.and_then(|d| d.stop_reason) {
                    self.stop_reason = Some(reason);
                }
                if let Some(usage) = event.usage {
                    self.output_tokens = usage.output_tokens.unwrap_or(self.output_tokens);
                }
            }
            "message_stop" => return SseStep::Stop,
            "error" => {
                let message = event
                    .error
                    .map(|e| format!("{} - {}", e.r#type, e.message))
                    .unwrap_or_else(|| "unknown stream error".to_string());
                return SseStep::Error(YuriError::from(classify_error_message(&message)));
            }
            _ => {}
        }
        SseStep::Continue
    }

    fn finish(&mut self) -> Completion {
        let blocks = std::mem::take(&mut self.blocks)
            .into_values()
            .filter_map(|block| match block {
                PartialBlock::Text(text) if text.is_empty() => None,
                PartialBlock::Text(text) => Some(ContentBlock::Text { text }),
                PartialBlock::Tool { id, name, json } => {
                    let input = if json.trim().is_empty() {
                        serde_json::json!({})
                    } else {
                        serde_json::from_str(&json).unwrap_or_else(|e| {
                            warn!(tool = %name, error = %e, "Tool input was not valid JSON");
                            serde_json::json!({})
                        })
                    };
                    Some(ContentBlock::ToolUse(ToolCall { id, name, input }))
                }
            })
            .collect();

        Completion {
            blocks,
            stop_reason: self
                .stop_reason
                .as_deref()
                .map(StopReason::from_api)
                .unwrap_or_default(),
            usage: Some(Usage::new(self.input_tokens, self.output_tokens)),
        }
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

/// Convert stored turns to Claude messages.
///
/// Tool results travel as a user message of `tool_result` blocks. Blank
/// assistant text is dropped, and so is an assistant turn left with nothing
/// in it; the API rejects empty content.
fn convert_turns(turns: &[Turn]) -> Vec<ClaudeMessage> {
    turns
        .iter()
        .filter_map(|turn| match turn {
            Turn::User { text } => Some(ClaudeMessage {
                role: "user".to_string(),
                content: ClaudeContent::Text(text.clone()),
            }),
            Turn::ToolResults { results } => Some(ClaudeMessage {
                role: "user".to_string(),
                content: ClaudeContent::Blocks(
                    results
                        .iter()
                        .map(|r| ClaudeContentBlock::ToolResult {
                            tool_use_id: r.tool_use_id.clone(),
                            content: r.content.clone(),
                            is_error: (!r.success).then_some(true),
                        })
                        .collect(),
                ),
            }),
            Turn::Assistant { blocks } => {
                let has_tools = blocks.iter().any(|b| matches!(b, ContentBlock::ToolUse(_)));
                let content = if has_tools {
                    ClaudeContent::Blocks(
                        blocks
                            .iter()
                            .filter_map(|b| match b {
                                ContentBlock::Text { text } if text.trim().is_empty() => None,
                                ContentBlock::Text { text } => {
                                    Some(ClaudeContentBlock::Text { text: text.clone() })
                                }
                                ContentBlock::ToolUse(call) => Some(ClaudeContentBlock::ToolUse {
                                    id: call.id.clone(),
                                    name: call.name.clone(),
                                    input: call.input.clone(),
                                }),
                            })
                            .collect(),
                    )
                } else {
                    let text = turn.text();
                    if text.trim().is_empty() {
                        debug!("Skipping empty assistant turn in history");
                        return None;
                    }
                    ClaudeContent::Text(text)
                };
                Some(ClaudeMessage {
                    role: "assistant".to_string(),
                    content,
                })
            }
        })
        .collect()
}

fn convert_tools(tools: &[ToolDefinition]) -> Vec<ClaudeTool> {
    tools
        .iter()
        .map(|t| ClaudeTool {
            name: t.name.clone(),
            description: t.description.clone(),
            input_schema: t.parameters.clone(),
        })
        .collect()
}

fn convert_response(response: ClaudeResponse) -> Completion {
    let blocks = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ClaudeContentBlock::Text { text } => Some(ContentBlock::Text { text }),
            ClaudeContentBlock::ToolUse { id, name, input } => {
                Some(ContentBlock::ToolUse(ToolCall { id, name, input }))
            }
            ClaudeContentBlock::ToolResult { .. } | ClaudeContentBlock::Unsupported => None,
        })
        .collect();

    Completion {
        blocks,
        stop_reason: response
            .stop_reason
            .as_deref()
            .map(StopReason::from_api)
            .unwrap_or_default(),
        usage: Some(Usage::new(
            response.usage.input_tokens,
            response.usage.output_tokens,
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::session::ToolResultBlock;
    use serde_json::json;

    fn feed_all(assembler: &mut StreamAssembler, lines: &[&str]) -> Vec<String> {
        let mut deltas = Vec::new();
        for line in lines {
            match assembler.feed_line(line) {
                SseStep::Delta(d) => deltas.push(d),
                SseStep::Error(e) => panic!("unexpected error {}", e),
                _ => {}
            }
        }
        deltas
    }

    #[test]
    fn test_claude_provider_creation() {
        let provider = ClaudeProvider::new("test-key");
        assert_eq!(provider.name(), "claude");
        assert_eq!(provider.default_model(), DEFAULT_MODEL);
        assert_eq!(provider.endpoint(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_claude_provider_overrides() {
        let provider = ClaudeProvider::new("k")
            .with_model("claude-test")
            .with_base_url("http://localhost:8080/");
        assert_eq!(provider.default_model(), "claude-test");
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/messages");

        let unchanged = ClaudeProvider::new("k").with_model("  ");
        assert_eq!(unchanged.default_model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_convert_turns_with_tool_round() {
        let turns = vec![
            Turn::user("What's the status of SO 7158?"),
            Turn::assistant(vec![
                ContentBlock::text("Let me look."),
                ContentBlock::ToolUse(ToolCall::new(
                    "toolu_1",
                    "execute_sql",
                    json!({"query": "SELECT 1"}),
                )),
            ]),
            Turn::tool_results(vec![ToolResultBlock {
                tool_use_id: "toolu_1".into(),
                success: false,
                content: r#"{"success":false,"error":"boom"}"#.into(),
            }]),
            Turn::assistant(vec![ContentBlock::text("It shipped.")]),
        ];

        let value = serde_json::to_value(convert_turns(&turns)).unwrap();
        assert_eq!(value[0], json!({"role": "user", "content": "What's the status of SO 7158?"}));
        assert_eq!(value[1]["role"], "assistant");
        assert_eq!(value[1]["content"][0], json!({"type": "text", "text": "Let me look."}));
        assert_eq!(
            value[1]["content"][1],
            json!({"type": "tool_use", "id": "toolu_1", "name": "execute_sql", "input": {"query": "SELECT 1"}})
        );
        assert_eq!(
            value[2]["content"][0],
            json!({
                "type": "tool_result",
                "tool_use_id": "toolu_1",
                "content": r#"{"success":false,"error":"boom"}"#,
                "is_error": true
            })
        );
        assert_eq!(value[3], json!({"role": "assistant", "content": "It shipped."}));
    }

    #[test]
    fn test_convert_turns_skips_empty_assistant_turn() {
        let turns = vec![
            Turn::user("SO 7158 status?"),
            Turn::assistant(vec![]),
            Turn::user("and now?"),
            Turn::assistant(vec![ContentBlock::text(" ")]),
            Turn::user("hello?"),
        ];
        let value = serde_json::to_value(convert_turns(&turns)).unwrap();
        assert_eq!(
            value,
            json!([
                {"role": "user", "content": "SO 7158 status?"},
                {"role": "user", "content": "and now?"},
                {"role": "user", "content": "hello?"}
            ])
        );
    }

    #[test]
    fn test_stream_assembler_end_turn_without_content() {
        let mut assembler = StreamAssembler::default();
        feed_all(
            &mut assembler,
            &[
                r#"data: {"type":"message_start","message":{"usage":{"input_tokens":12}}}"#,
                r#"data: {"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":1}}"#,
            ],
        );
        let completion = assembler.finish();
        assert!(completion.blocks.is_empty());
        assert_eq!(completion.stop_reason, StopReason::EndTurn);
    }

    #[test]
    fn test_successful_tool_result_omits_is_error() {
        let turns = vec![Turn::tool_results(vec![ToolResultBlock {
            tool_use_id: "t".into(),
            success: true,
            content: "{}".into(),
        }])];
        let value = serde_json::to_value(convert_turns(&turns)).unwrap();
        assert!(value[0]["content"][0].get("is_error").is_none());
    }

    #[test]
    fn test_build_request_shape() {
        let provider = ClaudeProvider::new("k");
        let tools = vec![ToolDefinition::new("execute_sql", "Run SQL", json!({"type": "object"}))];
        let request = provider.build_request(
            "system text",
            &[Turn::user("hi")],
            &tools,
            &ChatOptions::new().with_max_tokens(1024).with_temperature(0.0),
            true,
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["system"], "system text");
        assert_eq!(value["max_tokens"], 1024);
        assert_eq!(value["temperature"], 0.0);
        assert_eq!(value["stream"], true);
        assert_eq!(value["tools"][0]["input_schema"], json!({"type": "object"}));

        let plain = provider.build_request("", &[], &[], &ChatOptions::new(), false);
        let value = serde_json::to_value(&plain).unwrap();
        assert!(value.get("system").is_none());
        assert!(value.get("tools").is_none());
        assert!(value.get("stream").is_none());
        assert_eq!(value["max_tokens"], DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_convert_response_keeps_block_order() {
        let response: ClaudeResponse = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "Checking."},
                {"type": "tool_use", "id": "toolu_9", "name": "execute_sql", "input": {"query": "SELECT 2"}}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5},
            "stop_reason": "tool_use"
        }))
        .unwrap();
        let completion = convert_response(response);
        assert_eq!(completion.stop_reason, StopReason::ToolUse);
        assert_eq!(completion.text_content(), "Checking.");
        assert_eq!(completion.tool_calls()[0].input["query"], "SELECT 2");
        assert_eq!(completion.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_stream_assembler_text_and_tool() {
        let mut assembler = StreamAssembler::default();
        let deltas = feed_all(
            &mut assembler,
            &[
                "event: message_start",
                r#"data: {"type":"message_start","message":{"usage":{"input_tokens":42}}}"#,
                r#"data: {"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
                r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Let me "}}"#,
                r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"check."}}"#,
                r#"data: {"type":"content_block_stop","index":0}"#,
                r#"data: {"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"execute_sql"}}"#,
                r#"data: {"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"query\": \"SEL"}}"#,
                r#"data: {"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"ECT 1\"}"}}"#,
                r#"data: {"type":"content_block_stop","index":1}"#,
                r#"data: {"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":17}}"#,
            ],
        );
        assert_eq!(deltas, vec!["Let me ", "check."]);
        assert!(matches!(
            assembler.feed_line(r#"data: {"type":"message_stop"}"#),
            SseStep::Stop
        ));

        let completion = assembler.finish();
        assert_eq!(completion.stop_reason, StopReason::ToolUse);
        assert_eq!(completion.text_content(), "Let me check.");
        let calls = completion.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].input, json!({"query": "SELECT 1"}));
        assert_eq!(completion.usage, Some(Usage::new(42, 17)));
    }

    #[test]
    fn test_stream_assembler_empty_tool_input() {
        let mut assembler = StreamAssembler::default();
        feed_all(
            &mut assembler,
            &[
                r#"data: {"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"t","name":"execute_sql"}}"#,
                r#"data: {"type":"content_block_stop","index":0}"#,
            ],
        );
        let completion = assembler.finish();
        assert_eq!(completion.tool_calls()[0].input, json!({}));
    }

    #[test]
    fn test_stream_assembler_error_event_is_classified() {
        let mut assembler = StreamAssembler::default();
        let step = assembler.feed_line(
            r#"data: {"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        );
        match step {
            SseStep::Error(e) => assert_eq!(e.failure_kind(), FailureKind::Overloaded),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_stream_assembler_ignores_noise() {
        let mut assembler = StreamAssembler::default();
        assert!(matches!(assembler.feed_line(""), SseStep::Continue));
        assert!(matches!(assembler.feed_line(": ping"), SseStep::Continue));
        assert!(matches!(assembler.feed_line("data: not json"), SseStep::Continue));
        assert!(matches!(
            assembler.feed_line(r#"data: {"type":"ping"}"#),
            SseStep::Continue
        ));
    }

    #[test]
    fn test_describe_error_body() {
        assert_eq!(
            describe_error_body(r#"{"type":"error","error":{"type":"rate_limit_error","message":"slow down"}}"#),
            "rate_limit_error - slow down"
        );
        assert_eq!(describe_error_body("plain"), "plain");
    }
}
