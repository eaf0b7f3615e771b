//! Agent loop implementation
//!
//! Drives one conversation turn: call the completion service, run any tools
//! it asks for, feed the results back, and repeat until the model answers in
//! text. The blocking and streaming variants share the same state machine;
//! streaming only changes how each completion is received.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::{Result, YuriError};
use crate::providers::{ChatOptions, Completion, LLMProvider, StopReason, StreamEvent};
use crate::session::{ContentBlock, Turn};
use crate::tools::{ToolContext, ToolRegistry};

/// Sent when the model ends its answer without any text.
pub const EMPTY_REPLY_FALLBACK: &str =
    "Sorry, I couldn't put an answer together for that. Could you rephrase the question?";

/// Receives partial output while a streamed run is in progress.
#[async_trait]
pub trait StreamSink: Send {
    /// A fragment of reply text from the current completion.
    async fn on_delta(&mut self, fragment: &str);

    /// A tool round finished; the next completion starts from scratch.
    async fn on_new_round(&mut self) {}
}

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Concatenated text of the final assistant turn, unformatted
    pub reply: String,
    /// Full history: prior turns plus everything this run appended
    pub turns: Vec<Turn>,
    /// Number of tool rounds executed
    pub rounds: u32,
}

/// Runs the completion/tool state machine for one user message.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use yuri::agent::AgentLoop;
/// use yuri::config::AgentConfig;
/// use yuri::providers::ClaudeProvider;
/// use yuri::tools::{ToolContext, ToolRegistry};
///
/// let agent = AgentLoop::new(
///     Arc::new(ClaudeProvider::new("key")),
///     Arc::new(ToolRegistry::new()),
///     &AgentConfig::default(),
/// );
/// let outcome = agent
///     .run("You are Yuri.", Vec::new(), "hello".into(), &ToolContext::default())
///     .await?;
/// println!("{}", outcome.reply);
/// ```
pub struct AgentLoop {
    provider: Arc<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
    options: ChatOptions,
    max_tool_rounds: u32,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tools: Arc<ToolRegistry>,
        config: &AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            options: ChatOptions::new()
                .with_max_tokens(config.max_tokens)
                .with_temperature(config.temperature),
            max_tool_rounds: config.max_tool_rounds,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run to completion, receiving each response whole.
    ///
    /// On error the partial history is dropped; callers should not persist
    /// anything.
    pub async fn run(
        &self,
        system: &str,
        history: Vec<Turn>,
        message: String,
        ctx: &ToolContext,
    ) -> Result<AgentOutcome> {
        self.drive(system, history, message, ctx, None).await
    }

    /// Run to completion, forwarding text fragments to `sink` as they arrive.
    pub async fn run_streaming(
        &self,
        system: &str,
        history: Vec<Turn>,
        message: String,
        ctx: &ToolContext,
        sink: &mut dyn StreamSink,
    ) -> Result<AgentOutcome> {
        self.drive(system, history, message, ctx, Some(sink)).await
    }

    async fn drive(
        &self,
        system: &str,
        mut turns: Vec<Turn>,
        message: String,
        ctx: &ToolContext,
        mut sink: Option<&mut dyn StreamSink>,
    ) -> Result<AgentOutcome> {
        turns.push(Turn::user(message));
        let definitions = self.tools.definitions();
        let mut rounds: u32 = 0;

        loop {
            let completion = match sink.as_deref_mut() {
                Some(sink) => self.stream_once(system, &turns, sink).await?,
                None => {
                    self.provider
                        .complete(system, &turns, &definitions, &self.options)
                        .await?
                }
            };

            if let Some(usage) = completion.usage {
                debug!(
                    round = rounds,
                    input_tokens = usage.prompt_tokens,
                    output_tokens = usage.completion_tokens,
                    "Completion received"
                );
            }

            match (&completion.stop_reason, completion.has_tool_calls()) {
                (StopReason::ToolUse, true) => {}
                (StopReason::MaxTokens, true) => {
                    warn!(round = rounds, "Response hit max_tokens inside a tool call");
                    return Err(YuriError::Provider(
                        "Response was cut off by max_tokens in the middle of a tool call".into(),
                    ));
                }
                (stop_reason, _) => {
                    let mut reply = completion.text_content();
                    if reply.trim().is_empty() {
                        warn!(rounds, ?stop_reason, "Model finished without any text");
                        reply = EMPTY_REPLY_FALLBACK.to_string();
                    }
                    // Text only: stored history never holds a tool_use without its result.
                    turns.push(Turn::assistant(vec![ContentBlock::text(reply.clone())]));
                    info!(rounds, chars = reply.len(), "Agent run finished");
                    return Ok(AgentOutcome {
                        reply,
                        turns,
                        rounds,
                    });
                }
            }

            if rounds >= self.max_tool_rounds {
                warn!(rounds, "Model kept requesting tools, giving up");
                return Err(YuriError::ToolLoopExceeded(self.max_tool_rounds));
            }
            rounds += 1;

            let calls = completion.tool_calls();
            info!(round = rounds, calls = calls.len(), "Dispatching tool calls");
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.tools.dispatch_call(call, ctx).await);
            }

            turns.push(completion.to_turn());
            turns.push(Turn::tool_results(results));

            if let Some(sink) = sink.as_deref_mut() {
                sink.on_new_round().await;
            }
        }
    }

    async fn stream_once(
        &self,
        system: &str,
        turns: &[Turn],
        sink: &mut dyn StreamSink,
    ) -> Result<Completion> {
        let definitions = self.tools.definitions();
        let mut rx = self
            .provider
            .complete_stream(system, turns, &definitions, &self.options)
            .await?;

        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::Delta(fragment) => sink.on_delta(&fragment).await,
                StreamEvent::Done(completion) => return Ok(completion),
                StreamEvent::Error(e) => return Err(e),
            }
        }
        Err(YuriError::Provider(
            "Stream closed without a final response".into(),
        ))
    }
}
