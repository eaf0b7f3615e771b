//! Tool registry for Yuri
//!
//! The registry is built once at startup and shared immutably. Dispatch never
//! fails: unknown tools and handler errors become failed [`ToolOutput`]s that
//! the model can read and explain.

use std::collections::BTreeMap;
use std::time::Instant;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::providers::ToolDefinition;
use crate::session::{ToolCall, ToolResultBlock};

use super::{Tool, ToolContext, ToolOutput};

/// A registry that holds and dispatches tools by name.
///
/// # Example
///
/// ```rust
/// use yuri::tools::{ToolContext, ToolRegistry};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let registry = ToolRegistry::new();
/// let out = registry
///     .dispatch("drop_tables", json!({}), &ToolContext::default())
///     .await;
/// assert!(!out.is_success());
/// assert_eq!(out.error_message(), Some("Unknown tool: drop_tables"));
/// # });
/// ```
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        info!(tool = %name, "Registering tool");
        self.tools.insert(name, tool);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, tool: Box<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Run a tool by name.
    ///
    /// # Arguments
    /// * `name` - Tool name requested by the model
    /// * `args` - Arguments produced by the model
    /// * `ctx` - The execution context
    ///
    /// # Returns
    /// The tool's output, or a failed output for unknown names and handler
    /// errors. Never an `Err`.
    pub async fn dispatch(&self, name: &str, args: Value, ctx: &ToolContext) -> ToolOutput {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = name, "Model requested unknown tool");
            return ToolOutput::error(format!("Unknown tool: {}", name));
        };

        let start = Instant::now();
        match tool.execute(args, ctx).await {
            Ok(output) => {
                info!(
                    tool = name,
                    success = output.is_success(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool executed"
                );
                output
            }
            Err(e) => {
                error!(
                    tool = name,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool execution failed"
                );
                ToolOutput::error(e.to_string())
            }
        }
    }

    /// Run one model tool call and pair the result with its id.
    pub async fn dispatch_call(&self, call: &ToolCall, ctx: &ToolContext) -> ToolResultBlock {
        let output = self.dispatch(&call.name, call.input.clone(), ctx).await;
        ToolResultBlock {
            tool_use_id: call.id.clone(),
            success: output.is_success(),
            content: output.to_content(),
        }
    }

    /// Tool definitions for the completion service, ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.parameters()))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
