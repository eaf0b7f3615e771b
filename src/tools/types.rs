//! Tool types for Yuri
//!
//! This module defines the core types for tool execution, including the `Tool`
//! trait that all tools must implement, and the `ToolContext` struct that
//! provides execution context to tools.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use crate::error::Result;

/// Structured result of a tool call, as shown to the model.
///
/// The payload is always a JSON object carrying a `success` flag; failures
/// carry an `error` string. The model reads it and explains the outcome in
/// its own words, so failures are data here, never control flow.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    payload: Map<String, Value>,
}

impl ToolOutput {
    /// Successful result. `fields` must be a JSON object; anything else is
    /// wrapped under `result`.
    ///
    /// # Example
    /// ```
    /// use yuri::tools::ToolOutput;
    /// use serde_json::json;
    ///
    /// let out = ToolOutput::ok(json!({"row_count": 0}));
    /// assert!(out.is_success());
    /// assert_eq!(out.to_json()["row_count"], 0);
    /// ```
    pub fn ok(fields: Value) -> Self {
        let mut payload = match fields {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                map
            }
        };
        payload.insert("success".to_string(), Value::Bool(true));
        Self { payload }
    }

    /// Failed result with a human-readable reason.
    pub fn error(message: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("success".to_string(), Value::Bool(false));
        payload.insert("error".to_string(), Value::String(message.into()));
        Self { payload }
    }

    pub fn is_success(&self) -> bool {
        self.payload
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// The error message, if this is a failure.
    pub fn error_message(&self) -> Option<&str> {
        self.payload.get("error").and_then(Value::as_str)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.payload.clone())
    }

    /// Serialized form placed in the tool-result turn.
    pub fn to_content(&self) -> String {
        Value::Object(self.payload.clone()).to_string()
    }
}

/// Trait that all tools must implement.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
/// use yuri::tools::{Tool, ToolContext, ToolOutput};
/// use yuri::error::Result;
///
/// struct PingTool;
///
/// #[async_trait]
/// impl Tool for PingTool {
///     fn name(&self) -> &str { "ping" }
///     fn description(&self) -> &str { "Answers pong" }
///     fn parameters(&self) -> Value {
///         json!({ "type": "object", "properties": {}, "required": [] })
///     }
///     async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
///         Ok(ToolOutput::ok(json!({ "message": "pong" })))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to request this tool. Unique within a registry.
    fn name(&self) -> &str;

    /// Sent to the model to explain when to use the tool.
    fn description(&self) -> &str;

    /// JSON schema for the tool's input.
    fn parameters(&self) -> Value;

    /// Execute the tool with the arguments produced by the model.
    ///
    /// An `Err` is converted into a failed [`ToolOutput`] by the registry.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput>;
}

/// Context provided to tools during execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Channel the triggering message came from
    pub channel: Option<String>,
    /// Slack user who sent the triggering message
    pub user_id: Option<String>,
    /// Business-local date of the request
    pub today: Option<NaiveDate>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the channel and the requesting user.
    ///
    /// # Example
    /// ```
    /// use yuri::tools::ToolContext;
    ///
    /// let ctx = ToolContext::new().with_origin("C123", "U42");
    /// assert_eq!(ctx.channel.as_deref(), Some("C123"));
    /// assert_eq!(ctx.user_id.as_deref(), Some("U42"));
    /// ```
    pub fn with_origin(mut self, channel: &str, user_id: &str) -> Self {
        self.channel = Some(channel.to_string());
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }
}

/// Fetch a required non-empty string argument.
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> std::result::Result<&'a str, String> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| format!("Missing required argument '{}'", key))
}

/// Parse a required `YYYY-MM-DD` argument.
pub(crate) fn required_date(args: &Value, key: &str) -> std::result::Result<NaiveDate, String> {
    let raw = required_str(args, key)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Argument '{}' must be a YYYY-MM-DD date, got '{}'", key, raw))
}

/// JSON schema helper for an object with string properties, all required.
pub(crate) fn string_object_schema(properties: &[(&str, &str)], required: &[&str]) -> Value {
    let props: Map<String, Value> = properties
        .iter()
        .map(|(name, description)| {
            (
                name.to_string(),
                json!({ "type": "string", "description": description }),
            )
        })
        .collect();
    json!({
        "type": "object",
        "properties": props,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_output_ok_marks_success() {
        let out = ToolOutput::ok(json!({"results": [], "row_count": 0}));
        assert!(out.is_success());
        assert_eq!(
            out.to_json(),
            json!({"success": true, "results": [], "row_count": 0})
        );
        assert!(out.error_message().is_none());
    }

    #[test]
    fn test_tool_output_ok_wraps_non_object() {
        let out = ToolOutput::ok(json!(3));
        assert_eq!(out.to_json(), json!({"success": true, "result": 3}));
    }

    #[test]
    fn test_tool_output_error() {
        let out = ToolOutput::error("Unknown tool: drop_tables");
        assert!(!out.is_success());
        assert_eq!(out.error_message(), Some("Unknown tool: drop_tables"));
        let parsed: Value = serde_json::from_str(&out.to_content()).unwrap();
        assert_eq!(parsed["success"], false);
    }

    #[test]
    fn test_required_str() {
        let args = json!({"query": "SELECT 1", "blank": "  "});
        assert_eq!(required_str(&args, "query"), Ok("SELECT 1"));
        assert!(required_str(&args, "blank").is_err());
        assert!(required_str(&args, "missing").is_err());
    }

    #[test]
    fn test_required_date() {
        let args = json!({"a": "2026-03-15", "b": "March 15"});
        assert_eq!(
            required_date(&args, "a"),
            Ok(NaiveDate::from_ymd_opt(2026, 3, 15).unwrap())
        );
        let err = required_date(&args, "b").unwrap_err();
        assert!(err.contains("YYYY-MM-DD"));
    }

    #[test]
    fn test_tool_context_builders() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let ctx = ToolContext::new().with_origin("C1", "U1").with_today(day);
        assert_eq!(ctx.today, Some(day));
        assert_eq!(ctx.user_id.as_deref(), Some("U1"));
    }
}
