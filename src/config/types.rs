//! Configuration type definitions for Yuri
//!
//! All types implement serde traits for JSON serialization and have sensible
//! defaults, so a partial `config.json` (or none at all) is always valid input.

use serde::{Deserialize, Serialize};

/// Main configuration struct for Yuri
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Agent configuration (model, tokens, tool rounds, business identity)
    pub agent: AgentConfig,
    /// Conversational memory limits
    pub session: SessionConfig,
    /// Streaming publisher throttling
    pub streaming: StreamingConfig,
    /// Slack workspace credentials and routing
    pub slack: SlackConfig,
    /// LLM provider credentials
    pub providers: ProvidersConfig,
    /// Query / persistence backend (Supabase)
    pub database: DatabaseConfig,
    /// Google Calendar integration for out-of-office events
    pub calendar: CalendarConfig,
    /// Business rules cache
    pub rules: RulesConfig,
    /// Logging output
    pub logging: LoggingConfig,
}

// ============================================================================
// Agent Configuration
// ============================================================================

/// Default model
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Agent loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model identifier sent to the completion service
    pub model: String,
    /// Maximum tokens per completion
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tool-use rounds before a run is aborted
    pub max_tool_rounds: u32,
    /// Wall-clock budget for one agent run, in seconds
    pub agent_timeout_secs: u64,
    /// Name the assistant answers to
    pub bot_name: String,
    /// Company the assistant works for (used in prompts)
    pub company: String,
    /// IANA timezone used for "today" in prompts
    pub timezone: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            temperature: 0.0,
            max_tool_rounds: 8,
            agent_timeout_secs: 300,
            bot_name: "Yuri".to_string(),
            company: "Finished Goods".to_string(),
            timezone: "America/Los_Angeles".to_string(),
        }
    }
}

// ============================================================================
// Session Configuration
// ============================================================================

/// Conversational memory limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session is forgotten, in seconds
    pub ttl_idle_secs: u64,
    /// Number of most recent exchanges kept per session
    pub max_exchanges: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_idle_secs: 30 * 60,
            max_exchanges: 10,
        }
    }
}

// ============================================================================
// Streaming Configuration
// ============================================================================

/// Streaming publisher throttling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Minimum time between two in-place edits, in milliseconds
    pub update_interval_ms: u64,
    /// Characters required before the first edit replaces the placeholder
    pub first_update_min_chars: usize,
    /// Text of the placeholder message
    pub placeholder: String,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 1500,
            first_update_min_chars: 40,
            placeholder: "⏳".to_string(),
        }
    }
}

// ============================================================================
// Slack Configuration
// ============================================================================

/// Slack channel configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Bot token (xoxb-...)
    pub bot_token: String,
    /// App-level token for Socket Mode (xapp-...)
    pub app_token: String,
    /// Channel where out-of-office requests are posted
    pub ooo_channel_id: Option<String>,
    /// Allowlist of user IDs (empty = allow all)
    pub allow_from: Vec<String>,
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// LLM provider configurations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Anthropic (Claude) configuration
    pub anthropic: ProviderConfig,
}

/// Generic provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key
    pub api_key: Option<String>,
    /// Custom API base URL
    pub api_base: Option<String>,
}

// ============================================================================
// Backend Configuration
// ============================================================================

/// Supabase connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Service role or anon key
    pub key: String,
}

/// Google Calendar service-account integration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Service account key, as raw JSON or base64-encoded JSON
    pub service_account_json: Option<String>,
    /// Target calendar id
    pub calendar_id: Option<String>,
}

impl CalendarConfig {
    /// Whether both the credentials and the target calendar are present.
    pub fn is_configured(&self) -> bool {
        self.service_account_json
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
            && self
                .calendar_id
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty())
    }
}

/// Business rules cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// How long fetched rules are reused, in seconds
    pub cache_ttl_secs: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 15 * 60,
        }
    }
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output
    Pretty,
    /// Compact single-line output with a `component` field
    #[default]
    Component,
    /// JSON lines for log aggregators
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Optional file to append JSON logs to
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: "info".to_string(),
            file: None,
        }
    }
}
