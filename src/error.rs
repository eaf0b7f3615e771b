//! Error types for Yuri
//!
//! This module defines all error types used throughout the assistant.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.
//!
//! Nothing here is fatal to the process: every error is scoped to the single
//! inbound event being handled, and [`user_facing_message`] turns it into the
//! apology shown in Slack.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Provider Error Classification
// ============================================================================

/// Structured provider error classification.
///
/// Provides fine-grained categorization of completion-service failures so the
/// gateway can pick the right apology without string matching.
#[derive(Debug)]
pub enum ProviderError {
    /// 401 — Invalid API key or authentication failure
    Auth(String),
    /// 429 — Rate limit or quota exceeded
    RateLimit(String),
    /// 402 — Payment required or billing issue
    Billing(String),
    /// 500/502/503/504 — Server-side errors
    ServerError(String),
    /// 400 — Bad request, invalid JSON, malformed parameters
    InvalidRequest(String),
    /// 404 — Model not found or endpoint not available
    ModelNotFound(String),
    /// Connection or read timeout
    Timeout(String),
    /// Provider is at capacity (Anthropic `overloaded_error`, HTTP 529)
    Overloaded(String),
    /// Catch-all for unrecognized errors
    Unknown(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ProviderError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            ProviderError::Billing(msg) => write!(f, "Billing error: {}", msg),
            ProviderError::ServerError(msg) => write!(f, "Server error: {}", msg),
            ProviderError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProviderError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ProviderError::Overloaded(msg) => write!(f, "Overloaded error: {}", msg),
            ProviderError::Unknown(msg) => write!(f, "Unknown provider error: {}", msg),
        }
    }
}

impl ProviderError {
    /// Returns the HTTP status code associated with this error, if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Auth(_) => Some(401),
            ProviderError::RateLimit(_) => Some(429),
            ProviderError::Billing(_) => Some(402),
            ProviderError::ServerError(_) => Some(500),
            ProviderError::InvalidRequest(_) => Some(400),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::Timeout(_) => None,
            ProviderError::Overloaded(_) => Some(529),
            ProviderError::Unknown(_) => None,
        }
    }
}

impl From<ProviderError> for YuriError {
    fn from(err: ProviderError) -> Self {
        YuriError::ProviderTyped(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for Yuri operations.
#[derive(Error, Debug)]
pub enum YuriError {
    /// Configuration-related errors (invalid config, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Untyped provider errors (stream read failures, malformed responses)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Structured provider error with classification for the user-facing apology.
    #[error("Provider error: {0}")]
    ProviderTyped(ProviderError),

    /// Messaging surface errors (Slack API failures, socket problems)
    #[error("Channel error: {0}")]
    Channel(String),

    /// Tool execution errors. Never escape the tool registry.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Query / persistence backend errors (Supabase)
    #[error("Database error: {0}")]
    Backend(String),

    /// Calendar API errors
    #[error("Calendar error: {0}")]
    Calendar(String),

    /// The model kept requesting tools past the configured round ceiling
    #[error("Tool loop exceeded {0} rounds")]
    ToolLoopExceeded(u32),

    /// An agent run exceeded the deployment timeout
    #[error("Agent run timed out after {0}s")]
    Timeout(u64),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A specialized `Result` type for Yuri operations.
pub type Result<T> = std::result::Result<T, YuriError>;

// ============================================================================
// User-facing messages
// ============================================================================

/// Shown when the completion service rate-limits us.
pub const RATE_LIMIT_MESSAGE: &str = "⚠️ I'm being rate limited by my AI provider. Give me about 60 seconds and try again — I can definitely answer this!";

/// Shown when the completion service is at capacity.
pub const OVERLOADED_MESSAGE: &str = "⚠️ My AI provider's servers are at capacity right now. This is temporary — try again in a minute or two!";

/// Shown for every other failure.
pub const GENERIC_ERROR_MESSAGE: &str =
    "Sorry, I encountered an error processing your request. Please try again.";

/// Shown when a post in the out-of-office channel could not be processed.
pub const TIME_OFF_ERROR_MESSAGE: &str =
    "Sorry, I had trouble processing that. Could you try rephrasing your time-off request?";

/// Coarse class of a failed agent run, used to pick an apology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimit,
    Overloaded,
    Generic,
}

impl YuriError {
    /// Classify this error for the user-facing apology.
    ///
    /// Typed provider errors are trusted as-is; untyped ones go through the
    /// pattern classifier so a `"429"` buried in a message still counts.
    pub fn failure_kind(&self) -> FailureKind {
        let typed;
        let provider_error = match self {
            YuriError::ProviderTyped(e) => e,
            YuriError::Provider(msg) => {
                typed = crate::providers::error_classifier::classify_error_message(msg);
                &typed
            }
            _ => return FailureKind::Generic,
        };
        match provider_error {
            ProviderError::RateLimit(_) => FailureKind::RateLimit,
            ProviderError::Overloaded(_) => FailureKind::Overloaded,
            _ => FailureKind::Generic,
        }
    }
}

/// Map an error to the apology posted back to the user.
pub fn user_facing_message(err: &YuriError) -> &'static str {
    match err.failure_kind() {
        FailureKind::RateLimit => RATE_LIMIT_MESSAGE,
        FailureKind::Overloaded => OVERLOADED_MESSAGE,
        FailureKind::Generic => GENERIC_ERROR_MESSAGE,
    }
}
