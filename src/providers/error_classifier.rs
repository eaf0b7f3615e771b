//! Pattern-based error classification for completion-service errors.
//!
//! Checks patterns in priority order: rate_limit > overloaded > billing >
//! auth > timeout > invalid request. Falls back to `Unknown` if nothing
//! matches. Rate limit and capacity come first because they drive the two
//! dedicated apologies.

use crate::error::ProviderError;

/// Classify an error message string into a `ProviderError`.
pub fn classify_error_message(msg: &str) -> ProviderError {
    let lower = msg.to_lowercase();

    if contains_any(
        &lower,
        &[
            "rate_limit",
            "rate limit",
            "too many requests",
            "429",
            "exceeded your current quota",
        ],
    ) {
        return ProviderError::RateLimit(msg.to_string());
    }

    // Anthropic returns `overloaded_error` bodies with HTTP 529
    if contains_any(&lower, &["overloaded", "529", "at capacity"]) {
        return ProviderError::Overloaded(msg.to_string());
    }

    if contains_any(
        &lower,
        &[
            "402",
            "payment required",
            "credit balance",
            "billing",
        ],
    ) {
        return ProviderError::Billing(msg.to_string());
    }

    if contains_any(
        &lower,
        &[
            "invalid_api_key",
            "invalid api key",
            "authentication",
            "unauthorized",
            "forbidden",
            "permission_error",
            "401",
            "403",
        ],
    ) {
        return ProviderError::Auth(msg.to_string());
    }

    if contains_any(&lower, &["timeout", "timed out", "deadline exceeded"]) {
        return ProviderError::Timeout(msg.to_string());
    }

    if contains_any(
        &lower,
        &["invalid_request_error", "tool_use_id", "tool_use.id"],
    ) {
        return ProviderError::InvalidRequest(msg.to_string());
    }

    ProviderError::Unknown(msg.to_string())
}

/// Map an HTTP status plus response body to a `ProviderError`.
///
/// The status decides when it is unambiguous; otherwise the body is run
/// through [`classify_error_message`].
pub fn classify_status(status: u16, body: &str) -> ProviderError {
    let msg = format!("HTTP {}: {}", status, body);
    match status {
        429 => ProviderError::RateLimit(msg),
        529 => ProviderError::Overloaded(msg),
        401 | 403 => ProviderError::Auth(msg),
        402 => ProviderError::Billing(msg),
        404 => ProviderError::ModelNotFound(msg),
        408 | 504 => ProviderError::Timeout(msg),
        500 | 502 | 503 => match classify_error_message(body) {
            overloaded @ ProviderError::Overloaded(_) => overloaded,
            _ => ProviderError::ServerError(msg),
        },
        400 => match classify_error_message(body) {
            ProviderError::Unknown(_) => ProviderError::InvalidRequest(msg),
            other => other,
        },
        _ => classify_error_message(&msg),
    }
}

fn contains_any(haystack: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| haystack.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_patterns() {
        assert!(matches!(
            classify_error_message("Error code: 429 - rate_limit_error"),
            ProviderError::RateLimit(_)
        ));
        assert!(matches!(
            classify_error_message("Too Many Requests"),
            ProviderError::RateLimit(_)
        ));
    }

    #[test]
    fn test_overloaded_patterns() {
        assert!(matches!(
            classify_error_message(r#"{"type":"error","error":{"type":"overloaded_error"}}"#),
            ProviderError::Overloaded(_)
        ));
        assert!(matches!(
            classify_error_message("status 529"),
            ProviderError::Overloaded(_)
        ));
    }

    #[test]
    fn test_rate_limit_wins_over_overloaded() {
        assert!(matches!(
            classify_error_message("429 while overloaded"),
            ProviderError::RateLimit(_)
        ));
    }

    #[test]
    fn test_auth_and_unknown() {
        assert!(matches!(
            classify_error_message("authentication_error: invalid x-api-key"),
            ProviderError::Auth(_)
        ));
        assert!(matches!(
            classify_error_message("something odd happened"),
            ProviderError::Unknown(_)
        ));
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(classify_status(429, ""), ProviderError::RateLimit(_)));
        assert!(matches!(classify_status(529, ""), ProviderError::Overloaded(_)));
        assert!(matches!(
            classify_status(503, r#"{"error":{"type":"overloaded_error"}}"#),
            ProviderError::Overloaded(_)
        ));
        assert!(matches!(
            classify_status(500, "internal"),
            ProviderError::ServerError(_)
        ));
        assert!(matches!(
            classify_status(400, "messages: field required"),
            ProviderError::InvalidRequest(_)
        ));
        assert!(matches!(classify_status(401, ""), ProviderError::Auth(_)));
        assert!(matches!(classify_status(404, ""), ProviderError::ModelNotFound(_)));
    }

    #[test]
    fn test_status_message_keeps_body() {
        let err = classify_status(500, "boom");
        assert_eq!(err.to_string(), "Server error: HTTP 500: boom");
    }
}
