//! Markdown to Slack mrkdwn rewriting.
//!
//! Models write CommonMark out of habit even when told not to. Slack renders
//! `*single*` as bold and has no headers, so the two most visible mistakes
//! are rewritten. Everything else passes through untouched.

use once_cell::sync::Lazy;
use regex::Regex;

static DOUBLE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static HEADER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+").unwrap());
static USER_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@[A-Z0-9]+>").unwrap());

/// Rewrite `**bold**` to `*bold*` and drop leading `#` header markers.
///
/// # Example
/// ```
/// use yuri::channels::format_for_slack;
///
/// assert_eq!(
///     format_for_slack("### Status\n**SO 7158** has shipped"),
///     "Status\n*SO 7158* has shipped"
/// );
/// ```
pub fn format_for_slack(text: &str) -> String {
    let bolded = DOUBLE_BOLD.replace_all(text, "*$1*");
    HEADER_PREFIX.replace_all(&bolded, "").into_owned()
}

/// Remove `<@U123>` mention tokens and surrounding whitespace.
pub fn strip_mentions(text: &str) -> String {
    USER_MENTION.replace_all(text, "").trim().to_string()
}
