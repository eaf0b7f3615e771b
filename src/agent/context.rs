//! Context builder for agent conversations
//!
//! Builds the system prompt for each conversation kind and the identity
//! header that prefixes every user message.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::backend::{DirectoryUser, UserRole};
use crate::config::AgentConfig;

use super::prompts::{ooo_system_prompt, query_system_prompt, QueryPromptParts, SCHEMA_DESCRIPTION};

/// Who sent a message, as resolved from the messaging surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    /// Opaque platform user id
    pub user_id: String,
    /// Display name, or real name when the display name is blank
    pub name: String,
    pub email: Option<String>,
}

impl UserIdentity {
    pub fn new(user_id: &str, name: &str, email: Option<&str>) -> Self {
        Self {
            user_id: user_id.to_string(),
            name: name.to_string(),
            email: email.filter(|e| !e.is_empty()).map(str::to_string),
        }
    }

    /// Placeholder identity used when the profile lookup fails.
    ///
    /// # Example
    /// ```
    /// use yuri::agent::UserIdentity;
    ///
    /// let who = UserIdentity::unknown("U42");
    /// assert_eq!(who.name, "there");
    /// assert!(who.email.is_none());
    /// ```
    pub fn unknown(user_id: &str) -> Self {
        Self::new(user_id, "there", None)
    }
}

/// Prefix a message with who sent it.
///
/// # Example
/// ```
/// use yuri::agent::{contextual_message, UserIdentity};
///
/// let who = UserIdentity::new("U42", "Ann", Some("ann@example.com"));
/// assert_eq!(
///     contextual_message(&who, "SO 7158 status?"),
///     "User: Ann (email: ann@example.com)\nSlack ID: U42\n\nMessage: SO 7158 status?"
/// );
/// ```
pub fn contextual_message(identity: &UserIdentity, text: &str) -> String {
    let mut out = format!("User: {}", identity.name);
    if let Some(email) = &identity.email {
        out.push_str(&format!(" (email: {})", email));
    }
    out.push_str(&format!("\nSlack ID: {}\n\nMessage: {}", identity.user_id, text));
    out
}

/// Two weeks of dates starting at this week's Monday, today marked.
///
/// Weeks are separated by a `---` line so the model can tell "this Friday"
/// from "next Friday".
pub fn week_dates(today: NaiveDate) -> String {
    let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let mut lines = Vec::with_capacity(15);
    for i in 0..14 {
        let day = monday + Duration::days(i);
        let marker = if day == today { " <-- TODAY" } else { "" };
        lines.push(format!(
            "  {}: {}{}",
            day.format("%A"),
            day.format("%Y-%m-%d"),
            marker
        ));
        if i == 6 {
            lines.push("  ---".to_string());
        }
    }
    lines.join("\n")
}

/// Describe the current user and their data access for the prompt.
///
/// `slack_name` is only used when the user is missing from the directory.
pub fn user_context(slack_user_id: &str, slack_name: &str, user: Option<&DirectoryUser>) -> String {
    let Some(user) = user else {
        return format!(
            "Name: {}\n\
             Slack ID: {}\n\
             Role: UNKNOWN. User not found in yuri_user_directory. Do NOT return any deal data.\n\
             Politely tell them to contact an administrator to get set up.",
            slack_name, slack_user_id
        );
    };

    let zoho_id = user.zoho_user_id.as_deref().unwrap_or("unknown");
    match user.role {
        UserRole::Admin => format!(
            "Name: {}\n\
             Slack ID: {}\n\
             Zoho ID: {}\n\
             Role: ADMIN. Full access to all deals, accounts, and systems. No deal filtering required.",
            user.name, slack_user_id, zoho_id
        ),
        UserRole::Standard => format!(
            "Name: {name}\n\
             Slack ID: {id}\n\
             Zoho ID: {zoho}\n\
             Role: STANDARD. Can only access deals where '{name}' appears in deal_owner, sales_rep_on_account, or sales_rep_on_deal.\n\
             All SQL queries for deal data MUST include a WHERE clause filtering on these columns using this user's name.",
            name = user.name,
            id = slack_user_id,
            zoho = zoho_id
        ),
    }
}

/// Fills the prompt templates with names, dates and per-request context.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    bot_name: String,
    company: String,
    timezone: Tz,
}

impl PromptBuilder {
    /// An unparseable timezone falls back to UTC; `Config::validate` reports it.
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            bot_name: config.bot_name.clone(),
            company: config.company.clone(),
            timezone: config.timezone.parse().unwrap_or(Tz::UTC),
        }
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    /// Today's date in the business timezone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    /// System prompt for data questions.
    pub fn query_prompt(&self, today: NaiveDate, user_context: &str, rules: &str) -> String {
        let today_str = today.format("%Y-%m-%d").to_string();
        let day_of_week = today.format("%A").to_string();
        query_system_prompt(&QueryPromptParts {
            bot_name: &self.bot_name,
            company: &self.company,
            today: &today_str,
            day_of_week: &day_of_week,
            user_context,
            rules,
            schema: SCHEMA_DESCRIPTION,
        })
    }

    /// System prompt for the out-of-office channel.
    pub fn ooo_prompt(&self, today: NaiveDate) -> String {
        ooo_system_prompt(
            &self.bot_name,
            &self.company,
            &today.format("%Y-%m-%d").to_string(),
            &today.format("%A").to_string(),
            &week_dates(today),
        )
    }
}
