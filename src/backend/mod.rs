//! External data collaborators
//!
//! The agent only ever talks to the database and calendar through the traits
//! in this module. [`supabase`] and [`calendar`] provide the production
//! implementations; tests substitute in-memory fakes.

pub mod calendar;
pub mod supabase;

pub use calendar::{calendar_from_config, GoogleCalendar, UnconfiguredCalendar};
pub use supabase::SupabaseClient;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::Result;

/// One result row, column name to value.
pub type Row = Map<String, Value>;

/// Runs free-form SQL produced by the model.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>>;
}

/// A time-off announcement to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeOffRecord {
    /// Day the announcement was made
    pub request_date: NaiveDate,
    pub slack_user_id: String,
    pub slack_user_name: String,
    pub first_day_off: NaiveDate,
    pub last_day_off: NaiveDate,
    pub original_message: String,
}

/// Durable store of time-off records.
#[async_trait]
pub trait TimeOffStore: Send + Sync {
    async fn insert_time_off(&self, record: &TimeOffRecord) -> Result<()>;
}

/// A created calendar event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalendarEvent {
    pub id: Option<String>,
    pub link: Option<String>,
}

/// Shared calendar used to show who is out.
#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Create an all-day event covering `first..=last`.
    async fn create_out_of_office(
        &self,
        user_name: &str,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<CalendarEvent>;
}

/// Access level of a directory user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UserRole {
    /// Full access to every deal
    Admin,
    /// Only deals the user owns or is a rep on
    Standard,
}

impl From<String> for UserRole {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case("admin") {
            UserRole::Admin
        } else {
            UserRole::Standard
        }
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Admin => "admin".to_string(),
            UserRole::Standard => "standard".to_string(),
        }
    }
}

/// A row of the user directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub name: String,
    pub slack_user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub zoho_user_id: Option<String>,
    pub role: UserRole,
}

/// Maps Slack users to names and access roles.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up an active user. `Ok(None)` when unknown.
    async fn lookup(&self, slack_user_id: &str) -> Result<Option<DirectoryUser>>;
}

/// Business rules injected into the system prompt.
#[async_trait]
pub trait RulesSource: Send + Sync {
    /// Fetch the active rules, already formatted for the prompt.
    async fn fetch_rules(&self) -> Result<String>;
}

/// A row of the rules table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuleRow {
    pub section: String,
    #[serde(default)]
    pub rule_key: Option<String>,
    pub rule_text: String,
}

/// Render rules as `[SECTION]` headers followed by `- rule` lines.
///
/// Rows must already be in display order; a header is emitted whenever the
/// section changes.
///
/// # Example
/// ```
/// use yuri::backend::{format_rules, RuleRow};
///
/// let rows = vec![RuleRow {
///     section: "data_access".into(),
///     rule_key: None,
///     rule_text: "Never show margins to standard users".into(),
/// }];
/// assert_eq!(
///     format_rules(&rows),
///     "\n[DATA ACCESS]\n- Never show margins to standard users"
/// );
/// ```
pub fn format_rules(rows: &[RuleRow]) -> String {
    let mut lines = Vec::new();
    let mut current: Option<&str> = None;
    for row in rows {
        if current != Some(row.section.as_str()) {
            current = Some(row.section.as_str());
            lines.push(format!(
                "\n[{}]",
                row.section.to_uppercase().replace('_', " ")
            ));
        }
        lines.push(format!("- {}", row.rule_text));
    }
    lines.join("\n")
}

/// Caches the rules text so each message doesn't hit the database.
pub struct RulesCache {
    source: Arc<dyn RulesSource>,
    ttl: Duration,
    state: Mutex<Option<(String, Instant)>>,
}

impl RulesCache {
    pub fn new(source: Arc<dyn RulesSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            state: Mutex::new(None),
        }
    }

    /// Current rules text, refetched when older than the TTL.
    ///
    /// A failed refresh serves the previous text (or nothing) and is retried
    /// on the next call.
    pub async fn get(&self) -> String {
        let mut state = self.state.lock().await;
        if let Some((text, fetched_at)) = state.as_ref() {
            if fetched_at.elapsed() < self.ttl {
                return text.clone();
            }
        }

        match self.source.fetch_rules().await {
            Ok(text) => {
                if text.is_empty() {
                    warn!("Rules cache refresh returned empty");
                } else {
                    info!(chars = text.len(), "Rules cache refreshed");
                }
                *state = Some((text.clone(), Instant::now()));
                text
            }
            Err(e) => {
                warn!(error = %e, "Failed to refresh rules");
                state
                    .as_ref()
                    .map(|(text, _)| text.clone())
                    .unwrap_or_default()
            }
        }
    }
}
