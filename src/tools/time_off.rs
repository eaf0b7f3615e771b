//! `insert_time_off`: record an out-of-office announcement.
//!
//! The database write is the source of truth. The calendar event is a
//! courtesy: if it fails the tool still succeeds and reports
//! `calendar_event_created: false` so the model can word its reply.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::backend::{CalendarService, TimeOffRecord, TimeOffStore};
use crate::error::Result;

use super::types::{required_date, required_str, string_object_schema};
use super::{Tool, ToolContext, ToolOutput};

pub const INSERT_TIME_OFF: &str = "insert_time_off";

pub struct InsertTimeOffTool {
    store: Arc<dyn TimeOffStore>,
    calendar: Arc<dyn CalendarService>,
}

impl InsertTimeOffTool {
    pub fn new(store: Arc<dyn TimeOffStore>, calendar: Arc<dyn CalendarService>) -> Self {
        Self { store, calendar }
    }

    fn parse_record(args: &Value, ctx: &ToolContext) -> std::result::Result<TimeOffRecord, String> {
        let first_day_off = required_date(args, "first_day_off")?;
        let last_day_off = required_date(args, "last_day_off")?;
        if last_day_off < first_day_off {
            return Err(format!(
                "last_day_off ({}) is before first_day_off ({})",
                last_day_off, first_day_off
            ));
        }
        Ok(TimeOffRecord {
            request_date: ctx
                .today
                .unwrap_or_else(|| chrono::Local::now().date_naive()),
            slack_user_id: required_str(args, "slack_user_id")?.to_string(),
            slack_user_name: required_str(args, "slack_user_name")?.to_string(),
            first_day_off,
            last_day_off,
            original_message: args
                .get("original_message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }
}

#[async_trait]
impl Tool for InsertTimeOffTool {
    fn name(&self) -> &str {
        INSERT_TIME_OFF
    }

    fn description(&self) -> &str {
        "Insert a new time-off record into the database. Use this when an employee \
         posts about taking time off in the #out-of-office channel."
    }

    fn parameters(&self) -> Value {
        string_object_schema(
            &[
                (
                    "slack_user_id",
                    "The Slack user ID of the person taking time off",
                ),
                (
                    "slack_user_name",
                    "The display name of the person taking time off",
                ),
                ("first_day_off", "First day off in YYYY-MM-DD format"),
                ("last_day_off", "Last day off in YYYY-MM-DD format"),
                ("original_message", "The original Slack message text"),
            ],
            &[
                "slack_user_id",
                "slack_user_name",
                "first_day_off",
                "last_day_off",
                "original_message",
            ],
        )
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let record = match Self::parse_record(&args, ctx) {
            Ok(r) => r,
            Err(msg) => return Ok(ToolOutput::error(msg)),
        };

        info!(
            user = %record.slack_user_name,
            first = %record.first_day_off,
            last = %record.last_day_off,
            "Inserting time off"
        );

        if let Err(e) = self.store.insert_time_off(&record).await {
            error!(error = %e, "Failed to insert time off");
            return Ok(ToolOutput::error(e.to_string()));
        }

        let calendar_event_created = match self
            .calendar
            .create_out_of_office(
                &record.slack_user_name,
                record.first_day_off,
                record.last_day_off,
            )
            .await
        {
            Ok(_) => {
                info!(user = %record.slack_user_name, "Calendar event created");
                true
            }
            Err(e) => {
                warn!(error = %e, "Calendar event skipped");
                false
            }
        };

        Ok(ToolOutput::ok(json!({
            "message": format!("Time off recorded for {}", record.slack_user_name),
            "calendar_event_created": calendar_event_created,
        })))
    }
}
