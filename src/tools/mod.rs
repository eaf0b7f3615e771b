//! Tools module - what the model can do
//!
//! Two tool sets exist, one per conversation kind:
//! - [`query_tools`]: `execute_sql`, for questions in DMs and mentions
//! - [`ooo_tools`]: `insert_time_off`, for the out-of-office channel

pub mod registry;
pub mod sql;
pub mod time_off;
pub mod types;

pub use registry::ToolRegistry;
pub use sql::{ExecuteSqlTool, EXECUTE_SQL};
pub use time_off::{InsertTimeOffTool, INSERT_TIME_OFF};
pub use types::{Tool, ToolContext, ToolOutput};

use std::sync::Arc;

use crate::backend::{CalendarService, QueryBackend, TimeOffStore};

/// Registry for data questions.
pub fn query_tools(backend: Arc<dyn QueryBackend>) -> ToolRegistry {
    ToolRegistry::new().with(Box::new(ExecuteSqlTool::new(backend)))
}

/// Registry for the out-of-office channel.
pub fn ooo_tools(
    store: Arc<dyn TimeOffStore>,
    calendar: Arc<dyn CalendarService>,
) -> ToolRegistry {
    ToolRegistry::new().with(Box::new(InsertTimeOffTool::new(store, calendar)))
}
