//! `execute_sql`: run a model-written query against the business database.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::backend::QueryBackend;
use crate::error::Result;

use super::types::{required_str, string_object_schema};
use super::{Tool, ToolContext, ToolOutput};

pub const EXECUTE_SQL: &str = "execute_sql";

/// Runs SQL through a [`QueryBackend`] and returns the rows to the model.
pub struct ExecuteSqlTool {
    backend: Arc<dyn QueryBackend>,
}

impl ExecuteSqlTool {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for ExecuteSqlTool {
    fn name(&self) -> &str {
        EXECUTE_SQL
    }

    fn description(&self) -> &str {
        "Execute a SQL query against the Supabase database and return the results. \
         Use this when you need to fetch data to answer a user's question."
    }

    fn parameters(&self) -> Value {
        string_object_schema(
            &[
                (
                    "query",
                    "The SQL query to execute. Must be a valid Postgres SQL query.",
                ),
                (
                    "explanation",
                    "A brief explanation of what this query does, for logging purposes.",
                ),
            ],
            &["query", "explanation"],
        )
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let query = match required_str(&args, "query") {
            Ok(q) => q,
            Err(msg) => return Ok(ToolOutput::error(msg)),
        };
        let explanation = args
            .get("explanation")
            .and_then(Value::as_str)
            .unwrap_or("No explanation provided");

        info!(
            user = ctx.user_id.as_deref().unwrap_or("-"),
            explanation,
            query,
            "Executing SQL query"
        );

        match self.backend.execute(query).await {
            Ok(rows) => {
                let row_count = rows.len();
                Ok(ToolOutput::ok(json!({
                    "results": rows,
                    "row_count": row_count,
                })))
            }
            Err(e) => {
                error!(error = %e, "SQL query failed");
                Ok(ToolOutput::error(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Row;
    use crate::error::YuriError;
    use std::sync::Mutex;

    struct FakeBackend {
        rows: Vec<Row>,
        fail: bool,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueryBackend for FakeBackend {
        async fn execute(&self, sql: &str) -> Result<Vec<Row>> {
            self.seen.lock().unwrap().push(sql.to_string());
            if self.fail {
                Err(YuriError::Backend("relation \"dealz\" does not exist".into()))
            } else {
                Ok(self.rows.clone())
            }
        }
    }

    fn backend(rows: Vec<Row>, fail: bool) -> Arc<FakeBackend> {
        Arc::new(FakeBackend {
            rows,
            fail,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn row(v: Value) -> Row {
        v.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_execute_sql_success() {
        let fake = backend(
            vec![row(json!({"sales_order_number": "7158", "stage": "Shipped"}))],
            false,
        );
        let tool = ExecuteSqlTool::new(fake.clone());
        let out = tool
            .execute(
                json!({"query": "SELECT stage FROM deals WHERE sales_order_number = '7158'", "explanation": "status"}),
                &ToolContext::default(),
            )
            .await
            .unwrap();

        assert_eq!(
            out.to_json(),
            json!({
                "success": true,
                "results": [{"sales_order_number": "7158", "stage": "Shipped"}],
                "row_count": 1
            })
        );
        assert_eq!(fake.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_execute_sql_backend_failure_is_structured() {
        let tool = ExecuteSqlTool::new(backend(vec![], true));
        let out = tool
            .execute(json!({"query": "SELECT * FROM dealz"}), &ToolContext::default())
            .await
            .unwrap();
        assert!(!out.is_success());
        assert_eq!(
            out.error_message(),
            Some("Database error: relation \"dealz\" does not exist")
        );
    }

    #[tokio::test]
    async fn test_execute_sql_missing_query() {
        let fake = backend(vec![], false);
        let tool = ExecuteSqlTool::new(fake.clone());
        let out = tool
            .execute(json!({"explanation": "oops"}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(out.error_message(), Some("Missing required argument 'query'"));
        assert!(fake.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_schema_requires_both_fields() {
        let tool = ExecuteSqlTool::new(backend(vec![], false));
        let schema = tool.parameters();
        assert_eq!(schema["required"], json!(["query", "explanation"]));
        assert_eq!(schema["properties"]["query"]["type"], "string");
    }
}
