//! Supabase (PostgREST) backend.
//!
//! One client implements every database-facing trait: free-form SQL goes
//! through the `exec_sql` RPC, everything else through plain table endpoints.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info};

use crate::config::DatabaseConfig;
use crate::error::{Result, YuriError};

use super::{
    format_rules, DirectoryUser, QueryBackend, Row, RuleRow, RulesSource, TimeOffRecord,
    TimeOffStore, UserDirectory,
};

const TIME_OFF_TABLE: &str = "time_off";
const USER_DIRECTORY_TABLE: &str = "yuri_user_directory";
const RULES_TABLE: &str = "yuri_rules";

/// HTTP client for a Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    key: String,
}

impl SupabaseClient {
    /// Create a client. Empty credentials are accepted; every call then
    /// fails with "Database connection is not configured."
    pub fn new(config: &DatabaseConfig) -> Self {
        let configured = !config.url.trim().is_empty() && !config.key.trim().is_empty();
        if configured {
            info!(url = %config.url, "Supabase backend configured");
        } else {
            tracing::warn!("Supabase credentials not configured");
        }
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            key: config.key.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.key.is_empty()
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(YuriError::Backend(
                "Database connection is not configured.".to_string(),
            ))
        }
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| YuriError::Backend(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(YuriError::Backend(format!(
                "{} {}",
                status,
                postgrest_message(&body)
            )));
        }
        Ok(response)
    }

    async fn send_json(&self, request: RequestBuilder) -> Result<Value> {
        let response = self.send(request).await?;
        let text = response
            .text()
            .await
            .map_err(|e| YuriError::Backend(format!("failed to read response: {}", e)))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| YuriError::Backend(format!("invalid response payload: {}", e)))
    }
}

/// Pull the human-readable message out of a PostgREST error body.
fn postgrest_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn non_null_list(payload: Value) -> Value {
    if payload.is_null() {
        Value::Array(Vec::new())
    } else {
        payload
    }
}

/// Normalize an `exec_sql` payload into rows.
///
/// The RPC may answer with an array of objects, a single object, scalars, or
/// null for statements without a result set.
pub(crate) fn rows_from_payload(payload: Value) -> Vec<Row> {
    fn to_row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        }
    }

    match payload {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().map(to_row).collect(),
        other => vec![to_row(other)],
    }
}

#[async_trait]
impl QueryBackend for SupabaseClient {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        self.ensure_configured()?;
        debug!(query = sql, "Executing query");
        let request = self
            .client
            .post(self.rest_url("rpc/exec_sql"))
            .json(&json!({ "query": sql }));
        match self.send_json(request).await {
            Ok(payload) => Ok(rows_from_payload(payload)),
            Err(e) => {
                error!(error = %e, "Query failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl TimeOffStore for SupabaseClient {
    async fn insert_time_off(&self, record: &TimeOffRecord) -> Result<()> {
        self.ensure_configured()?;
        info!(
            user = %record.slack_user_name,
            first = %record.first_day_off,
            last = %record.last_day_off,
            "Inserting time_off"
        );
        let request = self
            .client
            .post(self.rest_url(TIME_OFF_TABLE))
            .header("Prefer", "return=minimal")
            .json(record);
        self.send(request).await.map(|_| ())
    }
}

#[async_trait]
impl UserDirectory for SupabaseClient {
    async fn lookup(&self, slack_user_id: &str) -> Result<Option<DirectoryUser>> {
        self.ensure_configured()?;
        let user_filter = format!("eq.{}", slack_user_id);
        let request = self.client.get(self.rest_url(USER_DIRECTORY_TABLE)).query(&[
            ("select", "name,slack_user_id,email,zoho_user_id,role"),
            ("slack_user_id", user_filter.as_str()),
            ("is_active", "eq.true"),
            ("limit", "1"),
        ]);
        let payload = self.send_json(request).await?;
        let mut users: Vec<DirectoryUser> = serde_json::from_value(non_null_list(payload))
            .map_err(|e| YuriError::Backend(format!("invalid directory row: {}", e)))?;
        Ok(if users.is_empty() {
            None
        } else {
            Some(users.swap_remove(0))
        })
    }
}

#[async_trait]
impl RulesSource for SupabaseClient {
    async fn fetch_rules(&self) -> Result<String> {
        self.ensure_configured()?;
        let request = self.client.get(self.rest_url(RULES_TABLE)).query(&[
            ("select", "section,rule_key,rule_text"),
            ("is_active", "eq.true"),
            ("order", "sort_order.asc"),
        ]);
        let payload = self.send_json(request).await?;
        let rows: Vec<RuleRow> = serde_json::from_value(non_null_list(payload))
            .map_err(|e| YuriError::Backend(format!("invalid rules row: {}", e)))?;
        Ok(format_rules(&rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn client(url: &str, key: &str) -> SupabaseClient {
        SupabaseClient::new(&DatabaseConfig {
            url: url.into(),
            key: key.into(),
        })
    }

    #[test]
    fn test_rest_url_trims_trailing_slash() {
        let c = client("https://abc.supabase.co/", "k");
        assert_eq!(
            c.rest_url("rpc/exec_sql"),
            "https://abc.supabase.co/rest/v1/rpc/exec_sql"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_client_fails_fast() {
        let c = client("", "");
        assert!(!c.is_configured());
        let err = c.execute("SELECT 1").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Database error: Database connection is not configured."
        );
        assert!(c.fetch_rules().await.is_err());
        assert!(c.lookup("U1").await.is_err());
    }

    #[test]
    fn test_rows_from_payload_shapes() {
        let rows = rows_from_payload(json!([{"stage": "Shipped"}, {"stage": "Unsigned"}]));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["stage"], "Shipped");

        assert!(rows_from_payload(Value::Null).is_empty());

        let rows = rows_from_payload(json!({"count": 3}));
        assert_eq!(rows[0]["count"], 3);

        let rows = rows_from_payload(json!([7]));
        assert_eq!(rows[0]["value"], 7);
    }

    #[test]
    fn test_postgrest_message() {
        assert_eq!(
            postgrest_message(r#"{"code":"42P01","message":"relation \"dealz\" does not exist"}"#),
            "relation \"dealz\" does not exist"
        );
        assert_eq!(postgrest_message("bad gateway"), "bad gateway");
    }

    #[test]
    fn test_time_off_record_wire_shape() {
        let record = TimeOffRecord {
            request_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            slack_user_id: "U1".into(),
            slack_user_name: "Seth".into(),
            first_day_off: NaiveDate::from_ymd_opt(2026, 3, 5).unwrap(),
            last_day_off: NaiveDate::from_ymd_opt(2026, 3, 6).unwrap(),
            original_message: "out thu-fri".into(),
        };
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["request_date"], "2026-03-02");
        assert_eq!(v["first_day_off"], "2026-03-05");
        assert_eq!(v["slack_user_name"], "Seth");
    }
}
