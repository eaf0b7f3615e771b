//! Integration tests for Yuri
//!
//! These drive the public API end to end with scripted fakes standing in
//! for Slack, the completion service and the backends.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;

use yuri::agent::UserIdentity;
use yuri::backend::{
    CalendarEvent, CalendarService, DirectoryUser, QueryBackend, Row, RulesSource, TimeOffRecord,
    TimeOffStore, UserDirectory,
};
use yuri::channels::{InboundEvent, MessagingSurface};
use yuri::config::{Config, StreamingConfig};
use yuri::error::{Result, YuriError};
use yuri::providers::{ChatOptions, Completion, LLMProvider, ToolDefinition};
use yuri::session::{SessionKey, SessionStore, SurfaceKind, ToolCall, Turn};
use yuri::tools::{ooo_tools, ToolContext};
use yuri::{Gateway, Services, StreamingPublisher};

// ============================================================================
// Fakes
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Post(String),
    Edit(String),
}

#[derive(Default)]
struct FakeSlack {
    sent: Mutex<Vec<Sent>>,
}

impl FakeSlack {
    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingSurface for FakeSlack {
    async fn post(&self, _channel: &str, text: &str, _thread: Option<&str>) -> Result<String> {
        self.sent.lock().unwrap().push(Sent::Post(text.to_string()));
        Ok("1734000000.000100".to_string())
    }

    async fn edit(&self, _channel: &str, _message_id: &str, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Edit(text.to_string()));
        Ok(())
    }

    async fn user_identity(&self, _user_id: &str) -> Result<UserIdentity> {
        Err(YuriError::Channel("users.info unavailable".into()))
    }
}

/// Replays completions in order, recording how many turns each call saw.
struct ScriptedProvider {
    script: Mutex<VecDeque<Completion>>,
    seen: Mutex<Vec<usize>>,
    latency: Duration,
}

impl ScriptedProvider {
    fn new(script: Vec<Completion>) -> Arc<Self> {
        Self::with_latency(script, Duration::ZERO)
    }

    fn with_latency(script: Vec<Completion>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
            latency,
        })
    }

    fn seen(&self) -> Vec<usize> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(
        &self,
        _system: &str,
        turns: &[Turn],
        _tools: &[ToolDefinition],
        _options: &ChatOptions,
    ) -> Result<Completion> {
        self.seen.lock().unwrap().push(turns.len());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| Completion::text("Anything else?")))
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
struct FakeSupabase {
    queries: Mutex<Vec<String>>,
    time_off: Mutex<Vec<TimeOffRecord>>,
    fail_insert: bool,
}

#[async_trait]
impl QueryBackend for FakeSupabase {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        self.queries.lock().unwrap().push(sql.to_string());
        let mut row = Row::new();
        row.insert("so_number".into(), json!("7158"));
        row.insert("stage".into(), json!("Shipped"));
        Ok(vec![row])
    }
}

#[async_trait]
impl TimeOffStore for FakeSupabase {
    async fn insert_time_off(&self, record: &TimeOffRecord) -> Result<()> {
        if self.fail_insert {
            return Err(YuriError::Backend("insert rejected".into()));
        }
        self.time_off.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for FakeSupabase {
    async fn lookup(&self, _slack_user_id: &str) -> Result<Option<DirectoryUser>> {
        Ok(None)
    }
}

#[async_trait]
impl RulesSource for FakeSupabase {
    async fn fetch_rules(&self) -> Result<String> {
        Ok(String::new())
    }
}

/// Calendar that always fails, counting attempts.
#[derive(Default)]
struct BrokenCalendar {
    attempts: Mutex<u32>,
}

#[async_trait]
impl CalendarService for BrokenCalendar {
    async fn create_out_of_office(
        &self,
        _user_name: &str,
        _first: NaiveDate,
        _last: NaiveDate,
    ) -> Result<CalendarEvent> {
        *self.attempts.lock().unwrap() += 1;
        Err(YuriError::Calendar("403 forbidden".into()))
    }
}

fn services(backend: Arc<FakeSupabase>) -> Services {
    Services {
        query: backend.clone(),
        time_off: backend.clone(),
        calendar: Arc::new(BrokenCalendar::default()),
        directory: backend.clone(),
        rules: backend,
    }
}

fn dm(text: &str) -> InboundEvent {
    InboundEvent::message("U42", "D42", text).with_channel_type("im")
}

fn dm_key() -> SessionKey {
    SessionKey::new(SurfaceKind::DirectMessage, "D42", "U42")
}

// ============================================================================
// Query flow
// ============================================================================

#[tokio::test]
async fn test_order_status_question_end_to_end() {
    let provider = ScriptedProvider::new(vec![
        Completion::with_tools(
            "Let me look that up.",
            vec![ToolCall::new(
                "toolu_01",
                "execute_sql",
                json!({"query": "SELECT stage FROM sales_orders WHERE so_number = '7158'",
                       "explanation": "order stage"}),
            )],
        ),
        Completion::text("## Status\n**SO 7158** has shipped."),
    ]);
    let slack = Arc::new(FakeSlack::default());
    let backend = Arc::new(FakeSupabase::default());
    let gateway = Gateway::new(
        &Config::default(),
        slack.clone(),
        provider.clone(),
        services(backend.clone()),
    );

    gateway.handle(dm("SO 7158 status?")).await;

    assert_eq!(provider.seen(), vec![1, 3]);
    assert_eq!(backend.queries.lock().unwrap().len(), 1);

    let turns = gateway.sessions().get(&dm_key()).await;
    assert_eq!(turns.len(), 4);
    assert!(matches!(turns[0], Turn::User { .. }));
    assert!(turns[0].text().contains("Message: SO 7158 status?"));
    // Unknown identity falls back to the placeholder name.
    assert!(turns[0].text().starts_with("User: there"));
    assert!(matches!(turns[2], Turn::ToolResults { .. }));

    let sent = slack.sent();
    assert_eq!(sent.first(), Some(&Sent::Post("⏳".into())));
    assert_eq!(sent.last(), Some(&Sent::Edit("Status\n*SO 7158* has shipped.".into())));
    assert_eq!(
        sent.iter().filter(|s| matches!(s, Sent::Post(_))).count(),
        1,
        "only the placeholder is ever posted"
    );
}

#[tokio::test]
async fn test_follow_up_sees_previous_exchange() {
    let provider = ScriptedProvider::new(vec![
        Completion::text("SO 7158 shipped Tuesday."),
        Completion::text("It went out via UPS."),
    ]);
    let slack = Arc::new(FakeSlack::default());
    let gateway = Gateway::new(
        &Config::default(),
        slack,
        provider.clone(),
        services(Arc::new(FakeSupabase::default())),
    );

    gateway.handle(dm("SO 7158 status?")).await;
    gateway.handle(dm("which carrier?")).await;

    assert_eq!(provider.seen(), vec![1, 3]);
    assert_eq!(gateway.sessions().get(&dm_key()).await.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_same_user_events_are_serialized() {
    let provider = ScriptedProvider::with_latency(
        vec![Completion::text("first"), Completion::text("second")],
        Duration::from_secs(2),
    );
    let slack = Arc::new(FakeSlack::default());
    let gateway = Arc::new(Gateway::new(
        &Config::default(),
        slack,
        provider.clone(),
        services(Arc::new(FakeSupabase::default())),
    ));

    tokio::join!(gateway.handle(dm("one")), gateway.handle(dm("two")));

    // The second run starts from the first run's saved history.
    assert_eq!(provider.seen(), vec![1, 3]);
    assert_eq!(gateway.sessions().get(&dm_key()).await.len(), 4);
}

// ============================================================================
// Out-of-office tool
// ============================================================================

fn time_off_args() -> serde_json::Value {
    json!({
        "slack_user_id": "U42",
        "slack_user_name": "Dana",
        "first_day_off": "2026-03-09",
        "last_day_off": "2026-03-13",
        "original_message": "out all next week"
    })
}

#[tokio::test]
async fn test_calendar_failure_keeps_time_off_record() {
    let store = Arc::new(FakeSupabase::default());
    let calendar = Arc::new(BrokenCalendar::default());
    let registry = ooo_tools(store.clone(), calendar.clone());
    let ctx = ToolContext::new()
        .with_origin("COOO", "U42")
        .with_today(NaiveDate::from_ymd_opt(2026, 3, 4).unwrap());

    let output = registry.dispatch("insert_time_off", time_off_args(), &ctx).await;

    assert!(output.is_success());
    assert_eq!(output.to_json()["calendar_event_created"], false);
    assert_eq!(*calendar.attempts.lock().unwrap(), 1);

    let records = store.time_off.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].request_date, NaiveDate::from_ymd_opt(2026, 3, 4).unwrap());
    assert_eq!(records[0].last_day_off, NaiveDate::from_ymd_opt(2026, 3, 13).unwrap());
}

#[tokio::test]
async fn test_persistence_failure_skips_calendar() {
    let store = Arc::new(FakeSupabase {
        fail_insert: true,
        ..Default::default()
    });
    let calendar = Arc::new(BrokenCalendar::default());
    let registry = ooo_tools(store, calendar.clone());

    let output = registry
        .dispatch("insert_time_off", time_off_args(), &ToolContext::new())
        .await;

    assert!(!output.is_success());
    assert!(output.error_message().unwrap().contains("insert rejected"));
    assert_eq!(*calendar.attempts.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_tool_is_structured_failure() {
    let registry = ooo_tools(
        Arc::new(FakeSupabase::default()),
        Arc::new(BrokenCalendar::default()),
    );
    let output = registry
        .dispatch("drop_tables", json!({}), &ToolContext::new())
        .await;
    assert_eq!(output.error_message(), Some("Unknown tool: drop_tables"));
}

// ============================================================================
// Session store
// ============================================================================

#[tokio::test]
async fn test_eleven_exchanges_keep_the_last_ten() {
    let store = SessionStore::new(Duration::from_secs(1800), 10);
    let mut turns = Vec::new();
    for i in 1..=11 {
        turns.push(Turn::user(format!("question {}", i)));
        turns.push(Turn::assistant(vec![yuri::session::ContentBlock::text(format!(
            "answer {}",
            i
        ))]));
    }

    store.save(&dm_key(), turns).await;
    let kept = store.get(&dm_key()).await;

    assert_eq!(kept.len(), 20);
    assert_eq!(kept[0].text(), "question 2");
    assert!(kept.iter().all(|t| t.text() != "question 1"));
}

#[tokio::test(start_paused = true)]
async fn test_idle_sessions_expire_and_sweep() {
    let store = SessionStore::new(Duration::from_secs(1800), 10);
    let stale = SessionKey::new(SurfaceKind::Channel, "C1", "U1");
    store.save(&stale, vec![Turn::user("old")]).await;

    tokio::time::advance(Duration::from_secs(3000)).await;
    store.save(&dm_key(), vec![Turn::user("fresh")]).await;
    tokio::time::advance(Duration::from_secs(700)).await;

    assert_eq!(store.sweep().await, 1);
    assert!(!store.contains(&stale).await);
    assert_eq!(store.get(&dm_key()).await.len(), 1);
}

// ============================================================================
// Streaming publisher
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_publisher_throttles_edits() {
    let slack = Arc::new(FakeSlack::default());
    let start = tokio::time::Instant::now();
    let mut publisher =
        StreamingPublisher::start(slack.clone(), "D42", None, &StreamingConfig::default())
            .await
            .unwrap();

    for millis in [0u64, 500, 1000, 1600, 3200] {
        tokio::time::sleep_until(start + Duration::from_millis(millis)).await;
        publisher.push("0123456789").await;
    }
    publisher.finish(&"0123456789".repeat(5)).await;

    let edits: Vec<Sent> = slack
        .sent()
        .into_iter()
        .filter(|s| matches!(s, Sent::Edit(_)))
        .collect();
    assert_eq!(
        edits,
        vec![
            Sent::Edit("0123456789".repeat(4)),
            Sent::Edit("0123456789".repeat(5)),
            Sent::Edit("0123456789".repeat(5)),
        ]
    );
}
