//! Session module - bounded, time-limited conversational memory
//!
//! Each [`SessionKey`] maps to the turns of one conversation. Memory is
//! bounded in two ways:
//! - by size: `save` keeps only the most recent `max_exchanges` exchanges
//! - by idleness: an entry untouched for `ttl_idle` is forgotten on the next
//!   `get`, and `sweep` drops anything idle for twice that long
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use yuri::session::{SessionKey, SessionStore, SurfaceKind, Turn};
//!
//! # tokio_test::block_on(async {
//! let store = SessionStore::new(Duration::from_secs(1800), 10);
//! let key = SessionKey::new(SurfaceKind::DirectMessage, "D1", "U1");
//!
//! store.save(&key, vec![Turn::user("SO 7158 status?")]).await;
//! assert_eq!(store.get(&key).await.len(), 1);
//! # });
//! ```

pub mod types;

pub use types::{ContentBlock, SessionKey, SurfaceKind, ToolCall, ToolResultBlock, Turn};

use crate::config::SessionConfig;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Stored conversation plus the time it was last written.
#[derive(Debug)]
struct SessionEntry {
    turns: Vec<Turn>,
    last_activity: Instant,
}

impl SessionEntry {
    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }
}

/// In-memory store of conversation histories.
///
/// Shared across event handlers as `Arc<SessionStore>`. Different keys never
/// interfere; ordering of two writers on the same key is the caller's concern.
#[derive(Debug)]
pub struct SessionStore {
    entries: RwLock<HashMap<SessionKey, SessionEntry>>,
    ttl_idle: Duration,
    max_exchanges: usize,
}

impl SessionStore {
    /// Create an empty store.
    ///
    /// # Arguments
    /// * `ttl_idle` - Idle time after which a conversation is forgotten
    /// * `max_exchanges` - Most recent exchanges kept per conversation
    pub fn new(ttl_idle: Duration, max_exchanges: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl_idle,
            max_exchanges,
        }
    }

    /// Create a store from the `session` config section.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            Duration::from_secs(config.ttl_idle_secs),
            config.max_exchanges,
        )
    }

    /// Fetch the history for `key`.
    ///
    /// Returns an empty history if the key is unknown. An entry idle for
    /// longer than the TTL is deleted and treated as unknown.
    pub async fn get(&self, key: &SessionKey) -> Vec<Turn> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Vec::new(),
                Some(entry) if entry.idle_for(now) <= self.ttl_idle => {
                    return entry.turns.clone();
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        // A concurrent save may have refreshed the entry in between.
        if let Some(entry) = entries.get(key) {
            if entry.idle_for(now) <= self.ttl_idle {
                return entry.turns.clone();
            }
            entries.remove(key);
            debug!(session = %key, "Session expired");
        }
        Vec::new()
    }

    /// Store `turns` for `key`, trimmed to the most recent exchanges, and
    /// mark the entry active now.
    pub async fn save(&self, key: &SessionKey, turns: Vec<Turn>) {
        let turns = trim_to_exchanges(turns, self.max_exchanges);
        let entry = SessionEntry {
            turns,
            last_activity: Instant::now(),
        };
        self.entries.write().await.insert(key.clone(), entry);
    }

    /// Remove every entry idle for longer than twice the TTL.
    ///
    /// Returns the number of entries removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let cutoff = self.ttl_idle * 2;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.idle_for(now) <= cutoff);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Swept stale sessions");
        }
        removed
    }

    /// Number of stored conversations, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Whether an entry exists for `key`, without expiring it.
    pub async fn contains(&self, key: &SessionKey) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// Forget a conversation. Returns whether it existed.
    pub async fn remove(&self, key: &SessionKey) -> bool {
        self.entries.write().await.remove(key).is_some()
    }
}

/// Keep only the last `max_exchanges` exchanges of `turns`.
///
/// An exchange starts at a [`Turn::User`]; tool-result turns never count as
/// a boundary, so the result is empty or starts at a user turn and no tool
/// call is ever separated from its result.
///
/// # Example
/// ```
/// use yuri::session::{trim_to_exchanges, ContentBlock, Turn};
///
/// let turns = vec![
///     Turn::user("one"),
///     Turn::assistant(vec![ContentBlock::text("1")]),
///     Turn::user("two"),
///     Turn::assistant(vec![ContentBlock::text("2")]),
/// ];
/// let trimmed = trim_to_exchanges(turns, 1);
/// assert_eq!(trimmed, vec![Turn::user("two"), Turn::assistant(vec![ContentBlock::text("2")])]);
/// ```
pub fn trim_to_exchanges(mut turns: Vec<Turn>, max_exchanges: usize) -> Vec<Turn> {
    let starts: Vec<usize> = turns
        .iter()
        .enumerate()
        .filter(|(_, turn)| turn.starts_exchange())
        .map(|(i, _)| i)
        .collect();

    if starts.len() > max_exchanges {
        let cut = if max_exchanges == 0 {
            turns.len()
        } else {
            starts[starts.len() - max_exchanges]
        };
        turns.drain(..cut);
    }
    turns
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(30 * 60);

    fn key(user: &str) -> SessionKey {
        SessionKey::new(SurfaceKind::DirectMessage, "D1", user)
    }

    fn exchange(n: usize) -> Vec<Turn> {
        vec![
            Turn::user(format!("question {}", n)),
            Turn::assistant(vec![ContentBlock::text(format!("answer {}", n))]),
        ]
    }

    fn tool_exchange(n: usize) -> Vec<Turn> {
        let id = format!("toolu_{}", n);
        vec![
            Turn::user(format!("query {}", n)),
            Turn::assistant(vec![ContentBlock::ToolUse(ToolCall::new(
                &id,
                "execute_sql",
                json!({"query": "SELECT 1"}),
            ))]),
            Turn::tool_results(vec![ToolResultBlock {
                tool_use_id: id,
                success: true,
                content: "{\"success\":true}".into(),
            }]),
            Turn::assistant(vec![ContentBlock::text(format!("result {}", n))]),
        ]
    }

    #[test]
    fn test_trim_no_op_under_limit() {
        let turns: Vec<Turn> = (0..3).flat_map(exchange).collect();
        assert_eq!(trim_to_exchanges(turns.clone(), 10), turns);
    }

    #[test]
    fn test_trim_eleven_exchanges_drops_first() {
        let turns: Vec<Turn> = (1..=11).flat_map(exchange).collect();
        let trimmed = trim_to_exchanges(turns, 10);

        assert_eq!(trimmed.len(), 20);
        assert_eq!(trimmed[0], Turn::user("question 2"));
        assert!(!trimmed.contains(&Turn::user("question 1")));
    }

    #[test]
    fn test_trim_ignores_tool_result_turns_as_boundaries() {
        let turns: Vec<Turn> = (1..=4).flat_map(tool_exchange).collect();
        let trimmed = trim_to_exchanges(turns, 2);

        assert_eq!(trimmed.len(), 8);
        assert_eq!(trimmed[0], Turn::user("query 3"));
        // Every tool call kept still has its result
        let calls = trimmed.iter().flat_map(|t| t.tool_calls()).count();
        let results = trimmed
            .iter()
            .filter(|t| matches!(t, Turn::ToolResults { .. }))
            .count();
        assert_eq!(calls, results);
    }

    #[test]
    fn test_trim_zero_keeps_nothing() {
        let turns: Vec<Turn> = (0..2).flat_map(exchange).collect();
        assert!(trim_to_exchanges(turns, 0).is_empty());
    }

    #[test]
    fn test_trim_result_starts_at_user_turn() {
        for max in 1..6 {
            let turns: Vec<Turn> = (0..5)
                .flat_map(|n| if n % 2 == 0 { tool_exchange(n) } else { exchange(n) })
                .collect();
            let trimmed = trim_to_exchanges(turns, max);
            assert!(trimmed[0].starts_exchange());
            let kept = trimmed.iter().filter(|t| t.starts_exchange()).count();
            assert_eq!(kept, max.min(5));
        }
    }

    #[tokio::test]
    async fn test_get_unknown_key_is_empty() {
        let store = SessionStore::new(TTL, 10);
        assert!(store.get(&key("nobody")).await.is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_save_get_roundtrip() {
        let store = SessionStore::new(TTL, 10);
        let turns: Vec<Turn> = (0..3).flat_map(tool_exchange).collect();

        store.save(&key("U1"), turns.clone()).await;
        assert_eq!(store.get(&key("U1")).await, turns);
        assert!(store.contains(&key("U1")).await);
    }

    #[tokio::test]
    async fn test_save_trims() {
        let store = SessionStore::new(TTL, 2);
        store
            .save(&key("U1"), (0..5).flat_map(exchange).collect())
            .await;

        let turns = store.get(&key("U1")).await;
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0], Turn::user("question 3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_expires_after_ttl() {
        let store = SessionStore::new(TTL, 10);
        store.save(&key("U1"), exchange(1)).await;

        tokio::time::advance(TTL).await;
        assert_eq!(store.get(&key("U1")).await.len(), 2);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get(&key("U1")).await.is_empty());
        assert!(!store.contains(&key("U1")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_refreshes_activity() {
        let store = SessionStore::new(TTL, 10);
        store.save(&key("U1"), exchange(1)).await;
        tokio::time::advance(Duration::from_secs(25 * 60)).await;

        let mut turns = store.get(&key("U1")).await;
        turns.extend(exchange(2));
        store.save(&key("U1"), turns).await;

        tokio::time::advance(Duration::from_secs(25 * 60)).await;
        assert_eq!(store.get(&key("U1")).await.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_doubly_stale() {
        let store = SessionStore::new(TTL, 10);
        store.save(&key("old"), exchange(1)).await;
        tokio::time::advance(Duration::from_secs(40 * 60)).await;
        store.save(&key("idle"), exchange(1)).await;
        tokio::time::advance(Duration::from_secs(25 * 60)).await;
        store.save(&key("fresh"), exchange(1)).await;

        // old: 65 min idle, idle: 25 min, fresh: 0
        assert_eq!(store.sweep().await, 1);
        assert!(!store.contains(&key("old")).await);
        assert!(store.contains(&key("idle")).await);
        assert!(store.contains(&key("fresh")).await);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_expired_but_not_doubly_stale() {
        let store = SessionStore::new(TTL, 10);
        store.save(&key("U1"), exchange(1)).await;
        tokio::time::advance(Duration::from_secs(45 * 60)).await;

        // Past the TTL but within 2x: sweep leaves it, get expires it.
        assert_eq!(store.sweep().await, 0);
        assert!(store.contains(&key("U1")).await);
        assert!(store.get(&key("U1")).await.is_empty());
    }

    #[tokio::test]
    async fn test_keys_do_not_interfere() {
        let store = SessionStore::new(TTL, 10);
        store.save(&key("U1"), exchange(1)).await;
        store.save(&key("U2"), exchange(2)).await;

        assert!(store.remove(&key("U1")).await);
        assert!(!store.remove(&key("U1")).await);
        assert_eq!(store.get(&key("U2")).await[0], Turn::user("question 2"));
    }
}
