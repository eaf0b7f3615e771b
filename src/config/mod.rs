//! Configuration management for Yuri
//!
//! Configuration is loaded from `~/.yuri/config.json` (or an explicit path),
//! then `.env` is read and environment variables override file values.
//! The conventional deployment variables (`SLACK_BOT_TOKEN`, `ANTHROPIC_API_KEY`,
//! `SUPABASE_URL`, ...) are honoured alongside the `YURI_SECTION_KEY` pattern.

mod types;
pub mod validate;

pub use types::*;

use crate::error::Result;
use std::path::{Path, PathBuf};
use std::str::FromStr;

impl Config {
    /// Returns the Yuri configuration directory path (~/.yuri)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".yuri")
    }

    /// Returns the path to the config file (~/.yuri/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        // A missing .env is the normal case in production.
        let _ = dotenvy::dotenv();
        config.apply_env_overrides();

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        // Agent
        override_string("YURI_AGENT_MODEL", &mut self.agent.model);
        override_parsed("YURI_AGENT_MAX_TOKENS", &mut self.agent.max_tokens);
        override_parsed("YURI_AGENT_TEMPERATURE", &mut self.agent.temperature);
        override_parsed("YURI_AGENT_MAX_TOOL_ROUNDS", &mut self.agent.max_tool_rounds);
        override_parsed(
            "YURI_AGENT_TIMEOUT_SECS",
            &mut self.agent.agent_timeout_secs,
        );
        override_string("YURI_AGENT_TIMEZONE", &mut self.agent.timezone);

        // Session
        override_parsed("YURI_SESSION_TTL_IDLE_SECS", &mut self.session.ttl_idle_secs);
        override_parsed("YURI_SESSION_MAX_EXCHANGES", &mut self.session.max_exchanges);

        // Streaming
        override_parsed(
            "YURI_STREAMING_UPDATE_INTERVAL_MS",
            &mut self.streaming.update_interval_ms,
        );
        override_parsed(
            "YURI_STREAMING_FIRST_UPDATE_MIN_CHARS",
            &mut self.streaming.first_update_min_chars,
        );

        // Slack
        override_string("SLACK_BOT_TOKEN", &mut self.slack.bot_token);
        override_string("YURI_SLACK_BOT_TOKEN", &mut self.slack.bot_token);
        override_string("SLACK_APP_TOKEN", &mut self.slack.app_token);
        override_string("YURI_SLACK_APP_TOKEN", &mut self.slack.app_token);
        if let Ok(val) = std::env::var("YURI_SLACK_OOO_CHANNEL_ID") {
            self.slack.ooo_channel_id = Some(val);
        }

        // Providers
        if let Some(val) = first_env(&["YURI_PROVIDERS_ANTHROPIC_API_KEY", "ANTHROPIC_API_KEY"]) {
            self.providers.anthropic.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("YURI_PROVIDERS_ANTHROPIC_API_BASE") {
            self.providers.anthropic.api_base = Some(val);
        }

        // Database
        override_string("SUPABASE_URL", &mut self.database.url);
        override_string("YURI_DATABASE_URL", &mut self.database.url);
        override_string("SUPABASE_KEY", &mut self.database.key);
        override_string("YURI_DATABASE_KEY", &mut self.database.key);

        // Calendar
        if let Some(val) = first_env(&[
            "YURI_CALENDAR_SERVICE_ACCOUNT_JSON",
            "GOOGLE_SERVICE_ACCOUNT_JSON",
        ]) {
            self.calendar.service_account_json = Some(val);
        }
        if let Some(val) = first_env(&["YURI_CALENDAR_CALENDAR_ID", "GOOGLE_CALENDAR_ID"]) {
            self.calendar.calendar_id = Some(val);
        }

        // Rules
        override_parsed("YURI_RULES_CACHE_TTL_SECS", &mut self.rules.cache_ttl_secs);

        // Logging
        override_string("YURI_LOGGING_LEVEL", &mut self.logging.level);
        if let Ok(val) = std::env::var("YURI_LOGGING_FORMAT") {
            match val.to_ascii_lowercase().as_str() {
                "pretty" => self.logging.format = LogFormat::Pretty,
                "component" => self.logging.format = LogFormat::Component,
                "json" => self.logging.format = LogFormat::Json,
                _ => {}
            }
        }
    }

    /// Check the loaded configuration for problems that would stop the
    /// gateway from serving.
    ///
    /// Returns one human-readable line per problem; empty means ready.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.slack.bot_token.trim().is_empty() {
            problems.push("slack.bot_token is not set (SLACK_BOT_TOKEN)".to_string());
        } else if !self.slack.bot_token.starts_with("xoxb-") {
            problems.push("slack.bot_token should start with 'xoxb-'".to_string());
        }
        if self.slack.app_token.trim().is_empty() {
            problems.push("slack.app_token is not set (SLACK_APP_TOKEN)".to_string());
        } else if !self.slack.app_token.starts_with("xapp-") {
            problems.push("slack.app_token should start with 'xapp-'".to_string());
        }

        if !self
            .providers
            .anthropic
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
        {
            problems.push("providers.anthropic.api_key is not set (ANTHROPIC_API_KEY)".to_string());
        }

        if self.database.url.trim().is_empty() || self.database.key.trim().is_empty() {
            problems.push("database.url / database.key are not set (SUPABASE_URL, SUPABASE_KEY)".to_string());
        }

        if chrono_tz::Tz::from_str(&self.agent.timezone).is_err() {
            problems.push(format!(
                "agent.timezone '{}' is not a known IANA timezone",
                self.agent.timezone
            ));
        }
        if self.agent.max_tool_rounds == 0 {
            problems.push("agent.max_tool_rounds must be at least 1".to_string());
        }
        if self.session.max_exchanges == 0 {
            problems.push("session.max_exchanges must be at least 1".to_string());
        }

        problems
    }
}

fn override_string(var: &str, target: &mut String) {
    if let Ok(val) = std::env::var(var) {
        *target = val;
    }
}

fn override_parsed<T: FromStr>(var: &str, target: &mut T) {
    if let Ok(val) = std::env::var(var) {
        if let Ok(v) = val.parse() {
            *target = v;
        }
    }
}

fn first_env(vars: &[&str]) -> Option<String> {
    vars.iter()
        .find_map(|v| std::env::var(v).ok().filter(|s| !s.is_empty()))
}
