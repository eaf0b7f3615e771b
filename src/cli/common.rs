//! Shared CLI helpers used across multiple command handlers.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use yuri::backend::{calendar_from_config, SupabaseClient};
use yuri::config::Config;
use yuri::gateway::Services;
use yuri::providers::{ClaudeProvider, LLMProvider};

/// Load config from `path`, or the default location when none is given.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Config::load().with_context(|| "Failed to load configuration"),
    }
}

/// Wire the production backends: Supabase for data, Google for the calendar.
pub(crate) fn build_services(config: &Config) -> Services {
    let supabase = Arc::new(SupabaseClient::new(&config.database));
    Services {
        query: supabase.clone(),
        time_off: supabase.clone(),
        calendar: calendar_from_config(&config.calendar),
        directory: supabase.clone(),
        rules: supabase,
    }
}

pub(crate) fn build_provider(config: &Config) -> Arc<dyn LLMProvider> {
    Arc::new(ClaudeProvider::from_config(config))
}
