//! Config command handlers.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use yuri::config::validate::{validate_config, DiagnosticLevel};
use yuri::config::Config;

use super::common::load_config;
use super::ConfigAction;

/// Keys whose values are never printed.
const SECRET_KEYS: &[&str] = &["bot_token", "app_token", "api_key", "key", "service_account_json"];

pub(crate) async fn cmd_config(path: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Check => check(path),
        ConfigAction::Show => show(path),
    }
}

fn check(path: Option<&Path>) -> Result<()> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(Config::path);
    println!("Config file: {}", config_path.display());

    let mut errors = 0;
    let mut warnings = 0;

    if config_path.exists() {
        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let raw: Value = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                println!("[ERROR] Invalid JSON: {}", e);
                return Ok(());
            }
        };

        for diag in validate_config(&raw) {
            match diag.level {
                DiagnosticLevel::Error => errors += 1,
                DiagnosticLevel::Warn => warnings += 1,
                DiagnosticLevel::Ok => {}
            }
            println!("{}", diag);
        }
    } else {
        println!("[OK] No config file found (using defaults and environment)");
    }

    let config = load_config(path)?;
    for problem in config.validate() {
        println!("[ERROR] {}", problem);
        errors += 1;
    }

    if errors == 0 && warnings == 0 {
        println!("\nConfiguration looks good!");
    } else {
        println!("\nFound {} error(s), {} warning(s)", errors, warnings);
    }
    Ok(())
}

fn show(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    let mut value = serde_json::to_value(&config).context("Failed to serialize config")?;
    redact(&mut value);
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Replace non-empty secret values with a marker, recursively.
fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map.iter_mut() {
                let is_secret = SECRET_KEYS.contains(&key.as_str());
                match inner {
                    Value::String(s) if is_secret && !s.is_empty() => {
                        *inner = Value::String("[redacted]".to_string());
                    }
                    _ => redact(inner),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}
