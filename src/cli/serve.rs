//! Serve command handler (Slack Socket Mode gateway).

use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use yuri::channels::SlackChannel;
use yuri::config::Config;
use yuri::gateway::Gateway;
use yuri::log_component;

use super::common::{build_provider, build_services};

/// Inbound events buffered between the socket and the gateway.
const EVENT_QUEUE_SIZE: usize = 64;

/// Run until Ctrl+C.
pub(crate) async fn cmd_serve(config: Config) -> Result<()> {
    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("[ERROR] {}", problem);
        }
        bail!(
            "Configuration is incomplete ({} problem(s)); run `yuri config check`",
            problems.len()
        );
    }

    println!("Starting {}...", config.agent.bot_name);

    let surface = Arc::new(SlackChannel::new(config.slack.clone()));
    let mut gateway = Gateway::new(
        &config,
        surface.clone(),
        build_provider(&config),
        build_services(&config),
    );

    match surface.auth_test().await {
        Ok(bot_user_id) => {
            log_component!(info, "slack", "Bot identity resolved", bot_user_id = bot_user_id.as_str());
            gateway = gateway.with_bot_user_id(&bot_user_id);
        }
        Err(e) => warn!(error = %e, "Could not resolve bot user id; OOO mentions may be answered twice"),
    }

    match config.slack.ooo_channel_id.as_deref() {
        Some(id) => info!(channel = id, "Out-of-office channel enabled"),
        None => info!("No out-of-office channel configured"),
    }

    let (tx, rx) = mpsc::channel(EVENT_QUEUE_SIZE);
    let mut inbound = SlackChannel::new(config.slack.clone());
    inbound.start(tx).await?;

    let gateway = Arc::new(gateway);
    println!("{} is online. Press Ctrl+C to stop.", config.agent.bot_name);

    tokio::select! {
        _ = Arc::clone(&gateway).serve(rx) => {
            warn!("Event stream ended unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    inbound.stop().await?;
    println!("Stopped.");
    Ok(())
}
