//! Ask command handler (one-shot question from the terminal).

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use yuri::agent::{contextual_message, user_context, AgentLoop, PromptBuilder, StreamSink, UserIdentity};
use yuri::backend::RulesCache;
use yuri::channels::format_for_slack;
use yuri::config::Config;
use yuri::tools::{ooo_tools, query_tools, ToolContext};

use super::common::{build_provider, build_services};

/// Prints fragments as they arrive; a tool round starts a fresh line.
struct StdoutSink {
    wrote: bool,
}

#[async_trait]
impl StreamSink for StdoutSink {
    async fn on_delta(&mut self, fragment: &str) {
        print!("{}", fragment);
        let _ = io::stdout().flush();
        self.wrote = true;
    }

    async fn on_new_round(&mut self) {
        if self.wrote {
            println!();
            self.wrote = false;
        }
    }
}

pub(crate) async fn cmd_ask(
    config: Config,
    message: &str,
    user_id: &str,
    stream: bool,
    ooo: bool,
) -> Result<()> {
    let provider = build_provider(&config);
    let services = build_services(&config);
    let prompts = PromptBuilder::from_config(&config.agent);
    let today = prompts.today();
    let identity = UserIdentity::new(user_id, user_id, None);
    let ctx = ToolContext::new()
        .with_origin("cli", user_id)
        .with_today(today);
    let input = contextual_message(&identity, message);

    if ooo {
        let agent = AgentLoop::new(
            provider,
            Arc::new(ooo_tools(services.time_off, services.calendar)),
            &config.agent,
        );
        let outcome = agent
            .run(&prompts.ooo_prompt(today), Vec::new(), input, &ctx)
            .await
            .context("Out-of-office run failed")?;
        println!("{}", format_for_slack(&outcome.reply));
        return Ok(());
    }

    let directory_user = services.directory.lookup(user_id).await.unwrap_or_else(|e| {
        eprintln!("Warning: directory lookup failed: {}", e);
        None
    });
    let rules = RulesCache::new(
        services.rules,
        Duration::from_secs(config.rules.cache_ttl_secs),
    )
    .get()
    .await;
    let system = prompts.query_prompt(
        today,
        &user_context(user_id, &identity.name, directory_user.as_ref()),
        &rules,
    );
    let agent = AgentLoop::new(
        provider,
        Arc::new(query_tools(services.query)),
        &config.agent,
    );

    if stream {
        let mut sink = StdoutSink { wrote: false };
        let outcome = agent
            .run_streaming(&system, Vec::new(), input, &ctx, &mut sink)
            .await
            .context("Query failed")?;
        println!();
        eprintln!("({} tool round(s))", outcome.rounds);
    } else {
        let outcome = agent
            .run(&system, Vec::new(), input, &ctx)
            .await
            .context("Query failed")?;
        println!("{}", format_for_slack(&outcome.reply));
    }
    Ok(())
}
