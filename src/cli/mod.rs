//! CLI module — command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod ask;
pub mod common;
pub mod config;
pub mod serve;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "yuri")]
#[command(version)]
#[command(about = "Slack data assistant for business questions", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.yuri/config.json
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Slack over Socket Mode and answer events
    Serve,
    /// Ask a single question from the terminal
    Ask {
        /// The message to send
        message: String,
        /// Print the reply as it streams in
        #[arg(long)]
        stream: bool,
        /// Treat the message as an out-of-office announcement
        #[arg(long, conflicts_with = "stream")]
        ooo: bool,
        /// Slack user id to attribute the message to
        #[arg(long, default_value = "cli")]
        user: String,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the config file and the resulting settings
    Check,
    /// Print the effective configuration with secrets redacted
    Show,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Logging settings come from config; fall back to defaults if it is
    // missing or unreadable so `config check` can still report the problem.
    let logging_cfg = common::load_config(cli.config.as_deref())
        .map(|c| c.logging)
        .unwrap_or_default();
    yuri::utils::logging::init_logging(&logging_cfg)?;

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Serve) => {
            let config = common::load_config(cli.config.as_deref())?;
            serve::cmd_serve(config).await?;
        }
        Some(Commands::Ask {
            message,
            stream,
            ooo,
            user,
        }) => {
            let config = common::load_config(cli.config.as_deref())?;
            ask::cmd_ask(config, &message, &user, stream, ooo).await?;
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(cli.config.as_deref(), action).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_ask_flags() {
        let cli = Cli::try_parse_from(["yuri", "ask", "SO 7158 status?", "--stream"]).unwrap();
        match cli.command {
            Some(Commands::Ask {
                message,
                stream,
                ooo,
                user,
            }) => {
                assert_eq!(message, "SO 7158 status?");
                assert!(stream);
                assert!(!ooo);
                assert_eq!(user, "cli");
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_cli_rejects_stream_with_ooo() {
        assert!(Cli::try_parse_from(["yuri", "ask", "out friday", "--stream", "--ooo"]).is_err());
    }

    #[test]
    fn test_cli_global_config_path() {
        let cli = Cli::try_parse_from(["yuri", "config", "check", "--config", "/tmp/y.json"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/y.json")));
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Check
            })
        ));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
