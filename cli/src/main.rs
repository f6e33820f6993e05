// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # modelgate CLI
//!
//! The `modelgate` binary loads a gateway configuration, builds the adapter
//! registry and decision tree, and routes requests by criteria.
//!
//! ## Commands
//!
//! - `modelgate config show|validate|generate` - Configuration management
//! - `modelgate route --require <criterion>...` - Dry-run resolution
//! - `modelgate chat <prompt> --require <criterion>...` - Run a chat request
//! - `modelgate health` - Probe every configured adapter

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use modelgate::commands::{self, ChatArgs, ConfigCommand, RouteArgs};

/// modelgate - route AI requests to the backend that satisfies them
#[derive(Parser)]
#[command(name = "modelgate")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "MODELGATE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "MODELGATE_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Log format (text or json)
    #[arg(long, global = true, env = "MODELGATE_LOG_FORMAT", default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Resolve a request without executing it
    #[command(name = "route")]
    Route(RouteArgs),

    /// Send a chat request through the resolved adapter
    #[command(name = "chat")]
    Chat(ChatArgs),

    /// Check connectivity of every configured adapter
    #[command(name = "health")]
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Route(args)) => commands::route::execute(args, cli.config).await,
        Some(Commands::Chat(args)) => commands::chat::execute(args, cli.config).await,
        Some(Commands::Health) => commands::health::execute(cli.config).await,
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        "json" => builder.json().init(),
        _ => builder.compact().init(),
    }

    Ok(())
}
