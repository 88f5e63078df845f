// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Taskboard CLI
//!
//! The `taskboard` binary runs the coordination service for agent
//! fleets.
//!
//! ## Commands
//!
//! - `taskboard serve`: HTTP server with the embedded deadline reaper
//! - `taskboard check-deadlines`: one reaper pass, then exit (suited
//!   for an external periodic runner)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod commands;

use commands::serve::ServeArgs;

/// Task coordination service for agent fleets
#[derive(Parser)]
#[command(name = "taskboard")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(short = 'd', long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server
    Serve(ServeArgs),

    /// Check and update expired task deadlines
    CheckDeadlines,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let database_url = cli
        .database_url
        .context("database URL is required (--database-url or DATABASE_URL)")?;

    match cli.command {
        Some(Commands::CheckDeadlines) => commands::check_deadlines::run(&database_url).await,
        Some(Commands::Serve(args)) => commands::serve::run(&database_url, args).await,
        None => commands::serve::run(&database_url, ServeArgs::default()).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
