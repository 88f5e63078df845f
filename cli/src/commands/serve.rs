// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use taskboard_core::application::{DeadlineReaper, TaskService};
use taskboard_core::domain::repository::{AgentRepository, WorkspaceRepository};
use taskboard_core::infrastructure::{
    Database, PgAgentRepository, PgStore, PgWorkspaceRepository,
};
use taskboard_core::presentation::app;

#[derive(Args)]
pub struct ServeArgs {
    /// HTTP listen host
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP listen port
    #[arg(short = 'p', long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Seconds between deadline reaper passes
    #[arg(long, env = "REAPER_INTERVAL_SECS", default_value_t = 60)]
    pub reaper_interval: u64,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            reaper_interval: 60,
        }
    }
}

pub async fn run(database_url: &str, args: ServeArgs) -> Result<()> {
    let db = Database::connect(database_url)
        .await
        .context("failed to connect to database")?;
    db.migrate().await.context("failed to run migrations")?;

    let pool = db.pool().clone();
    let store = Arc::new(PgStore::new(pool.clone()));
    let agents: Arc<dyn AgentRepository> = Arc::new(PgAgentRepository::new(pool.clone()));
    let workspaces: Arc<dyn WorkspaceRepository> = Arc::new(PgWorkspaceRepository::new(pool));
    let service = TaskService::new(store.clone(), agents.clone(), workspaces);

    let reaper = DeadlineReaper::new(store);
    let interval = Duration::from_secs(args.reaper_interval.max(1));
    tokio::spawn(async move {
        reaper.run_periodic(interval).await;
    });

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "starting server");

    axum::serve(listener, app(service, agents))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutting down server");
}
