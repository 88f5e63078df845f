// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;

use taskboard_core::application::DeadlineReaper;
use taskboard_core::infrastructure::{Database, PgStore};

/// One deadline-expiration pass, then exit. Pair with cron or a systemd
/// timer when the long-running server is not wanted.
pub async fn run(database_url: &str) -> Result<()> {
    let db = Database::connect(database_url)
        .await
        .context("failed to connect to database")?;
    db.migrate().await.context("failed to run migrations")?;

    let store = Arc::new(PgStore::new(db.pool().clone()));
    let reaper = DeadlineReaper::new(store);
    let report = reaper.run_once().await?;

    if report.total == 0 {
        println!("{}", "no expired deadlines found".green());
    } else {
        println!(
            "{}: {} expired, {} moved to STUCK, {} failed",
            "deadline pass complete".green(),
            report.total,
            report.successful,
            report.failed
        );
    }

    if report.failed > 0 {
        anyhow::bail!("{} of {} expired tasks failed", report.failed, report.total);
    }
    Ok(())
}
