// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL connection pool.
//!
//! Wraps `sqlx::postgres::PgPool` in a thin `Database` newtype injected
//! into the repository implementations. The pool is intentionally small:
//! every transition holds a connection only for the brief write+event
//! window.

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::domain::repository::StoreError;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(connection_string: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(connection_string)
            .await?;
        Ok(Self { pool })
    }

    /// Apply all pending schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
