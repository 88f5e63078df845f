// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::repository::{StoreError, WorkspaceRepository};
use crate::domain::task::TaskStatus;
use crate::domain::workspace::{Workspace, WorkspaceId};

pub struct PgWorkspaceRepository {
    pool: PgPool,
}

impl PgWorkspaceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkspaceRepository for PgWorkspaceRepository {
    async fn get_by_id(&self, id: WorkspaceId) -> Result<Option<Workspace>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, slug, status_deadlines, created_at FROM workspaces WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let field = |e: sqlx::Error| StoreError::Decode(e.to_string());
        let deadlines_json: serde_json::Value =
            row.try_get("status_deadlines").map_err(field)?;
        let raw: HashMap<String, i64> = serde_json::from_value(deadlines_json)
            .map_err(|e| StoreError::Decode(format!("status_deadlines: {e}")))?;
        let mut status_deadlines = HashMap::new();
        for (key, minutes) in raw {
            let status = TaskStatus::parse(&key)
                .ok_or_else(|| StoreError::Decode(format!("unknown status in deadlines: {key:?}")))?;
            status_deadlines.insert(status, minutes);
        }

        Ok(Some(Workspace {
            id: WorkspaceId(row.try_get::<Uuid, _>("id").map_err(field)?),
            name: row.try_get("name").map_err(field)?,
            slug: row.try_get("slug").map_err(field)?,
            status_deadlines,
            created_at: row.try_get("created_at").map_err(field)?,
        }))
    }
}
