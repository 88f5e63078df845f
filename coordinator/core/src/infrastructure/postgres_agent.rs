// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::repository::{AgentRepository, StoreError};
use crate::domain::workspace::WorkspaceId;

const AGENT_COLUMNS: &str = "id, workspace_id, name, token, is_active, created_at";

pub struct PgAgentRepository {
    pool: PgPool,
}

impl PgAgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn agent_from_row(row: &PgRow) -> Result<Agent, StoreError> {
    let field = |e: sqlx::Error| StoreError::Decode(e.to_string());
    Ok(Agent {
        id: AgentId(row.try_get::<Uuid, _>("id").map_err(field)?),
        workspace_id: WorkspaceId(row.try_get::<Uuid, _>("workspace_id").map_err(field)?),
        name: row.try_get("name").map_err(field)?,
        token: row.try_get("token").map_err(field)?,
        is_active: row.try_get("is_active").map_err(field)?,
        created_at: row.try_get("created_at").map_err(field)?,
    })
}

#[async_trait]
impl AgentRepository for PgAgentRepository {
    async fn get_by_token(&self, token: &str) -> Result<Option<Agent>, StoreError> {
        let row = sqlx::query(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE token = $1"))
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(agent_from_row).transpose()
    }

    async fn get_by_id(&self, id: AgentId) -> Result<Option<Agent>, StoreError> {
        let row = sqlx::query(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(agent_from_row).transpose()
    }
}
