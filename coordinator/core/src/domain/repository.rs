// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Storage traits for the coordination core.
//!
//! The store is a data-only abstraction: it persists tasks and events
//! and executes conditional writes, but interprets no state-machine
//! rules. Mutating calls take an external transaction handle so the
//! application layer can compose a status write and its audit event
//! into one atomic unit.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::event::{EventKind, TaskEvent};
use crate::domain::listing::TaskFilters;
use crate::domain::task::{Task, TaskId, TaskPriority, TaskStatus, TaskVisibility};
use crate::domain::workspace::{Workspace, WorkspaceId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Fields for task creation. Ids and timestamps are issued by the store.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub workspace_id: WorkspaceId,
    pub title: String,
    pub description: String,
    pub creator_id: AgentId,
    pub assignee_id: Option<AgentId>,
    pub status: TaskStatus,
    pub visibility: TaskVisibility,
    pub priority: TaskPriority,
    pub blocked_by: Vec<TaskId>,
    pub status_deadline_at: Option<DateTime<Utc>>,
}

/// A conditional status write: applied only while the stored status
/// still equals `observed` (and, for claims, the task is unassigned).
#[derive(Debug, Clone)]
pub struct StatusWrite {
    pub task_id: TaskId,
    pub observed: TaskStatus,
    pub new_status: TaskStatus,
    pub assignee_id: Option<AgentId>,
    pub status_deadline_at: Option<DateTime<Utc>>,
    pub require_unassigned: bool,
}

/// Fields for event append. Id and timestamp are issued by the store.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub task_id: TaskId,
    pub actor_id: Option<AgentId>,
    pub kind: EventKind,
    pub old_status: Option<TaskStatus>,
    pub new_status: Option<TaskStatus>,
    pub comment: String,
}

/// An event joined with its actor's display name (None for system events).
#[derive(Debug, Clone)]
pub struct EventWithActor {
    pub event: TaskEvent,
    pub actor_name: Option<String>,
}

/// A task with the derived annotations returned by listing queries.
#[derive(Debug, Clone)]
pub struct TaskAnnotated {
    pub task: Task,
    pub has_unresolved_blockers: bool,
    pub is_overdue: bool,
}

#[derive(Debug, Clone)]
pub struct StatsQuery {
    pub workspace_id: WorkspaceId,
    /// None = no lower bound ("all").
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: DateTime<Utc>,
    pub agent_id: Option<AgentId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceStats {
    pub total_tasks_created: i64,
    pub tasks_by_status: HashMap<TaskStatus, i64>,
    pub overdue_count: i64,
    pub stuck_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentStats {
    pub agent_id: AgentId,
    pub agent_name: String,
    pub tasks_completed: i64,
    pub tasks_cancelled: i64,
    pub tasks_stuck_count: i64,
    pub tasks_in_progress: i64,
}

/// Persistence for tasks and their audit events.
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// Transaction handle threaded through mutating calls.
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError>;
    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError>;

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, StoreError>;

    /// Read with a row lock, serialising concurrent writers on the same
    /// task for the duration of the transaction.
    async fn get_task_for_update(
        &self,
        tx: &mut Self::Tx,
        id: TaskId,
    ) -> Result<Option<Task>, StoreError>;

    async fn create_task(&self, tx: &mut Self::Tx, task: NewTask) -> Result<Task, StoreError>;

    /// Conditional update. Returns false when no row matched the
    /// condition, i.e. the write lost a race.
    async fn update_status(
        &self,
        tx: &mut Self::Tx,
        write: &StatusWrite,
    ) -> Result<bool, StoreError>;

    async fn append_event(&self, tx: &mut Self::Tx, event: NewEvent)
        -> Result<TaskEvent, StoreError>;

    /// All events of a task in timestamp order, joined with actor names.
    async fn events_for_task(&self, task_id: TaskId) -> Result<Vec<EventWithActor>, StoreError>;

    /// Batch read of blocker tasks, confined to one workspace. Unknown
    /// ids are simply absent from the result.
    async fn get_blockers(
        &self,
        workspace_id: WorkspaceId,
        ids: &[TaskId],
    ) -> Result<Vec<Task>, StoreError>;

    /// Tasks whose deadline has elapsed while in a deadline-bearing state.
    async fn find_expired(&self) -> Result<Vec<Task>, StoreError>;

    /// Filtered page plus the total count under the same filter
    /// (including the visibility predicate).
    async fn list(&self, filters: &TaskFilters)
        -> Result<(Vec<TaskAnnotated>, i64), StoreError>;

    async fn workspace_stats(&self, query: &StatsQuery) -> Result<WorkspaceStats, StoreError>;
    async fn agent_stats(&self, query: &StatsQuery) -> Result<Vec<AgentStats>, StoreError>;

    /// Liveness probe for the storage backend.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Read-side directory of agents.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn get_by_token(&self, token: &str) -> Result<Option<Agent>, StoreError>;
    async fn get_by_id(&self, id: AgentId) -> Result<Option<Agent>, StoreError>;
}

/// Read-side directory of workspaces.
#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    async fn get_by_id(&self, id: WorkspaceId) -> Result<Option<Workspace>, StoreError>;
}
