// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Wire DTOs and the error envelope.
//!
//! `ApiError` carries the (HTTP status, wire code) pair for every domain
//! error kind. Unmapped internal errors are logged with context and
//! surfaced as a generic `INTERNAL_ERROR`; raw database messages never
//! reach the client.

use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::domain::error::DomainError;
use crate::domain::event::{EventId, EventKind, TaskEvent};
use crate::domain::repository::{AgentStats, EventWithActor, TaskAnnotated, WorkspaceStats};
use crate::domain::task::{TaskId, TaskPriority, TaskStatus, TaskVisibility};

// ----------------------------------------------------------------------
// Requests
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub blocked_by: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionStatusRequest {
    pub status: String,
    #[serde(default)]
    pub comment: String,
}

/// Shared body of claim / escalate / takeover / comment.
#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub unassigned: Option<bool>,
    pub visibility: Option<String>,
    pub priority: Option<String>,
    pub overdue: Option<bool>,
    pub has_unresolved_blockers: Option<bool>,
    pub sort: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatsRequestQuery {
    pub period: Option<String>,
    pub agent_id: Option<Uuid>,
}

// ----------------------------------------------------------------------
// Responses
// ----------------------------------------------------------------------

/// List-view row: no description, no events.
#[derive(Debug, Serialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub visibility: TaskVisibility,
    pub creator_id: AgentId,
    pub assignee_id: Option<AgentId>,
    pub blocked_by: Vec<TaskId>,
    pub has_unresolved_blockers: bool,
    pub is_overdue: bool,
    pub status_deadline_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TaskAnnotated> for TaskSummary {
    fn from(annotated: TaskAnnotated) -> Self {
        let task = annotated.task;
        Self {
            id: task.id,
            title: task.title,
            status: task.status,
            priority: task.priority,
            visibility: task.visibility,
            creator_id: task.creator_id,
            assignee_id: task.assignee_id,
            blocked_by: task.blocked_by,
            has_unresolved_blockers: annotated.has_unresolved_blockers,
            is_overdue: annotated.is_overdue,
            status_deadline_at: task.status_deadline_at,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TasksListResponse {
    pub tasks: Vec<TaskSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Full task object, as returned by creation and detail.
#[derive(Debug, Serialize)]
pub struct TaskView {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub visibility: TaskVisibility,
    pub creator_id: AgentId,
    pub assignee_id: Option<AgentId>,
    pub blocked_by: Vec<TaskId>,
    pub has_unresolved_blockers: bool,
    pub is_overdue: bool,
    pub status_deadline_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TaskAnnotated> for TaskView {
    fn from(annotated: TaskAnnotated) -> Self {
        let task = annotated.task;
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            status: task.status,
            priority: task.priority,
            visibility: task.visibility,
            creator_id: task.creator_id,
            assignee_id: task.assignee_id,
            blocked_by: task.blocked_by,
            has_unresolved_blockers: annotated.has_unresolved_blockers,
            is_overdue: annotated.is_overdue,
            status_deadline_at: task.status_deadline_at,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskDetailResponse {
    pub task: TaskView,
    pub events: Vec<TaskEventInfo>,
}

/// Event in a detail view, joined with the actor's display name.
#[derive(Debug, Serialize)]
pub struct TaskEventInfo {
    pub id: EventId,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub actor_id: Option<AgentId>,
    pub actor_name: Option<String>,
    pub comment: String,
    pub old_status: Option<TaskStatus>,
    pub new_status: Option<TaskStatus>,
    pub created_at: DateTime<Utc>,
}

impl From<EventWithActor> for TaskEventInfo {
    fn from(with_actor: EventWithActor) -> Self {
        let event = with_actor.event;
        Self {
            id: event.id,
            kind: event.kind,
            actor_id: event.actor_id,
            actor_name: with_actor.actor_name,
            comment: event.comment,
            old_status: event.old_status,
            new_status: event.new_status,
            created_at: event.created_at,
        }
    }
}

/// Single-event response returned by the transition verbs.
#[derive(Debug, Serialize)]
pub struct TaskEventResponse {
    pub id: EventId,
    pub task_id: TaskId,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub actor_id: Option<AgentId>,
    pub old_status: Option<TaskStatus>,
    pub new_status: Option<TaskStatus>,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl From<TaskEvent> for TaskEventResponse {
    fn from(event: TaskEvent) -> Self {
        Self {
            id: event.id,
            task_id: event.task_id,
            kind: event.kind,
            actor_id: event.actor_id,
            old_status: event.old_status,
            new_status: event.new_status,
            comment: event.comment,
            created_at: event.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub period: String,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: DateTime<Utc>,
    pub agents: Vec<AgentStats>,
    pub workspace: WorkspaceStatsBody,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceStatsBody {
    pub total_tasks_created: i64,
    pub tasks_by_status: HashMap<TaskStatus, i64>,
    pub overdue_count: i64,
    pub stuck_count: i64,
    pub completion_rate_percent: f64,
}

impl From<WorkspaceStats> for WorkspaceStatsBody {
    fn from(stats: WorkspaceStats) -> Self {
        let total: i64 = stats.tasks_by_status.values().sum();
        let done = stats
            .tasks_by_status
            .get(&TaskStatus::Done)
            .copied()
            .unwrap_or(0);
        let completion_rate_percent = if total > 0 {
            done as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total_tasks_created: stats.total_tasks_created,
            tasks_by_status: stats.tasks_by_status,
            overdue_count: stats.overdue_count,
            stuck_count: stats.stuck_count,
            completion_rate_percent,
        }
    }
}

// ----------------------------------------------------------------------
// Error envelope
// ----------------------------------------------------------------------

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn invalid_token() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "INVALID_TOKEN",
            "authentication required",
        )
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        }));
        (self.status, body).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::TaskNotFound => {
                Self::new(StatusCode::NOT_FOUND, "TASK_NOT_FOUND", message)
            }
            DomainError::TaskAlreadyClaimed => {
                Self::new(StatusCode::CONFLICT, "TASK_ALREADY_CLAIMED", message)
            }
            DomainError::InvalidTransition { .. } => {
                Self::new(StatusCode::CONFLICT, "INVALID_TRANSITION", message)
            }
            DomainError::UnresolvedBlockers => {
                Self::new(StatusCode::CONFLICT, "UNRESOLVED_BLOCKERS", message)
            }
            DomainError::CyclicDependency(_) => {
                Self::new(StatusCode::CONFLICT, "CYCLIC_DEPENDENCY", message)
            }
            DomainError::CannotEscalateOwn => {
                Self::new(StatusCode::CONFLICT, "CANNOT_ESCALATE_OWN", message)
            }
            DomainError::CannotTakeover => {
                Self::new(StatusCode::CONFLICT, "CANNOT_TAKEOVER", message)
            }
            DomainError::InsufficientAccess => {
                Self::new(StatusCode::FORBIDDEN, "INSUFFICIENT_ACCESS", message)
            }
            DomainError::AgentNotFound => {
                Self::new(StatusCode::UNAUTHORIZED, "INVALID_TOKEN", message)
            }
            DomainError::AgentInactive => {
                Self::new(StatusCode::UNAUTHORIZED, "AGENT_INACTIVE", message)
            }
            DomainError::WorkspaceNotFound => {
                Self::new(StatusCode::NOT_FOUND, "WORKSPACE_NOT_FOUND", message)
            }
            DomainError::EmptyComment | DomainError::Validation(_) => Self::validation(message),
            DomainError::Store(store_err) => {
                error!(error = %store_err, "storage error surfaced to client");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal server error",
                )
            }
        }
    }
}
