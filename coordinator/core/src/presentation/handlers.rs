// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP handlers for the `/api/v1` surface.
//!
//! Handlers stay thin: parse and validate the wire input, call the task
//! service, convert the result into a DTO. Business rules live in the
//! application and domain layers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{Months, Utc};
use tracing::error;
use uuid::Uuid;

use crate::application::task_service::CreateTask;
use crate::domain::agent::{Agent, AgentId};
use crate::domain::listing::{clamp_limit, SortKey, TaskFilters};
use crate::domain::repository::{StatsQuery, TaskStore};
use crate::domain::task::{TaskId, TaskPriority, TaskStatus, TaskVisibility};
use crate::presentation::api::AppState;
use crate::presentation::dto::{
    ApiError, CommentRequest, CreateTaskRequest, ListTasksQuery, StatsRequestQuery,
    StatsResponse, TaskDetailResponse, TaskEventResponse, TaskSummary, TasksListResponse,
    TaskView, TransitionStatusRequest,
};

static SKILL_MD: &str = include_str!("../../static/skill.md");

fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    Uuid::parse_str(raw)
        .map(TaskId)
        .map_err(|_| ApiError::invalid_request("task id must be a valid UUID"))
}

fn split_csv(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

pub async fn list_tasks<S: TaskStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(agent): Extension<Agent>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<TasksListResponse>, ApiError> {
    let mut filters = TaskFilters::for_viewer(agent.workspace_id, agent.id);

    if let Some(raw) = &query.status {
        for token in split_csv(raw) {
            let status = TaskStatus::parse(token)
                .ok_or_else(|| ApiError::validation(format!("invalid status {token:?}")))?;
            filters.statuses.push(status);
        }
    }

    if let Some(raw) = &query.assignee {
        filters.assignee_id = Some(if raw == "me" {
            agent.id
        } else {
            AgentId(Uuid::parse_str(raw).map_err(|_| {
                ApiError::validation("assignee must be 'me' or an agent UUID")
            })?)
        });
    }
    filters.unassigned = query.unassigned.unwrap_or(false);

    if let Some(raw) = &query.visibility {
        let visibility = TaskVisibility::parse(raw)
            .ok_or_else(|| ApiError::validation("visibility must be 'public' or 'private'"))?;
        filters.visibility = Some(visibility);
    }

    if let Some(raw) = &query.priority {
        for token in split_csv(raw) {
            let priority = TaskPriority::parse(token)
                .ok_or_else(|| ApiError::validation(format!("invalid priority {token:?}")))?;
            filters.priorities.push(priority);
        }
    }

    filters.overdue_only = query.overdue.unwrap_or(false);
    filters.unresolved_blockers_only = query.has_unresolved_blockers.unwrap_or(false);
    if let Some(raw) = &query.sort {
        // Unknown sort keys are dropped, not rejected.
        filters.sort = SortKey::parse_list(raw);
    }
    filters.limit = clamp_limit(query.limit);
    filters.offset = query.offset.unwrap_or(0).max(0);

    let limit = filters.limit;
    let offset = filters.offset;
    let (tasks, total) = state.service.list_tasks(&agent, filters).await?;

    Ok(Json(TasksListResponse {
        tasks: tasks.into_iter().map(TaskSummary::from).collect(),
        total,
        limit,
        offset,
    }))
}

pub async fn create_task<S: TaskStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(agent): Extension<Agent>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskView>), ApiError> {
    let visibility = match &body.visibility {
        Some(raw) => TaskVisibility::parse(raw)
            .ok_or_else(|| ApiError::validation("visibility must be 'public' or 'private'"))?,
        None => TaskVisibility::Public,
    };
    let priority = match &body.priority {
        Some(raw) => TaskPriority::parse(raw).ok_or_else(|| {
            ApiError::validation("priority must be 'low', 'normal', 'high', or 'critical'")
        })?,
        None => TaskPriority::Normal,
    };

    let input = CreateTask {
        title: body.title,
        description: body.description,
        assignee_id: body.assignee_id.map(AgentId),
        visibility,
        priority,
        blocked_by: body
            .blocked_by
            .unwrap_or_default()
            .into_iter()
            .map(TaskId)
            .collect(),
    };

    let task = state.service.create_task(&agent, input).await?;
    Ok((StatusCode::CREATED, Json(TaskView::from(task))))
}

pub async fn get_task<S: TaskStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(agent): Extension<Agent>,
    Path(id): Path<String>,
) -> Result<Json<TaskDetailResponse>, ApiError> {
    let id = parse_task_id(&id)?;
    let detail = state.service.get_task_detail(&agent, id).await?;
    Ok(Json(TaskDetailResponse {
        task: TaskView::from(detail.task),
        events: detail.events.into_iter().map(Into::into).collect(),
    }))
}

pub async fn transition_status<S: TaskStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(agent): Extension<Agent>,
    Path(id): Path<String>,
    Json(body): Json<TransitionStatusRequest>,
) -> Result<Json<TaskEventResponse>, ApiError> {
    let id = parse_task_id(&id)?;
    let status = TaskStatus::parse(&body.status)
        .ok_or_else(|| ApiError::validation(format!("invalid status {:?}", body.status)))?;
    let event = state
        .service
        .transition_status(&agent, id, status, &body.comment)
        .await?;
    Ok(Json(event.into()))
}

pub async fn claim_task<S: TaskStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(agent): Extension<Agent>,
    Path(id): Path<String>,
    Json(body): Json<CommentRequest>,
) -> Result<Json<TaskEventResponse>, ApiError> {
    let id = parse_task_id(&id)?;
    let event = state.service.claim(&agent, id, &body.comment).await?;
    Ok(Json(event.into()))
}

pub async fn escalate_task<S: TaskStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(agent): Extension<Agent>,
    Path(id): Path<String>,
    Json(body): Json<CommentRequest>,
) -> Result<Json<TaskEventResponse>, ApiError> {
    let id = parse_task_id(&id)?;
    let event = state.service.escalate(&agent, id, &body.comment).await?;
    Ok(Json(event.into()))
}

pub async fn takeover_task<S: TaskStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(agent): Extension<Agent>,
    Path(id): Path<String>,
    Json(body): Json<CommentRequest>,
) -> Result<Json<TaskEventResponse>, ApiError> {
    let id = parse_task_id(&id)?;
    let event = state.service.takeover(&agent, id, &body.comment).await?;
    Ok(Json(event.into()))
}

pub async fn comment_task<S: TaskStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(agent): Extension<Agent>,
    Path(id): Path<String>,
    Json(body): Json<CommentRequest>,
) -> Result<(StatusCode, Json<TaskEventResponse>), ApiError> {
    let id = parse_task_id(&id)?;
    let event = state.service.comment(&agent, id, &body.comment).await?;
    Ok((StatusCode::CREATED, Json(event.into())))
}

pub async fn get_stats<S: TaskStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(agent): Extension<Agent>,
    Query(query): Query<StatsRequestQuery>,
) -> Result<Json<StatsResponse>, ApiError> {
    let period = query.period.as_deref().unwrap_or("week");
    let now = Utc::now();
    let period_start = match period {
        "day" => Some(now - chrono::Duration::days(1)),
        "week" => Some(now - chrono::Duration::days(7)),
        "month" => now.checked_sub_months(Months::new(1)),
        "all" => None,
        _ => {
            return Err(ApiError::validation(
                "invalid period, must be: day, week, month, all",
            ))
        }
    };

    let stats_query = StatsQuery {
        workspace_id: agent.workspace_id,
        period_start,
        period_end: now,
        agent_id: query.agent_id.map(AgentId),
    };
    let (workspace, agents) = state.service.stats(&agent, stats_query).await?;

    Ok(Json(StatsResponse {
        period: period.to_string(),
        period_start,
        period_end: now,
        agents,
        workspace: workspace.into(),
    }))
}

pub async fn healthz<S: TaskStore>(State(state): State<Arc<AppState<S>>>) -> Response {
    match state.service.ping().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            error!(error = %e, "database health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable").into_response()
        }
    }
}

/// Operating manual served to agents at `/skill.md`.
pub async fn skill_md() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        SKILL_MD,
    )
}
