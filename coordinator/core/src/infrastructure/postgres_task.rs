// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Task Store
//!
//! Production [`TaskStore`] backed by the `tasks` and `task_events`
//! tables. Conditional writes condition on the observed status
//! (`WHERE id = $1 AND status = $observed`); zero rows affected means
//! the caller lost a race. Dynamic listing filters are assembled with
//! `sqlx::QueryBuilder`: only allow-listed column names are ever
//! interpolated, everything else is bound.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow, Postgres};
use sqlx::{QueryBuilder, Row, Transaction};
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::domain::event::{EventId, EventKind, TaskEvent};
use crate::domain::listing::{SortField, TaskFilters};
use crate::domain::repository::{
    AgentStats, EventWithActor, NewEvent, NewTask, StatsQuery, StatusWrite, StoreError,
    TaskAnnotated, TaskStore, WorkspaceStats,
};
use crate::domain::task::{Task, TaskId, TaskPriority, TaskStatus, TaskVisibility};
use crate::domain::workspace::WorkspaceId;

const TASK_COLUMNS: &str = "id, workspace_id, title, description, creator_id, assignee_id, \
                            status, visibility, priority, blocked_by, status_deadline_at, \
                            created_at, updated_at";

/// Rank expression matching `TaskPriority::rank`; used for priority sort.
const PRIORITY_RANK: &str = "CASE priority WHEN 'critical' THEN 4 WHEN 'high' THEN 3 \
                             WHEN 'normal' THEN 2 WHEN 'low' THEN 1 END";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode<T>(result: Result<T, sqlx::Error>, column: &str) -> Result<T, StoreError> {
    result.map_err(|e| StoreError::Decode(format!("column {column}: {e}")))
}

fn task_from_row(row: &PgRow) -> Result<Task, StoreError> {
    let status_str: String = decode(row.try_get("status"), "status")?;
    let status = TaskStatus::parse(&status_str)
        .ok_or_else(|| StoreError::Decode(format!("unknown task status {status_str:?}")))?;

    let visibility_str: String = decode(row.try_get("visibility"), "visibility")?;
    let visibility = TaskVisibility::parse(&visibility_str)
        .ok_or_else(|| StoreError::Decode(format!("unknown visibility {visibility_str:?}")))?;

    let priority_str: String = decode(row.try_get("priority"), "priority")?;
    let priority = TaskPriority::parse(&priority_str)
        .ok_or_else(|| StoreError::Decode(format!("unknown priority {priority_str:?}")))?;

    let blocked_by: Vec<Uuid> = decode(row.try_get("blocked_by"), "blocked_by")?;

    Ok(Task {
        id: TaskId(decode(row.try_get("id"), "id")?),
        workspace_id: WorkspaceId(decode(row.try_get("workspace_id"), "workspace_id")?),
        title: decode(row.try_get("title"), "title")?,
        description: decode(row.try_get("description"), "description")?,
        creator_id: AgentId(decode(row.try_get("creator_id"), "creator_id")?),
        assignee_id: decode(row.try_get::<Option<Uuid>, _>("assignee_id"), "assignee_id")?
            .map(AgentId),
        status,
        visibility,
        priority,
        blocked_by: blocked_by.into_iter().map(TaskId).collect(),
        status_deadline_at: decode(row.try_get("status_deadline_at"), "status_deadline_at")?,
        created_at: decode(row.try_get("created_at"), "created_at")?,
        updated_at: decode(row.try_get("updated_at"), "updated_at")?,
    })
}

fn event_from_row(row: &PgRow) -> Result<TaskEvent, StoreError> {
    let kind_str: String = decode(row.try_get("type"), "type")?;
    let kind = EventKind::parse(&kind_str)
        .ok_or_else(|| StoreError::Decode(format!("unknown event type {kind_str:?}")))?;

    let old_status = parse_status_opt(decode(row.try_get("old_status"), "old_status")?)?;
    let new_status = parse_status_opt(decode(row.try_get("new_status"), "new_status")?)?;

    Ok(TaskEvent {
        id: EventId(decode(row.try_get("id"), "id")?),
        task_id: TaskId(decode(row.try_get("task_id"), "task_id")?),
        actor_id: decode(row.try_get::<Option<Uuid>, _>("actor_id"), "actor_id")?.map(AgentId),
        kind,
        old_status,
        new_status,
        comment: decode(row.try_get("comment"), "comment")?,
        created_at: decode(row.try_get("created_at"), "created_at")?,
    })
}

fn parse_status_opt(value: Option<String>) -> Result<Option<TaskStatus>, StoreError> {
    value
        .map(|s| {
            TaskStatus::parse(&s)
                .ok_or_else(|| StoreError::Decode(format!("unknown task status {s:?}")))
        })
        .transpose()
}

/// Append the WHERE clauses shared by the page and count queries. The
/// leading `WHERE workspace_id = …` is always present.
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, f: &TaskFilters) {
    qb.push(" WHERE workspace_id = ");
    qb.push_bind(f.workspace_id.0);

    if !f.statuses.is_empty() {
        let statuses: Vec<String> = f.statuses.iter().map(|s| s.as_str().to_string()).collect();
        qb.push(" AND status = ANY(");
        qb.push_bind(statuses);
        qb.push(")");
    }

    if f.unassigned {
        qb.push(" AND assignee_id IS NULL");
    } else if let Some(assignee) = f.assignee_id {
        qb.push(" AND assignee_id = ");
        qb.push_bind(assignee.0);
    }

    // The private-visibility rule is part of the query itself so private
    // tasks can leak neither into pages nor into totals.
    match f.visibility {
        Some(TaskVisibility::Public) => {
            qb.push(" AND visibility = 'public'");
        }
        Some(TaskVisibility::Private) => {
            qb.push(" AND visibility = 'private' AND (creator_id = ");
            qb.push_bind(f.viewer_id.0);
            qb.push(" OR assignee_id = ");
            qb.push_bind(f.viewer_id.0);
            qb.push(")");
        }
        None => {
            qb.push(" AND (visibility = 'public' OR (visibility = 'private' AND (creator_id = ");
            qb.push_bind(f.viewer_id.0);
            qb.push(" OR assignee_id = ");
            qb.push_bind(f.viewer_id.0);
            qb.push(")))");
        }
    }

    if !f.priorities.is_empty() {
        let priorities: Vec<String> = f.priorities.iter().map(|p| p.as_str().to_string()).collect();
        qb.push(" AND priority = ANY(");
        qb.push_bind(priorities);
        qb.push(")");
    }

    if f.overdue_only {
        qb.push(" AND status_deadline_at < NOW()");
    }

    if f.unresolved_blockers_only {
        qb.push(
            " AND EXISTS (SELECT 1 FROM tasks b \
             WHERE b.id = ANY(tasks.blocked_by) AND b.status <> 'DONE')",
        );
    }
}

fn push_order_by(qb: &mut QueryBuilder<'_, Postgres>, f: &TaskFilters) {
    qb.push(" ORDER BY ");
    let sort = f.effective_sort();
    for (i, key) in sort.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        // Sort fields come from a closed enum; no caller input lands here.
        match key.field {
            SortField::Priority => qb.push(PRIORITY_RANK),
            other => qb.push(other.column()),
        };
        qb.push(if key.descending { " DESC" } else { " ASC" });
    }
}

#[async_trait]
impl TaskStore for PgStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError> {
        Ok(tx.commit().await?)
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError> {
        Ok(tx.rollback().await?)
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn get_task_for_update(
        &self,
        tx: &mut Self::Tx,
        id: TaskId,
    ) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.0)
        .fetch_optional(&mut **tx)
        .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn create_task(&self, tx: &mut Self::Tx, task: NewTask) -> Result<Task, StoreError> {
        let blocked_by: Vec<Uuid> = task.blocked_by.iter().map(|b| b.0).collect();
        let row = sqlx::query(
            "INSERT INTO tasks (workspace_id, title, description, creator_id, assignee_id, \
             status, visibility, priority, blocked_by, status_deadline_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING id, created_at, updated_at",
        )
        .bind(task.workspace_id.0)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.creator_id.0)
        .bind(task.assignee_id.map(|a| a.0))
        .bind(task.status.as_str())
        .bind(task.visibility.as_str())
        .bind(task.priority.as_str())
        .bind(&blocked_by)
        .bind(task.status_deadline_at)
        .fetch_one(&mut **tx)
        .await?;

        Ok(Task {
            id: TaskId(decode(row.try_get("id"), "id")?),
            workspace_id: task.workspace_id,
            title: task.title,
            description: task.description,
            creator_id: task.creator_id,
            assignee_id: task.assignee_id,
            status: task.status,
            visibility: task.visibility,
            priority: task.priority,
            blocked_by: task.blocked_by,
            status_deadline_at: task.status_deadline_at,
            created_at: decode(row.try_get("created_at"), "created_at")?,
            updated_at: decode(row.try_get("updated_at"), "updated_at")?,
        })
    }

    async fn update_status(
        &self,
        tx: &mut Self::Tx,
        write: &StatusWrite,
    ) -> Result<bool, StoreError> {
        let mut sql = String::from(
            "UPDATE tasks SET status = $1, assignee_id = $2, status_deadline_at = $3, \
             updated_at = NOW() WHERE id = $4 AND status = $5",
        );
        if write.require_unassigned {
            sql.push_str(" AND assignee_id IS NULL");
        }

        let result = sqlx::query(&sql)
            .bind(write.new_status.as_str())
            .bind(write.assignee_id.map(|a| a.0))
            .bind(write.status_deadline_at)
            .bind(write.task_id.0)
            .bind(write.observed.as_str())
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_event(
        &self,
        tx: &mut Self::Tx,
        event: NewEvent,
    ) -> Result<TaskEvent, StoreError> {
        let row = sqlx::query(
            "INSERT INTO task_events (task_id, actor_id, type, old_status, new_status, comment) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id, created_at",
        )
        .bind(event.task_id.0)
        .bind(event.actor_id.map(|a| a.0))
        .bind(event.kind.as_str())
        .bind(event.old_status.map(TaskStatus::as_str))
        .bind(event.new_status.map(TaskStatus::as_str))
        .bind(&event.comment)
        .fetch_one(&mut **tx)
        .await?;

        Ok(TaskEvent {
            id: EventId(decode(row.try_get("id"), "id")?),
            task_id: event.task_id,
            actor_id: event.actor_id,
            kind: event.kind,
            old_status: event.old_status,
            new_status: event.new_status,
            comment: event.comment,
            created_at: decode(row.try_get("created_at"), "created_at")?,
        })
    }

    async fn events_for_task(&self, task_id: TaskId) -> Result<Vec<EventWithActor>, StoreError> {
        let rows = sqlx::query(
            "SELECT te.id, te.task_id, te.actor_id, a.name AS actor_name, te.type, \
             te.old_status, te.new_status, te.comment, te.created_at \
             FROM task_events te \
             LEFT JOIN agents a ON te.actor_id = a.id \
             WHERE te.task_id = $1 \
             ORDER BY te.created_at ASC",
        )
        .bind(task_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(EventWithActor {
                    event: event_from_row(row)?,
                    actor_name: decode(row.try_get("actor_name"), "actor_name")?,
                })
            })
            .collect()
    }

    async fn get_blockers(
        &self,
        workspace_id: WorkspaceId,
        ids: &[TaskId],
    ) -> Result<Vec<Task>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let uuids: Vec<Uuid> = ids.iter().map(|t| t.0).collect();
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE workspace_id = $1 AND id = ANY($2)"
        ))
        .bind(workspace_id.0)
        .bind(&uuids)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(task_from_row).collect()
    }

    async fn find_expired(&self) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE status_deadline_at < NOW() \
             AND status = ANY(ARRAY['NEW', 'IN_PROGRESS', 'BLOCKED'])"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(task_from_row).collect()
    }

    async fn list(
        &self,
        filters: &TaskFilters,
    ) -> Result<(Vec<TaskAnnotated>, i64), StoreError> {
        let mut qb = QueryBuilder::new(format!("SELECT {TASK_COLUMNS} FROM tasks"));
        push_filters(&mut qb, filters);
        push_order_by(&mut qb, filters);
        qb.push(" LIMIT ");
        qb.push_bind(filters.limit);
        qb.push(" OFFSET ");
        qb.push_bind(filters.offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let tasks: Vec<Task> = rows
            .iter()
            .map(task_from_row)
            .collect::<Result<_, _>>()?;

        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM tasks");
        push_filters(&mut count_qb, filters);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        // Single batch read over the union of blocker ids (no N+1).
        let blocker_ids: Vec<TaskId> = {
            let mut seen = HashSet::new();
            tasks
                .iter()
                .flat_map(|t| t.blocked_by.iter().copied())
                .filter(|id| seen.insert(*id))
                .collect()
        };
        let blocker_status: HashMap<TaskId, TaskStatus> = self
            .get_blockers(filters.workspace_id, &blocker_ids)
            .await?
            .into_iter()
            .map(|t| (t.id, t.status))
            .collect();

        let now = Utc::now();
        let annotated = tasks
            .into_iter()
            .map(|task| TaskAnnotated {
                has_unresolved_blockers: task.blocked_by.iter().any(|id| {
                    blocker_status
                        .get(id)
                        .map_or(true, |s| *s != TaskStatus::Done)
                }),
                is_overdue: task.is_overdue(now),
                task,
            })
            .collect();

        Ok((annotated, total))
    }

    async fn workspace_stats(&self, query: &StatsQuery) -> Result<WorkspaceStats, StoreError> {
        let period_start = effective_start(query.period_start);

        let total_tasks_created: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tasks \
             WHERE workspace_id = $1 AND created_at >= $2 AND created_at <= $3",
        )
        .bind(query.workspace_id.0)
        .bind(period_start)
        .bind(query.period_end)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS count FROM tasks WHERE workspace_id = $1 GROUP BY status",
        )
        .bind(query.workspace_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut tasks_by_status = HashMap::new();
        for row in &rows {
            let status_str: String = decode(row.try_get("status"), "status")?;
            let status = TaskStatus::parse(&status_str)
                .ok_or_else(|| StoreError::Decode(format!("unknown task status {status_str:?}")))?;
            let count: i64 = decode(row.try_get("count"), "count")?;
            tasks_by_status.insert(status, count);
        }

        let overdue_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tasks \
             WHERE workspace_id = $1 \
             AND status = ANY(ARRAY['NEW', 'IN_PROGRESS', 'BLOCKED']) \
             AND status_deadline_at < NOW()",
        )
        .bind(query.workspace_id.0)
        .fetch_one(&self.pool)
        .await?;

        let stuck_count = tasks_by_status
            .get(&TaskStatus::Stuck)
            .copied()
            .unwrap_or(0);

        Ok(WorkspaceStats {
            total_tasks_created,
            tasks_by_status,
            overdue_count,
            stuck_count,
        })
    }

    async fn agent_stats(&self, query: &StatsQuery) -> Result<Vec<AgentStats>, StoreError> {
        let period_start = effective_start(query.period_start);

        let mut qb = QueryBuilder::new(
            "SELECT a.id, a.name, \
             COUNT(CASE WHEN t.status = 'DONE' AND t.updated_at >= ",
        );
        qb.push_bind(period_start);
        qb.push(" AND t.updated_at <= ");
        qb.push_bind(query.period_end);
        qb.push(" THEN 1 END) AS tasks_completed, COUNT(CASE WHEN t.status = 'CANCELLED' AND t.updated_at >= ");
        qb.push_bind(period_start);
        qb.push(" AND t.updated_at <= ");
        qb.push_bind(query.period_end);
        qb.push(
            " THEN 1 END) AS tasks_cancelled, \
             COUNT(CASE WHEN t.status = 'STUCK' THEN 1 END) AS tasks_stuck_count, \
             COUNT(CASE WHEN t.status = 'IN_PROGRESS' THEN 1 END) AS tasks_in_progress \
             FROM agents a \
             LEFT JOIN tasks t ON t.assignee_id = a.id AND t.workspace_id = ",
        );
        qb.push_bind(query.workspace_id.0);
        qb.push(" WHERE a.workspace_id = ");
        qb.push_bind(query.workspace_id.0);
        qb.push(" AND a.is_active = TRUE");
        if let Some(agent_id) = query.agent_id {
            qb.push(" AND a.id = ");
            qb.push_bind(agent_id.0);
        }
        qb.push(" GROUP BY a.id, a.name ORDER BY a.name");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(AgentStats {
                    agent_id: AgentId(decode(row.try_get("id"), "id")?),
                    agent_name: decode(row.try_get("name"), "name")?,
                    tasks_completed: decode(row.try_get("tasks_completed"), "tasks_completed")?,
                    tasks_cancelled: decode(row.try_get("tasks_cancelled"), "tasks_cancelled")?,
                    tasks_stuck_count: decode(
                        row.try_get("tasks_stuck_count"),
                        "tasks_stuck_count",
                    )?,
                    tasks_in_progress: decode(
                        row.try_get("tasks_in_progress"),
                        "tasks_in_progress",
                    )?,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn effective_start(start: Option<DateTime<Utc>>) -> DateTime<Utc> {
    start.unwrap_or(DateTime::UNIX_EPOCH)
}
