// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Task Service
//!
//! The transition engine. Every verb follows the same shape: fail-fast
//! validation (comment, tenancy, visibility, role, dependency gates),
//! then one transaction spanning the conditional status write and the
//! audit event append: either both persist or neither does.
//!
//! Claim and takeover validate against a plain read and let the
//! conditional write decide races, so the losers of a parallel grab see
//! `TaskAlreadyClaimed`. Generic transitions and escalation re-read the
//! row under `FOR UPDATE` inside the transaction.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::application::deadline::calculate_deadline;
use crate::application::dependency::DependencyResolver;
use crate::domain::agent::{Agent, AgentId};
use crate::domain::error::DomainError;
use crate::domain::event::{EventKind, TaskEvent};
use crate::domain::listing::TaskFilters;
use crate::domain::repository::{
    AgentRepository, AgentStats, EventWithActor, NewEvent, NewTask, StatsQuery, StatusWrite,
    TaskAnnotated, TaskStore, WorkspaceRepository, WorkspaceStats,
};
use crate::domain::task::{Task, TaskId, TaskPriority, TaskStatus, TaskVisibility};
use crate::domain::transition::{
    check_claim, check_escalate, check_takeover, check_transition, check_view_access,
    clears_assignee,
};
use crate::domain::workspace::Workspace;

/// Input for task creation, already parsed at the boundary.
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub title: String,
    pub description: String,
    pub assignee_id: Option<AgentId>,
    pub visibility: TaskVisibility,
    pub priority: TaskPriority,
    pub blocked_by: Vec<TaskId>,
}

/// Full task view: the annotated task plus its event history.
#[derive(Debug)]
pub struct TaskDetail {
    pub task: TaskAnnotated,
    pub events: Vec<EventWithActor>,
}

pub struct TaskService<S> {
    store: Arc<S>,
    agents: Arc<dyn AgentRepository>,
    workspaces: Arc<dyn WorkspaceRepository>,
    resolver: DependencyResolver<S>,
}

impl<S: TaskStore> Clone for TaskService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            agents: self.agents.clone(),
            workspaces: self.workspaces.clone(),
            resolver: DependencyResolver::new(self.store.clone()),
        }
    }
}

impl<S: TaskStore> TaskService<S> {
    pub fn new(
        store: Arc<S>,
        agents: Arc<dyn AgentRepository>,
        workspaces: Arc<dyn WorkspaceRepository>,
    ) -> Self {
        let resolver = DependencyResolver::new(store.clone());
        Self {
            store,
            agents,
            workspaces,
            resolver,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn ping(&self) -> Result<(), DomainError> {
        Ok(self.store.ping().await?)
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create a task. With an `assignee_id` the task enters `IN_PROGRESS`
    /// directly, which requires every blocker to already be `DONE`.
    pub async fn create_task(
        &self,
        actor: &Agent,
        input: CreateTask,
    ) -> Result<TaskAnnotated, DomainError> {
        let title_len = input.title.chars().count();
        if !(5..=200).contains(&title_len) {
            return Err(DomainError::validation(
                "title must be between 5 and 200 characters",
            ));
        }
        if input.description.trim().is_empty() {
            return Err(DomainError::validation("description is required"));
        }

        let blocked_by = dedupe_preserving_order(input.blocked_by);
        let blockers = if blocked_by.is_empty() {
            Vec::new()
        } else {
            let blockers = self
                .store
                .get_blockers(actor.workspace_id, &blocked_by)
                .await?;
            if blockers.len() != blocked_by.len() {
                return Err(DomainError::validation(
                    "blocked_by references tasks that do not exist in this workspace",
                ));
            }
            blockers
        };
        let has_unresolved = blockers.iter().any(|b| b.status != TaskStatus::Done);

        let status = match input.assignee_id {
            Some(assignee_id) => {
                let assignee = self
                    .agents
                    .get_by_id(assignee_id)
                    .await?
                    .filter(|a| a.workspace_id == actor.workspace_id)
                    .ok_or_else(|| {
                        DomainError::validation(
                            "assignee_id does not reference an agent in this workspace",
                        )
                    })?;
                if !assignee.is_active {
                    return Err(DomainError::validation("assignee is inactive"));
                }
                if has_unresolved {
                    return Err(DomainError::validation(
                        "cannot assign a task whose blockers are not all done",
                    ));
                }
                TaskStatus::InProgress
            }
            None => TaskStatus::New,
        };

        let workspace = self.workspace_of(actor).await?;
        let deadline = calculate_deadline(&workspace, status, Utc::now());

        let mut tx = self.store.begin().await?;
        let result = async {
            let task = self
                .store
                .create_task(
                    &mut tx,
                    NewTask {
                        workspace_id: actor.workspace_id,
                        title: input.title,
                        description: input.description,
                        creator_id: actor.id,
                        assignee_id: input.assignee_id,
                        status,
                        visibility: input.visibility,
                        priority: input.priority,
                        blocked_by,
                        status_deadline_at: deadline,
                    },
                )
                .await?;
            self.store
                .append_event(
                    &mut tx,
                    NewEvent {
                        task_id: task.id,
                        actor_id: Some(actor.id),
                        kind: EventKind::Created,
                        old_status: None,
                        new_status: Some(status),
                        comment: "Task created".to_string(),
                    },
                )
                .await?;
            Ok(task)
        }
        .await;
        let task = self.finish(tx, result).await?;

        info!(
            task_id = %task.id,
            workspace_id = %task.workspace_id,
            creator_id = %actor.id,
            status = %task.status,
            "task created"
        );

        Ok(TaskAnnotated {
            is_overdue: false,
            has_unresolved_blockers: has_unresolved,
            task,
        })
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn get_task_detail(
        &self,
        actor: &Agent,
        id: TaskId,
    ) -> Result<TaskDetail, DomainError> {
        let task = self.require_task(id).await?;
        check_view_access(&task, actor)?;
        let events = self.store.events_for_task(id).await?;
        let task = self.annotate(task).await?;
        Ok(TaskDetail { task, events })
    }

    /// Filtered listing. The workspace and viewer are always taken from
    /// the authenticated actor, never from the filter input.
    pub async fn list_tasks(
        &self,
        actor: &Agent,
        mut filters: TaskFilters,
    ) -> Result<(Vec<TaskAnnotated>, i64), DomainError> {
        filters.workspace_id = actor.workspace_id;
        filters.viewer_id = actor.id;
        Ok(self.store.list(&filters).await?)
    }

    pub async fn stats(
        &self,
        actor: &Agent,
        mut query: StatsQuery,
    ) -> Result<(WorkspaceStats, Vec<AgentStats>), DomainError> {
        query.workspace_id = actor.workspace_id;
        let workspace = self.store.workspace_stats(&query).await?;
        let agents = self.store.agent_stats(&query).await?;
        Ok((workspace, agents))
    }

    // ------------------------------------------------------------------
    // Claim: agent takes a free NEW task from the pool
    // ------------------------------------------------------------------

    pub async fn claim(
        &self,
        actor: &Agent,
        id: TaskId,
        comment: &str,
    ) -> Result<TaskEvent, DomainError> {
        ensure_comment(comment)?;

        let task = self.require_task(id).await?;
        check_view_access(&task, actor)?;
        check_claim(&task, actor)?;
        self.assert_activation_allowed(&task).await?;

        let workspace = self.workspace_of(actor).await?;
        let deadline = calculate_deadline(&workspace, TaskStatus::InProgress, Utc::now());

        let mut tx = self.store.begin().await?;
        let result = async {
            let written = self
                .store
                .update_status(
                    &mut tx,
                    &StatusWrite {
                        task_id: id,
                        observed: TaskStatus::New,
                        new_status: TaskStatus::InProgress,
                        assignee_id: Some(actor.id),
                        status_deadline_at: deadline,
                        require_unassigned: true,
                    },
                )
                .await?;
            if !written {
                return Err(DomainError::TaskAlreadyClaimed);
            }
            let event = self
                .store
                .append_event(
                    &mut tx,
                    NewEvent {
                        task_id: id,
                        actor_id: Some(actor.id),
                        kind: EventKind::Claimed,
                        old_status: Some(TaskStatus::New),
                        new_status: Some(TaskStatus::InProgress),
                        comment: comment.to_string(),
                    },
                )
                .await?;
            Ok(event)
        }
        .await;
        let event = self.finish(tx, result).await?;

        info!(task_id = %id, agent_id = %actor.id, event_id = %event.id, "task claimed");
        Ok(event)
    }

    // ------------------------------------------------------------------
    // Escalate: agent blocks somebody else's running task
    // ------------------------------------------------------------------

    pub async fn escalate(
        &self,
        actor: &Agent,
        id: TaskId,
        comment: &str,
    ) -> Result<TaskEvent, DomainError> {
        ensure_comment(comment)?;

        let workspace = self.workspace_of(actor).await?;
        let deadline = calculate_deadline(&workspace, TaskStatus::Blocked, Utc::now());

        let mut tx = self.store.begin().await?;
        let result = async {
            let task = self
                .store
                .get_task_for_update(&mut tx, id)
                .await?
                .ok_or(DomainError::TaskNotFound)?;
            check_view_access(&task, actor)?;
            check_escalate(&task, actor)?;

            let written = self
                .store
                .update_status(
                    &mut tx,
                    &StatusWrite {
                        task_id: id,
                        observed: TaskStatus::InProgress,
                        new_status: TaskStatus::Blocked,
                        assignee_id: task.assignee_id,
                        status_deadline_at: deadline,
                        require_unassigned: false,
                    },
                )
                .await?;
            if !written {
                return Err(DomainError::TaskAlreadyClaimed);
            }
            let event = self
                .store
                .append_event(
                    &mut tx,
                    NewEvent {
                        task_id: id,
                        actor_id: Some(actor.id),
                        kind: EventKind::Escalated,
                        old_status: Some(TaskStatus::InProgress),
                        new_status: Some(TaskStatus::Blocked),
                        comment: comment.to_string(),
                    },
                )
                .await?;
            Ok(event)
        }
        .await;
        let event = self.finish(tx, result).await?;

        info!(task_id = %id, agent_id = %actor.id, event_id = %event.id, "task escalated");
        Ok(event)
    }

    // ------------------------------------------------------------------
    // Takeover: agent adopts an abandoned STUCK task
    // ------------------------------------------------------------------

    pub async fn takeover(
        &self,
        actor: &Agent,
        id: TaskId,
        comment: &str,
    ) -> Result<TaskEvent, DomainError> {
        ensure_comment(comment)?;

        let task = self.require_task(id).await?;
        check_view_access(&task, actor)?;
        check_takeover(&task, actor)?;
        self.assert_activation_allowed(&task).await?;

        let workspace = self.workspace_of(actor).await?;
        let deadline = calculate_deadline(&workspace, TaskStatus::InProgress, Utc::now());

        let mut tx = self.store.begin().await?;
        let result = async {
            let written = self
                .store
                .update_status(
                    &mut tx,
                    &StatusWrite {
                        task_id: id,
                        observed: TaskStatus::Stuck,
                        new_status: TaskStatus::InProgress,
                        assignee_id: Some(actor.id),
                        status_deadline_at: deadline,
                        require_unassigned: false,
                    },
                )
                .await?;
            if !written {
                return Err(DomainError::TaskAlreadyClaimed);
            }
            let event = self
                .store
                .append_event(
                    &mut tx,
                    NewEvent {
                        task_id: id,
                        actor_id: Some(actor.id),
                        kind: EventKind::TakenOver,
                        old_status: Some(TaskStatus::Stuck),
                        new_status: Some(TaskStatus::InProgress),
                        comment: comment.to_string(),
                    },
                )
                .await?;
            Ok(event)
        }
        .await;
        let event = self.finish(tx, result).await?;

        info!(task_id = %id, agent_id = %actor.id, event_id = %event.id, "task taken over");
        Ok(event)
    }

    // ------------------------------------------------------------------
    // Generic status transition
    // ------------------------------------------------------------------

    pub async fn transition_status(
        &self,
        actor: &Agent,
        id: TaskId,
        new_status: TaskStatus,
        comment: &str,
    ) -> Result<TaskEvent, DomainError> {
        ensure_comment(comment)?;

        let task = self.require_task(id).await?;
        check_view_access(&task, actor)?;
        check_transition(&task, actor, new_status)?;
        if new_status == TaskStatus::InProgress {
            self.assert_activation_allowed(&task).await?;
        }

        let workspace = self.workspace_of(actor).await?;
        let deadline = calculate_deadline(&workspace, new_status, Utc::now());
        let observed = task.status;
        let new_assignee = if clears_assignee(new_status) {
            None
        } else {
            task.assignee_id
        };

        let mut tx = self.store.begin().await?;
        let result = async {
            let locked = self
                .store
                .get_task_for_update(&mut tx, id)
                .await?
                .ok_or(DomainError::TaskNotFound)?;
            if locked.status != observed {
                return Err(DomainError::TaskAlreadyClaimed);
            }

            let written = self
                .store
                .update_status(
                    &mut tx,
                    &StatusWrite {
                        task_id: id,
                        observed,
                        new_status,
                        assignee_id: new_assignee,
                        status_deadline_at: deadline,
                        require_unassigned: false,
                    },
                )
                .await?;
            if !written {
                return Err(DomainError::TaskAlreadyClaimed);
            }
            let event = self
                .store
                .append_event(
                    &mut tx,
                    NewEvent {
                        task_id: id,
                        actor_id: Some(actor.id),
                        kind: EventKind::StatusChanged,
                        old_status: Some(observed),
                        new_status: Some(new_status),
                        comment: comment.to_string(),
                    },
                )
                .await?;
            Ok(event)
        }
        .await;
        let event = self.finish(tx, result).await?;

        info!(
            task_id = %id,
            agent_id = %actor.id,
            old_status = %observed,
            new_status = %new_status,
            event_id = %event.id,
            "task status changed"
        );
        Ok(event)
    }

    // ------------------------------------------------------------------
    // Comment: audit entry without a state change
    // ------------------------------------------------------------------

    pub async fn comment(
        &self,
        actor: &Agent,
        id: TaskId,
        comment: &str,
    ) -> Result<TaskEvent, DomainError> {
        ensure_comment(comment)?;

        let task = self.require_task(id).await?;
        check_view_access(&task, actor)?;

        let mut tx = self.store.begin().await?;
        let result = self
            .store
            .append_event(
                &mut tx,
                NewEvent {
                    task_id: id,
                    actor_id: Some(actor.id),
                    kind: EventKind::Commented,
                    old_status: None,
                    new_status: None,
                    comment: comment.to_string(),
                },
            )
            .await
            .map_err(DomainError::from);
        let event = self.finish(tx, result).await?;

        info!(task_id = %id, agent_id = %actor.id, event_id = %event.id, "comment added");
        Ok(event)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn require_task(&self, id: TaskId) -> Result<Task, DomainError> {
        self.store
            .get_task(id)
            .await?
            .ok_or(DomainError::TaskNotFound)
    }

    async fn workspace_of(&self, actor: &Agent) -> Result<Workspace, DomainError> {
        self.workspaces
            .get_by_id(actor.workspace_id)
            .await?
            .ok_or(DomainError::WorkspaceNotFound)
    }

    /// Activation gates, cycle first so that a cyclic blocker graph is
    /// reported as such rather than as forever-unresolved blockers.
    async fn assert_activation_allowed(&self, task: &Task) -> Result<(), DomainError> {
        self.resolver.assert_acyclic(task.id).await?;
        self.resolver
            .assert_all_done(task.workspace_id, &task.blocked_by)
            .await
    }

    async fn annotate(&self, task: Task) -> Result<TaskAnnotated, DomainError> {
        let has_unresolved_blockers = if task.blocked_by.is_empty() {
            false
        } else {
            let blockers = self
                .store
                .get_blockers(task.workspace_id, &task.blocked_by)
                .await?;
            blockers.len() != task.blocked_by.len()
                || blockers.iter().any(|b| b.status != TaskStatus::Done)
        };
        Ok(TaskAnnotated {
            is_overdue: task.is_overdue(Utc::now()),
            has_unresolved_blockers,
            task,
        })
    }

    /// Commit on success, roll back on error (the rollback error, if any,
    /// is swallowed in favour of the original one).
    async fn finish<T>(&self, tx: S::Tx, result: Result<T, DomainError>) -> Result<T, DomainError> {
        match result {
            Ok(value) => {
                self.store.commit(tx).await?;
                Ok(value)
            }
            Err(e) => {
                let _ = self.store.rollback(tx).await;
                Err(e)
            }
        }
    }
}

fn ensure_comment(comment: &str) -> Result<(), DomainError> {
    if comment.trim().is_empty() {
        return Err(DomainError::EmptyComment);
    }
    Ok(())
}

fn dedupe_preserving_order(ids: Vec<TaskId>) -> Vec<TaskId> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_comment() {
        assert!(ensure_comment("taking this").is_ok());
        assert!(matches!(ensure_comment(""), Err(DomainError::EmptyComment)));
        assert!(matches!(
            ensure_comment("   "),
            Err(DomainError::EmptyComment)
        ));
    }

    #[test]
    fn test_dedupe_preserving_order() {
        let a = TaskId::new();
        let b = TaskId::new();
        let deduped = dedupe_preserving_order(vec![a, b, a, b, a]);
        assert_eq!(deduped, vec![a, b]);
    }
}
