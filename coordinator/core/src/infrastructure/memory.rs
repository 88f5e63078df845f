// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # In-memory storage backend
//!
//! Development and test double for the PostgreSQL backend with the same
//! transactional semantics: a transaction owns the whole-state lock and
//! keeps a snapshot, so commit is "release the lock" and rollback is
//! "restore the snapshot". Conditional writes evaluate against the live
//! state under that lock, which reproduces the at-most-one-winner
//! behaviour of the SQL `WHERE status = observed` updates.

use std::collections::{HashMap, HashSet};
use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::agent::{Agent, AgentId};
use crate::domain::event::{EventId, TaskEvent};
use crate::domain::listing::{SortField, SortKey, TaskFilters};
use crate::domain::repository::{
    AgentRepository, AgentStats, EventWithActor, NewEvent, NewTask, StatsQuery, StatusWrite,
    StoreError, TaskAnnotated, TaskStore, WorkspaceRepository, WorkspaceStats,
};
use crate::domain::task::{Task, TaskId, TaskStatus, TaskVisibility};
use crate::domain::workspace::{Workspace, WorkspaceId};

#[derive(Debug, Clone, Default)]
struct MemState {
    tasks: HashMap<TaskId, Task>,
    events: Vec<TaskEvent>,
}

pub struct MemTx {
    guard: OwnedMutexGuard<MemState>,
    snapshot: MemState,
}

pub struct InMemoryStore {
    state: Arc<Mutex<MemState>>,
    agents: Arc<InMemoryAgentRepository>,
    /// Task ids whose writes fail with a database error. Test hook for
    /// exercising per-item failure isolation.
    poisoned: SyncMutex<HashSet<TaskId>>,
}

impl InMemoryStore {
    pub fn new(agents: Arc<InMemoryAgentRepository>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemState::default())),
            agents,
            poisoned: SyncMutex::new(HashSet::new()),
        }
    }

    /// Make every subsequent write against `id` fail.
    pub fn fail_writes_for(&self, id: TaskId) {
        self.poisoned.lock().insert(id);
    }

    /// Seed a task verbatim, bypassing creation rules. Lets fixtures
    /// build graphs the API cannot produce (cycles, deep chains).
    pub async fn insert_task(&self, task: Task) {
        self.state.lock().await.tasks.insert(task.id, task);
    }

    fn is_poisoned(&self, id: TaskId) -> bool {
        self.poisoned.lock().contains(&id)
    }
}

fn matches_filters(task: &Task, f: &TaskFilters, tasks: &HashMap<TaskId, Task>) -> bool {
    if task.workspace_id != f.workspace_id {
        return false;
    }
    if !f.statuses.is_empty() && !f.statuses.contains(&task.status) {
        return false;
    }
    if f.unassigned {
        if task.assignee_id.is_some() {
            return false;
        }
    } else if let Some(assignee) = f.assignee_id {
        if task.assignee_id != Some(assignee) {
            return false;
        }
    }

    let viewer_participates =
        task.creator_id == f.viewer_id || task.assignee_id == Some(f.viewer_id);
    match f.visibility {
        Some(v) if task.visibility != v => return false,
        _ => {}
    }
    if task.visibility == TaskVisibility::Private && !viewer_participates {
        return false;
    }

    if !f.priorities.is_empty() && !f.priorities.contains(&task.priority) {
        return false;
    }
    if f.overdue_only && !task.is_overdue(Utc::now()) {
        return false;
    }
    if f.unresolved_blockers_only && !has_unresolved_blockers(task, tasks) {
        return false;
    }
    true
}

fn has_unresolved_blockers(task: &Task, tasks: &HashMap<TaskId, Task>) -> bool {
    task.blocked_by
        .iter()
        .any(|id| tasks.get(id).map_or(true, |b| b.status != TaskStatus::Done))
}

fn compare_tasks(a: &Task, b: &Task, sort: &[SortKey]) -> Ordering {
    for key in sort {
        let ord = match key.field {
            SortField::Id => a.id.0.cmp(&b.id.0),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
            SortField::Priority => a.priority.rank().cmp(&b.priority.rank()),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::Title => a.title.cmp(&b.title),
        };
        let ord = if key.descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl TaskStore for InMemoryStore {
    type Tx = MemTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let snapshot = guard.clone();
        Ok(MemTx { guard, snapshot })
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError> {
        drop(tx);
        Ok(())
    }

    async fn rollback(&self, mut tx: Self::Tx) -> Result<(), StoreError> {
        *tx.guard = tx.snapshot;
        Ok(())
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.state.lock().await.tasks.get(&id).cloned())
    }

    async fn get_task_for_update(
        &self,
        tx: &mut Self::Tx,
        id: TaskId,
    ) -> Result<Option<Task>, StoreError> {
        Ok(tx.guard.tasks.get(&id).cloned())
    }

    async fn create_task(&self, tx: &mut Self::Tx, task: NewTask) -> Result<Task, StoreError> {
        let now = Utc::now();
        let task = Task {
            id: TaskId::new(),
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
            created_at: now,
            updated_at: now,
        };
        tx.guard.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update_status(
        &self,
        tx: &mut Self::Tx,
        write: &StatusWrite,
    ) -> Result<bool, StoreError> {
        if self.is_poisoned(write.task_id) {
            return Err(StoreError::Database("injected write failure".to_string()));
        }
        let Some(task) = tx.guard.tasks.get_mut(&write.task_id) else {
            return Ok(false);
        };
        if task.status != write.observed {
            return Ok(false);
        }
        if write.require_unassigned && task.assignee_id.is_some() {
            return Ok(false);
        }
        task.status = write.new_status;
        task.assignee_id = write.assignee_id;
        task.status_deadline_at = write.status_deadline_at;
        task.updated_at = Utc::now();
        Ok(true)
    }

    async fn append_event(
        &self,
        tx: &mut Self::Tx,
        event: NewEvent,
    ) -> Result<TaskEvent, StoreError> {
        if self.is_poisoned(event.task_id) {
            return Err(StoreError::Database("injected write failure".to_string()));
        }
        let event = TaskEvent {
            id: EventId::new(),
            task_id: event.task_id,
            actor_id: event.actor_id,
            kind: event.kind,
            old_status: event.old_status,
            new_status: event.new_status,
            comment: event.comment,
            created_at: Utc::now(),
        };
        tx.guard.events.push(event.clone());
        Ok(event)
    }

    async fn events_for_task(&self, task_id: TaskId) -> Result<Vec<EventWithActor>, StoreError> {
        let events: Vec<TaskEvent> = {
            let state = self.state.lock().await;
            state
                .events
                .iter()
                .filter(|e| e.task_id == task_id)
                .cloned()
                .collect()
        };
        Ok(events
            .into_iter()
            .map(|event| EventWithActor {
                actor_name: event.actor_id.and_then(|id| self.agents.name_of(id)),
                event,
            })
            .collect())
    }

    async fn get_blockers(
        &self,
        workspace_id: WorkspaceId,
        ids: &[TaskId],
    ) -> Result<Vec<Task>, StoreError> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.tasks.get(id))
            .filter(|t| t.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn find_expired(&self) -> Result<Vec<Task>, StoreError> {
        let now = Utc::now();
        let state = self.state.lock().await;
        Ok(state
            .tasks
            .values()
            .filter(|t| t.status.has_deadline() && t.is_overdue(now))
            .cloned()
            .collect())
    }

    async fn list(
        &self,
        filters: &TaskFilters,
    ) -> Result<(Vec<TaskAnnotated>, i64), StoreError> {
        let state = self.state.lock().await;

        let mut matching: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| matches_filters(t, filters, &state.tasks))
            .cloned()
            .collect();

        let sort = filters.effective_sort();
        matching.sort_by(|a, b| compare_tasks(a, b, &sort));

        let total = matching.len() as i64;
        let now = Utc::now();
        let page = matching
            .into_iter()
            .skip(filters.offset.max(0) as usize)
            .take(filters.limit.max(0) as usize)
            .map(|task| TaskAnnotated {
                has_unresolved_blockers: has_unresolved_blockers(&task, &state.tasks),
                is_overdue: task.is_overdue(now),
                task,
            })
            .collect();

        Ok((page, total))
    }

    async fn workspace_stats(&self, query: &StatsQuery) -> Result<WorkspaceStats, StoreError> {
        let state = self.state.lock().await;
        let in_workspace: Vec<&Task> = state
            .tasks
            .values()
            .filter(|t| t.workspace_id == query.workspace_id)
            .collect();

        let total_tasks_created = in_workspace
            .iter()
            .filter(|t| {
                query.period_start.map_or(true, |s| t.created_at >= s)
                    && t.created_at <= query.period_end
            })
            .count() as i64;

        let mut tasks_by_status = HashMap::new();
        for task in &in_workspace {
            *tasks_by_status.entry(task.status).or_insert(0) += 1;
        }

        let now = Utc::now();
        let overdue_count = in_workspace
            .iter()
            .filter(|t| t.status.has_deadline() && t.is_overdue(now))
            .count() as i64;

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
        let state = self.state.lock().await;
        let mut agents = self.agents.agents_in(query.workspace_id);
        agents.retain(|a| a.is_active);
        if let Some(agent_id) = query.agent_id {
            agents.retain(|a| a.id == agent_id);
        }
        agents.sort_by(|a, b| a.name.cmp(&b.name));

        let in_period = |task: &Task| {
            query.period_start.map_or(true, |s| task.updated_at >= s)
                && task.updated_at <= query.period_end
        };

        Ok(agents
            .into_iter()
            .map(|agent| {
                let assigned: Vec<&Task> = state
                    .tasks
                    .values()
                    .filter(|t| {
                        t.workspace_id == query.workspace_id && t.assignee_id == Some(agent.id)
                    })
                    .collect();
                AgentStats {
                    tasks_completed: assigned
                        .iter()
                        .filter(|t| t.status == TaskStatus::Done && in_period(t))
                        .count() as i64,
                    tasks_cancelled: assigned
                        .iter()
                        .filter(|t| t.status == TaskStatus::Cancelled && in_period(t))
                        .count() as i64,
                    tasks_stuck_count: assigned
                        .iter()
                        .filter(|t| t.status == TaskStatus::Stuck)
                        .count() as i64,
                    tasks_in_progress: assigned
                        .iter()
                        .filter(|t| t.status == TaskStatus::InProgress)
                        .count() as i64,
                    agent_id: agent.id,
                    agent_name: agent.name,
                }
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAgentRepository {
    agents: SyncMutex<HashMap<AgentId, Agent>>,
}

impl InMemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, agent: Agent) {
        self.agents.lock().insert(agent.id, agent);
    }

    pub fn agents_in(&self, workspace_id: WorkspaceId) -> Vec<Agent> {
        self.agents
            .lock()
            .values()
            .filter(|a| a.workspace_id == workspace_id)
            .cloned()
            .collect()
    }

    fn name_of(&self, id: AgentId) -> Option<String> {
        self.agents.lock().get(&id).map(|a| a.name.clone())
    }
}

#[async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn get_by_token(&self, token: &str) -> Result<Option<Agent>, StoreError> {
        Ok(self
            .agents
            .lock()
            .values()
            .find(|a| a.token == token)
            .cloned())
    }

    async fn get_by_id(&self, id: AgentId) -> Result<Option<Agent>, StoreError> {
        Ok(self.agents.lock().get(&id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryWorkspaceRepository {
    workspaces: SyncMutex<HashMap<WorkspaceId, Workspace>>,
}

impl InMemoryWorkspaceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, workspace: Workspace) {
        self.workspaces.lock().insert(workspace.id, workspace);
    }
}

#[async_trait]
impl WorkspaceRepository for InMemoryWorkspaceRepository {
    async fn get_by_id(&self, id: WorkspaceId) -> Result<Option<Workspace>, StoreError> {
        Ok(self.workspaces.lock().get(&id).cloned())
    }
}
