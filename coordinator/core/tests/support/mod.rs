// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Shared fixtures for the integration suite, backed by the in-memory
//! store.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;

use taskboard_core::application::{CreateTask, DeadlineReaper, ReaperReport, TaskService};
use taskboard_core::domain::repository::{
    AgentRepository, TaskAnnotated, TaskStore, WorkspaceRepository,
};
use taskboard_core::domain::{
    Agent, AgentId, Task, TaskId, TaskPriority, TaskStatus, TaskVisibility, Workspace, WorkspaceId,
};
use taskboard_core::infrastructure::{
    InMemoryAgentRepository, InMemoryStore, InMemoryWorkspaceRepository,
};

pub struct TestEnv {
    pub store: Arc<InMemoryStore>,
    pub agent_repo: Arc<InMemoryAgentRepository>,
    pub workspace_repo: Arc<InMemoryWorkspaceRepository>,
    pub service: TaskService<InMemoryStore>,
    pub workspace: Workspace,
}

impl TestEnv {
    /// Workspace with sensible deadlines on every deadline-bearing status.
    pub fn new() -> Self {
        Self::with_deadlines(&[
            (TaskStatus::New, 60),
            (TaskStatus::InProgress, 120),
            (TaskStatus::Blocked, 240),
        ])
    }

    pub fn with_deadlines(deadlines: &[(TaskStatus, i64)]) -> Self {
        let agent_repo = Arc::new(InMemoryAgentRepository::new());
        let workspace_repo = Arc::new(InMemoryWorkspaceRepository::new());
        let store = Arc::new(InMemoryStore::new(agent_repo.clone()));

        let workspace = Workspace {
            id: WorkspaceId::new(),
            name: "Fleet".to_string(),
            slug: "fleet".to_string(),
            status_deadlines: deadlines.iter().copied().collect(),
            created_at: Utc::now(),
        };
        workspace_repo.insert(workspace.clone());

        let service = TaskService::new(
            store.clone(),
            agent_repo.clone() as Arc<dyn AgentRepository>,
            workspace_repo.clone() as Arc<dyn WorkspaceRepository>,
        );

        Self {
            store,
            agent_repo,
            workspace_repo,
            service,
            workspace,
        }
    }

    pub fn agent(&self, name: &str) -> Agent {
        self.agent_in(self.workspace.id, name)
    }

    pub fn agent_in(&self, workspace_id: WorkspaceId, name: &str) -> Agent {
        let agent = Agent {
            id: AgentId::new(),
            workspace_id,
            name: name.to_string(),
            token: format!("tok-{name}"),
            is_active: true,
            created_at: Utc::now(),
        };
        self.agent_repo.insert(agent.clone());
        agent
    }

    pub fn inactive_agent(&self, name: &str) -> Agent {
        let agent = Agent {
            id: AgentId::new(),
            workspace_id: self.workspace.id,
            name: name.to_string(),
            token: format!("tok-{name}"),
            is_active: false,
            created_at: Utc::now(),
        };
        self.agent_repo.insert(agent.clone());
        agent
    }

    /// A second workspace for tenant-isolation scenarios.
    pub fn other_workspace(&self) -> Workspace {
        let workspace = Workspace {
            id: WorkspaceId::new(),
            name: "Other".to_string(),
            slug: "other".to_string(),
            status_deadlines: self.workspace.status_deadlines.clone(),
            created_at: Utc::now(),
        };
        self.workspace_repo.insert(workspace.clone());
        workspace
    }

    pub async fn create(&self, creator: &Agent, title: &str) -> TaskAnnotated {
        self.service
            .create_task(creator, input(title))
            .await
            .expect("task creation failed")
    }

    pub async fn task(&self, id: TaskId) -> Task {
        self.store
            .get_task(id)
            .await
            .expect("store read failed")
            .expect("task missing")
    }

    /// Seed a raw task row, bypassing creation rules.
    pub async fn seed_task(&self, task: Task) {
        self.store.insert_task(task).await;
    }

    /// One deadline reaper pass.
    pub async fn reap(&self) -> ReaperReport {
        DeadlineReaper::new(self.store.clone())
            .run_once()
            .await
            .expect("reaper pass failed")
    }
}

pub fn input(title: &str) -> CreateTask {
    CreateTask {
        title: title.to_string(),
        description: "Autogenerated fixture task".to_string(),
        assignee_id: None,
        visibility: TaskVisibility::Public,
        priority: TaskPriority::Normal,
        blocked_by: Vec::new(),
    }
}

/// A bare task row for raw seeding.
pub fn raw_task(workspace_id: WorkspaceId, creator: AgentId, blocked_by: Vec<TaskId>) -> Task {
    let now = Utc::now();
    Task {
        id: TaskId::new(),
        workspace_id,
        title: "Seeded fixture task".to_string(),
        description: "Raw row".to_string(),
        creator_id: creator,
        assignee_id: None,
        status: TaskStatus::New,
        visibility: TaskVisibility::Public,
        priority: TaskPriority::Normal,
        blocked_by,
        status_deadline_at: None,
        created_at: now,
        updated_at: now,
    }
}
