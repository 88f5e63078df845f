// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent;
pub mod error;
pub mod event;
pub mod listing;
pub mod repository;
pub mod task;
pub mod transition;
pub mod workspace;

pub use agent::{Agent, AgentId};
pub use error::DomainError;
pub use event::{EventId, EventKind, TaskEvent};
pub use listing::{SortField, SortKey, TaskFilters};
pub use repository::{
    AgentRepository, AgentStats, EventWithActor, NewEvent, NewTask, StatsQuery, StatusWrite,
    StoreError, TaskAnnotated, TaskStore, WorkspaceRepository, WorkspaceStats,
};
pub use task::{Task, TaskId, TaskPriority, TaskStatus, TaskVisibility};
pub use workspace::{Workspace, WorkspaceId};
