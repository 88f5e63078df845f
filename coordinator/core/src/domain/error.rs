// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use thiserror::Error;

use crate::domain::repository::StoreError;
use crate::domain::task::{TaskId, TaskStatus};

/// Error taxonomy of the coordination core, independent of HTTP codes.
/// The presentation layer maps each variant to a wire code.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("task not found")]
    TaskNotFound,

    /// A conditional write lost the race: the task was modified between
    /// observation and update.
    #[error("task already claimed")]
    TaskAlreadyClaimed,

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("task has unresolved blockers")]
    UnresolvedBlockers,

    #[error("cyclic dependency detected involving task {0}")]
    CyclicDependency(TaskId),

    #[error("cannot escalate own task")]
    CannotEscalateOwn,

    #[error("cannot take over: task is not stuck or already yours")]
    CannotTakeover,

    #[error("insufficient access")]
    InsufficientAccess,

    #[error("agent not found")]
    AgentNotFound,

    #[error("agent is inactive")]
    AgentInactive,

    #[error("workspace not found")]
    WorkspaceNotFound,

    #[error("comment is required")]
    EmptyComment,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }
}
