// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Transition Table
//!
//! The task state graph encoded as data: a static table of permitted
//! (from, to) edges, each carrying the rule for who may drive it. The
//! specialised verbs (claim, escalate, takeover) are restrictions of
//! distinguished edges and carry their own predicates below; everything
//! else goes through [`check_transition`].

use crate::domain::agent::Agent;
use crate::domain::error::DomainError;
use crate::domain::task::{Task, TaskStatus, TaskVisibility};

/// Who may drive an edge through the generic transition path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiatorRule {
    /// The current assignee only. Denied when the task is unassigned.
    Assignee,
    /// The task's creator only.
    Creator,
    /// Either the creator or the current assignee.
    CreatorOrAssignee,
}

impl InitiatorRule {
    pub fn permits(self, task: &Task, agent: &Agent) -> bool {
        match self {
            InitiatorRule::Assignee => task.is_owned_by(agent.id),
            InitiatorRule::Creator => task.is_created_by(agent.id),
            InitiatorRule::CreatorOrAssignee => {
                task.is_created_by(agent.id) || task.is_owned_by(agent.id)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub initiator: InitiatorRule,
}

/// The permitted generic transitions. Claim (NEW -> IN_PROGRESS by a
/// non-assignee) and takeover (STUCK -> IN_PROGRESS by a non-assignee)
/// are not in this table; they are separate verbs with their own rules.
static EDGES: &[Edge] = &[
    Edge {
        from: TaskStatus::New,
        to: TaskStatus::InProgress,
        initiator: InitiatorRule::Assignee,
    },
    Edge {
        from: TaskStatus::New,
        to: TaskStatus::Cancelled,
        initiator: InitiatorRule::Creator,
    },
    Edge {
        from: TaskStatus::InProgress,
        to: TaskStatus::Done,
        initiator: InitiatorRule::Assignee,
    },
    Edge {
        from: TaskStatus::InProgress,
        to: TaskStatus::Blocked,
        initiator: InitiatorRule::Assignee,
    },
    Edge {
        from: TaskStatus::InProgress,
        to: TaskStatus::New,
        initiator: InitiatorRule::Assignee,
    },
    Edge {
        from: TaskStatus::InProgress,
        to: TaskStatus::Cancelled,
        initiator: InitiatorRule::CreatorOrAssignee,
    },
    Edge {
        from: TaskStatus::Blocked,
        to: TaskStatus::InProgress,
        initiator: InitiatorRule::Assignee,
    },
    Edge {
        from: TaskStatus::Blocked,
        to: TaskStatus::New,
        initiator: InitiatorRule::CreatorOrAssignee,
    },
    Edge {
        from: TaskStatus::Blocked,
        to: TaskStatus::Cancelled,
        initiator: InitiatorRule::Creator,
    },
    Edge {
        from: TaskStatus::Stuck,
        to: TaskStatus::InProgress,
        initiator: InitiatorRule::Assignee,
    },
    Edge {
        from: TaskStatus::Stuck,
        to: TaskStatus::New,
        initiator: InitiatorRule::Creator,
    },
    Edge {
        from: TaskStatus::Stuck,
        to: TaskStatus::Cancelled,
        initiator: InitiatorRule::Creator,
    },
];

pub fn edge(from: TaskStatus, to: TaskStatus) -> Option<&'static Edge> {
    EDGES.iter().find(|e| e.from == from && e.to == to)
}

/// Whether entering `status` clears the assignee (returns the task to
/// the pool).
pub fn clears_assignee(status: TaskStatus) -> bool {
    status == TaskStatus::New
}

/// Validate a generic status transition: the edge must exist and the
/// initiator must satisfy its rule.
pub fn check_transition(task: &Task, agent: &Agent, to: TaskStatus) -> Result<(), DomainError> {
    let edge = edge(task.status, to).ok_or(DomainError::InvalidTransition {
        from: task.status,
        to,
    })?;
    if !edge.initiator.permits(task, agent) {
        return Err(DomainError::InsufficientAccess);
    }
    Ok(())
}

/// Validate a claim: an agent takes a free task from the pool.
///
/// The assignee check precedes the status check so that racing claimants
/// who lose see `TaskAlreadyClaimed` rather than an invalid transition.
pub fn check_claim(task: &Task, _agent: &Agent) -> Result<(), DomainError> {
    if task.assignee_id.is_some() {
        return Err(DomainError::TaskAlreadyClaimed);
    }
    if task.status != TaskStatus::New {
        return Err(DomainError::InvalidTransition {
            from: task.status,
            to: TaskStatus::InProgress,
        });
    }
    if task.visibility != TaskVisibility::Public {
        return Err(DomainError::InsufficientAccess);
    }
    Ok(())
}

/// Validate an escalation: an agent blocks somebody else's running task.
///
/// Ownership is checked first so the assignee always hears "cannot
/// escalate own task", whatever state the task is in.
pub fn check_escalate(task: &Task, agent: &Agent) -> Result<(), DomainError> {
    if task.is_owned_by(agent.id) {
        return Err(DomainError::CannotEscalateOwn);
    }
    if task.status != TaskStatus::InProgress {
        return Err(DomainError::InvalidTransition {
            from: task.status,
            to: TaskStatus::Blocked,
        });
    }
    Ok(())
}

/// Validate a takeover: an agent adopts an abandoned stuck task.
pub fn check_takeover(task: &Task, agent: &Agent) -> Result<(), DomainError> {
    if task.is_owned_by(agent.id) || task.status != TaskStatus::Stuck {
        return Err(DomainError::CannotTakeover);
    }
    Ok(())
}

/// Visibility and tenancy gate applied before any per-item operation.
///
/// Cross-workspace lookups report `TaskNotFound` rather than an access
/// error so that foreign tenants cannot probe for task ids.
pub fn check_view_access(task: &Task, agent: &Agent) -> Result<(), DomainError> {
    if task.workspace_id != agent.workspace_id {
        return Err(DomainError::TaskNotFound);
    }
    if task.visibility == TaskVisibility::Private
        && !task.is_created_by(agent.id)
        && !task.is_owned_by(agent.id)
    {
        return Err(DomainError::InsufficientAccess);
    }
    Ok(())
}
