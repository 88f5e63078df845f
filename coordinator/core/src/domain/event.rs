// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::domain::task::{TaskId, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    StatusChanged,
    Claimed,
    Escalated,
    TakenOver,
    Commented,
    DeadlineExpired,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::StatusChanged => "status_changed",
            EventKind::Claimed => "claimed",
            EventKind::Escalated => "escalated",
            EventKind::TakenOver => "taken_over",
            EventKind::Commented => "commented",
            EventKind::DeadlineExpired => "deadline_expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(EventKind::Created),
            "status_changed" => Some(EventKind::StatusChanged),
            "claimed" => Some(EventKind::Claimed),
            "escalated" => Some(EventKind::Escalated),
            "taken_over" => Some(EventKind::TakenOver),
            "commented" => Some(EventKind::Commented),
            "deadline_expired" => Some(EventKind::DeadlineExpired),
            _ => None,
        }
    }
}

/// An append-only audit record. Events are never mutated or deleted; a
/// task's history is the ordered sequence of its events, starting with
/// `created`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub id: EventId,
    pub task_id: TaskId,
    /// `None` marks a system-originated event (deadline expiry).
    pub actor_id: Option<AgentId>,
    pub kind: EventKind,
    pub old_status: Option<TaskStatus>,
    pub new_status: Option<TaskStatus>,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl TaskEvent {
    pub fn is_system_event(&self) -> bool {
        self.actor_id.is_none()
    }

    /// Whether this event records a state change.
    pub fn changes_state(&self) -> bool {
        self.new_status.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_round_trip() {
        for kind in [
            EventKind::Created,
            EventKind::StatusChanged,
            EventKind::Claimed,
            EventKind::Escalated,
            EventKind::TakenOver,
            EventKind::Commented,
            EventKind::DeadlineExpired,
        ] {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::parse("CLAIMED"), None);
    }

    #[test]
    fn test_system_event() {
        let event = TaskEvent {
            id: EventId::new(),
            task_id: TaskId::new(),
            actor_id: None,
            kind: EventKind::DeadlineExpired,
            old_status: Some(TaskStatus::InProgress),
            new_status: Some(TaskStatus::Stuck),
            comment: "Status deadline expired. Was in IN_PROGRESS for 61 minutes.".to_string(),
            created_at: Utc::now(),
        };
        assert!(event.is_system_event());
        assert!(event.changes_state());
    }
}
