// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::domain::workspace::WorkspaceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task lifecycle states.
///
/// `NEW`, `IN_PROGRESS` and `BLOCKED` carry a deadline (when the workspace
/// configures one) and are subject to the reaper; `DONE` and `CANCELLED`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "NEW")]
    New,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "BLOCKED")]
    Blocked,
    #[serde(rename = "STUCK")]
    Stuck,
    #[serde(rename = "DONE")]
    Done,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::New,
        TaskStatus::InProgress,
        TaskStatus::Blocked,
        TaskStatus::Stuck,
        TaskStatus::Done,
        TaskStatus::Cancelled,
    ];

    /// Terminal statuses admit no further transition, only comments.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }

    /// Statuses that carry a deadline and are scanned by the reaper.
    pub fn has_deadline(self) -> bool {
        matches!(
            self,
            TaskStatus::New | TaskStatus::InProgress | TaskStatus::Blocked
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::New => "NEW",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Blocked => "BLOCKED",
            TaskStatus::Stuck => "STUCK",
            TaskStatus::Done => "DONE",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(TaskStatus::New),
            "IN_PROGRESS" => Some(TaskStatus::InProgress),
            "BLOCKED" => Some(TaskStatus::Blocked),
            "STUCK" => Some(TaskStatus::Stuck),
            "DONE" => Some(TaskStatus::Done),
            "CANCELLED" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Private tasks are visible only to their creator and assignee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskVisibility {
    Public,
    Private,
}

impl TaskVisibility {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskVisibility::Public => "public",
            TaskVisibility::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(TaskVisibility::Public),
            "private" => Some(TaskVisibility::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl TaskPriority {
    /// Sort rank: critical > high > normal > low.
    pub fn rank(self) -> u8 {
        match self {
            TaskPriority::Critical => 4,
            TaskPriority::High => 3,
            TaskPriority::Normal => 2,
            TaskPriority::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(TaskPriority::Low),
            "normal" => Some(TaskPriority::Normal),
            "high" => Some(TaskPriority::High),
            "critical" => Some(TaskPriority::Critical),
            _ => None,
        }
    }
}

/// A unit of work tracked by the coordination core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub workspace_id: WorkspaceId,
    pub title: String,
    pub description: String,
    pub creator_id: AgentId,
    pub assignee_id: Option<AgentId>,
    pub status: TaskStatus,
    pub visibility: TaskVisibility,
    pub priority: TaskPriority,
    pub blocked_by: Vec<TaskId>,
    pub status_deadline_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// A task is claimable when it sits unassigned and public in the pool.
    pub fn is_claimable(&self) -> bool {
        self.status == TaskStatus::New
            && self.assignee_id.is_none()
            && self.visibility == TaskVisibility::Public
    }

    pub fn is_owned_by(&self, agent_id: AgentId) -> bool {
        self.assignee_id == Some(agent_id)
    }

    pub fn is_created_by(&self, agent_id: AgentId) -> bool {
        self.creator_id == agent_id
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status_deadline_at.is_some_and(|d| d < now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base_task() -> Task {
        let now = Utc::now();
        Task {
            id: TaskId::new(),
            workspace_id: WorkspaceId::new(),
            title: "Update node configuration".to_string(),
            description: "Roll out the new settings".to_string(),
            creator_id: AgentId::new(),
            assignee_id: None,
            status: TaskStatus::New,
            visibility: TaskVisibility::Public,
            priority: TaskPriority::Normal,
            blocked_by: Vec::new(),
            status_deadline_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_round_trip() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("new"), None);
        assert_eq!(TaskStatus::parse("PAUSED"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::New.is_terminal());
        assert!(!TaskStatus::Stuck.is_terminal());
    }

    #[test]
    fn test_deadline_bearing_statuses() {
        assert!(TaskStatus::New.has_deadline());
        assert!(TaskStatus::InProgress.has_deadline());
        assert!(TaskStatus::Blocked.has_deadline());
        assert!(!TaskStatus::Stuck.has_deadline());
        assert!(!TaskStatus::Done.has_deadline());
        assert!(!TaskStatus::Cancelled.has_deadline());
    }

    #[test]
    fn test_priority_rank_ordering() {
        assert!(TaskPriority::Critical.rank() > TaskPriority::High.rank());
        assert!(TaskPriority::High.rank() > TaskPriority::Normal.rank());
        assert!(TaskPriority::Normal.rank() > TaskPriority::Low.rank());
    }

    #[test]
    fn test_is_claimable() {
        let mut task = base_task();
        assert!(task.is_claimable());

        task.assignee_id = Some(AgentId::new());
        assert!(!task.is_claimable());

        task.assignee_id = None;
        task.visibility = TaskVisibility::Private;
        assert!(!task.is_claimable());

        task.visibility = TaskVisibility::Public;
        task.status = TaskStatus::Stuck;
        assert!(!task.is_claimable());
    }

    #[test]
    fn test_ownership_helpers() {
        let mut task = base_task();
        let agent = AgentId::new();
        assert!(!task.is_owned_by(agent));
        task.assignee_id = Some(agent);
        assert!(task.is_owned_by(agent));
        assert!(!task.is_owned_by(AgentId::new()));
        assert!(task.is_created_by(task.creator_id));
    }

    #[test]
    fn test_overdue() {
        let mut task = base_task();
        let now = Utc::now();
        assert!(!task.is_overdue(now));
        task.status_deadline_at = Some(now - Duration::minutes(5));
        assert!(task.is_overdue(now));
        task.status_deadline_at = Some(now + Duration::minutes(5));
        assert!(!task.is_overdue(now));
    }

    #[test]
    fn test_status_serde_wire_literals() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!(
            serde_json::to_string(&TaskVisibility::Private).unwrap(),
            "\"private\""
        );
        assert_eq!(
            serde_json::to_string(&TaskPriority::Critical).unwrap(),
            "\"critical\""
        );
    }
}
