use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::task::TaskStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceId(pub Uuid);

impl WorkspaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkspaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An isolation scope. Every task and agent belongs to exactly one
/// workspace and is invisible outside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub slug: String,
    /// Status -> deadline in minutes. Only deadline-bearing statuses need
    /// entries; a missing entry means no deadline in that status.
    pub status_deadlines: HashMap<TaskStatus, i64>,
    pub created_at: DateTime<Utc>,
}

impl Workspace {
    pub fn deadline_minutes(&self, status: TaskStatus) -> Option<i64> {
        if !status.has_deadline() {
            return None;
        }
        self.status_deadlines.get(&status).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_with(deadlines: &[(TaskStatus, i64)]) -> Workspace {
        Workspace {
            id: WorkspaceId::new(),
            name: "Test".to_string(),
            slug: "test".to_string(),
            status_deadlines: deadlines.iter().copied().collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_deadline_minutes_configured() {
        let ws = workspace_with(&[(TaskStatus::InProgress, 120), (TaskStatus::New, 60)]);
        assert_eq!(ws.deadline_minutes(TaskStatus::InProgress), Some(120));
        assert_eq!(ws.deadline_minutes(TaskStatus::New), Some(60));
        assert_eq!(ws.deadline_minutes(TaskStatus::Blocked), None);
    }

    #[test]
    fn test_no_deadline_for_terminal_or_stuck() {
        // Even a (misconfigured) entry for a non-deadline status is ignored.
        let ws = workspace_with(&[(TaskStatus::Done, 30), (TaskStatus::Stuck, 30)]);
        assert_eq!(ws.deadline_minutes(TaskStatus::Done), None);
        assert_eq!(ws.deadline_minutes(TaskStatus::Stuck), None);
        assert_eq!(ws.deadline_minutes(TaskStatus::Cancelled), None);
    }
}
