// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Deadline Reaper
//!
//! Periodic scan that migrates overdue tasks into `STUCK`. Each task is
//! processed in its own transaction with a conditional write, so a pass
//! is idempotent (a reaped task no longer matches the scan) and an agent
//! action landing between scan and update wins the race.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::domain::error::DomainError;
use crate::domain::event::EventKind;
use crate::domain::repository::{NewEvent, StatusWrite, TaskStore};
use crate::domain::task::{Task, TaskStatus};
use crate::domain::workspace::Workspace;

/// Deadline for a task entering `status`: `now + configured minutes`,
/// or `None` when the status bears no deadline or the workspace does
/// not configure one (such tasks are immune to reaping).
pub fn calculate_deadline(
    workspace: &Workspace,
    status: TaskStatus,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    workspace
        .deadline_minutes(status)
        .map(|minutes| now + chrono::Duration::minutes(minutes))
}

/// Outcome of one reaper pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaperReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

pub struct DeadlineReaper<S> {
    store: Arc<S>,
}

impl<S: TaskStore> DeadlineReaper<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// One pass over all overdue tasks. A single task's failure is
    /// recorded and the pass continues; only the initial scan aborts it.
    pub async fn run_once(&self) -> Result<ReaperReport, DomainError> {
        let expired = self.store.find_expired().await?;
        if expired.is_empty() {
            return Ok(ReaperReport::default());
        }

        let mut report = ReaperReport {
            total: expired.len(),
            ..ReaperReport::default()
        };

        for task in &expired {
            match self.reap_one(task).await {
                Ok(()) => report.successful += 1,
                Err(e) => {
                    error!(task_id = %task.id, error = %e, "failed to expire task");
                    report.failed += 1;
                }
            }
        }

        info!(
            total = report.total,
            successful = report.successful,
            failed = report.failed,
            "processed expired deadlines"
        );
        Ok(report)
    }

    /// Run forever, one pass per interval tick.
    pub async fn run_periodic(&self, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                error!(error = %e, "deadline pass failed");
            }
        }
    }

    async fn reap_one(&self, task: &Task) -> Result<(), DomainError> {
        let now = Utc::now();
        let overdue_minutes = task
            .status_deadline_at
            .map(|d| (now - d).num_minutes().max(0))
            .unwrap_or(0);

        let mut tx = self.store.begin().await?;
        let result = self.reap_in_tx(&mut tx, task, overdue_minutes).await;
        match result {
            Ok(()) => {
                self.store.commit(tx).await?;
                info!(
                    task_id = %task.id,
                    old_status = %task.status,
                    overdue_minutes,
                    "task deadline expired"
                );
                Ok(())
            }
            Err(e) => {
                let _ = self.store.rollback(tx).await;
                Err(e)
            }
        }
    }

    async fn reap_in_tx(
        &self,
        tx: &mut S::Tx,
        task: &Task,
        overdue_minutes: i64,
    ) -> Result<(), DomainError> {
        let written = self
            .store
            .update_status(
                tx,
                &StatusWrite {
                    task_id: task.id,
                    observed: task.status,
                    new_status: TaskStatus::Stuck,
                    assignee_id: task.assignee_id,
                    status_deadline_at: None,
                    require_unassigned: false,
                },
            )
            .await?;
        if !written {
            // An agent got there first; leave the task alone.
            return Err(DomainError::TaskAlreadyClaimed);
        }

        self.store
            .append_event(
                tx,
                NewEvent {
                    task_id: task.id,
                    actor_id: None,
                    kind: EventKind::DeadlineExpired,
                    old_status: Some(task.status),
                    new_status: Some(TaskStatus::Stuck),
                    comment: format!(
                        "Status deadline expired. Was in {} for {} minutes.",
                        task.status, overdue_minutes
                    ),
                },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workspace::WorkspaceId;
    use chrono::Duration;

    fn workspace() -> Workspace {
        Workspace {
            id: WorkspaceId::new(),
            name: "Fleet".to_string(),
            slug: "fleet".to_string(),
            status_deadlines: [(TaskStatus::New, 60), (TaskStatus::InProgress, 120)]
                .into_iter()
                .collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_calculate_deadline_configured_status() {
        let ws = workspace();
        let now = Utc::now();
        let deadline = calculate_deadline(&ws, TaskStatus::InProgress, now).unwrap();
        assert_eq!(deadline, now + Duration::minutes(120));
    }

    #[test]
    fn test_calculate_deadline_unconfigured_status() {
        let ws = workspace();
        assert_eq!(calculate_deadline(&ws, TaskStatus::Blocked, Utc::now()), None);
    }

    #[test]
    fn test_calculate_deadline_cleared_for_non_bearing_statuses() {
        let ws = workspace();
        let now = Utc::now();
        for status in [TaskStatus::Stuck, TaskStatus::Done, TaskStatus::Cancelled] {
            assert_eq!(calculate_deadline(&ws, status, now), None);
        }
    }
}
