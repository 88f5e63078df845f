// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Dependency Resolver
//!
//! Gates activation (any transition into `IN_PROGRESS`) on the blocker
//! graph: every blocker must be `DONE`, and the graph reachable from the
//! task must be acyclic. The DFS carries a hard depth bound so that
//! adversarial or corrupted graphs terminate with a cycle-class error
//! instead of diverging.

use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::error::DomainError;
use crate::domain::repository::TaskStore;
use crate::domain::task::{TaskId, TaskStatus};
use crate::domain::workspace::WorkspaceId;

/// Hard bound on DFS depth. Doubles as a DoS ceiling on pathological
/// blocker chains.
pub const MAX_DEPTH: usize = 100;

pub struct DependencyResolver<S> {
    store: Arc<S>,
}

impl<S: TaskStore> DependencyResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Every blocker must exist in the workspace and be `DONE`. Missing
    /// ids count as unresolved.
    pub async fn assert_all_done(
        &self,
        workspace_id: WorkspaceId,
        blocked_by: &[TaskId],
    ) -> Result<(), DomainError> {
        if blocked_by.is_empty() {
            return Ok(());
        }

        let blockers = self.store.get_blockers(workspace_id, blocked_by).await?;
        if blockers.len() != blocked_by.len() {
            return Err(DomainError::UnresolvedBlockers);
        }
        if blockers.iter().any(|b| b.status != TaskStatus::Done) {
            return Err(DomainError::UnresolvedBlockers);
        }
        Ok(())
    }

    /// Depth-first traversal of the `blocked_by` relation from `root`.
    /// A back edge or an exhausted depth budget yields `CyclicDependency`.
    pub async fn assert_acyclic(&self, root: TaskId) -> Result<(), DomainError> {
        struct Frame {
            id: TaskId,
            blockers: Vec<TaskId>,
            next: usize,
        }

        let mut visited: HashSet<TaskId> = HashSet::new();
        let mut on_path: HashSet<TaskId> = HashSet::new();

        let root_blockers = self.blockers_of(root).await?;
        visited.insert(root);
        on_path.insert(root);
        let mut stack = vec![Frame {
            id: root,
            blockers: root_blockers,
            next: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            if frame.next < frame.blockers.len() {
                let child = frame.blockers[frame.next];
                frame.next += 1;

                if on_path.contains(&child) {
                    return Err(DomainError::CyclicDependency(child));
                }
                if visited.contains(&child) {
                    continue;
                }
                if stack.len() >= MAX_DEPTH {
                    return Err(DomainError::CyclicDependency(child));
                }

                let blockers = self.blockers_of(child).await?;
                visited.insert(child);
                on_path.insert(child);
                stack.push(Frame {
                    id: child,
                    blockers,
                    next: 0,
                });
            } else {
                on_path.remove(&frame.id);
                stack.pop();
            }
        }

        Ok(())
    }

    /// A task missing from the store contributes no edges.
    async fn blockers_of(&self, id: TaskId) -> Result<Vec<TaskId>, DomainError> {
        Ok(self
            .store
            .get_task(id)
            .await?
            .map(|t| t.blocked_by)
            .unwrap_or_default())
    }
}
