// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Deadline reaper behaviour: idempotent migration to STUCK, the audit
//! event format, and per-item failure isolation.

mod support;

use support::TestEnv;
use taskboard_core::domain::{EventKind, TaskStatus};

#[tokio::test]
async fn s8_overdue_task_is_reaped_once() {
    let env = TestEnv::with_deadlines(&[(TaskStatus::New, 60), (TaskStatus::InProgress, -60)]);
    let a = env.agent("agent-a");

    let created = env.create(&a, "A task left past its deadline").await;
    env.service.claim(&a, created.task.id, "mine").await.unwrap();

    let report = env.reap().await;
    assert_eq!(report.total, 1);
    assert_eq!(report.successful, 1);
    assert_eq!(report.failed, 0);

    let task = env.task(created.task.id).await;
    assert_eq!(task.status, TaskStatus::Stuck);
    assert!(task.status_deadline_at.is_none());
    assert_eq!(task.assignee_id, Some(a.id), "reaping keeps the assignee");

    let detail = env.service.get_task_detail(&a, task.id).await.unwrap();
    let expired: Vec<_> = detail
        .events
        .iter()
        .filter(|e| e.event.kind == EventKind::DeadlineExpired)
        .collect();
    assert_eq!(expired.len(), 1);
    let event = &expired[0].event;
    assert!(event.actor_id.is_none(), "expiry is a system event");
    assert!(expired[0].actor_name.is_none());
    assert_eq!(event.old_status, Some(TaskStatus::InProgress));
    assert_eq!(event.new_status, Some(TaskStatus::Stuck));
    assert!(event.comment.contains("Was in IN_PROGRESS for"));
    assert!(event.comment.contains("minutes"));

    // Second pass: the task no longer matches the scan, nothing happens.
    let report = env.reap().await;
    assert_eq!(report.total, 0);

    let detail = env.service.get_task_detail(&a, task.id).await.unwrap();
    let expired = detail
        .events
        .iter()
        .filter(|e| e.event.kind == EventKind::DeadlineExpired)
        .count();
    assert_eq!(expired, 1, "no duplicate expiry events");
}

#[tokio::test]
async fn one_failing_task_does_not_abort_the_pass() {
    let env = TestEnv::with_deadlines(&[(TaskStatus::New, 60), (TaskStatus::InProgress, -60)]);
    let a = env.agent("agent-a");

    let mut ids = Vec::new();
    for i in 0..4 {
        let created = env.create(&a, &format!("Overdue batch item {i}")).await;
        env.service.claim(&a, created.task.id, "mine").await.unwrap();
        ids.push(created.task.id);
    }

    let poisoned = ids[1];
    env.store.fail_writes_for(poisoned);

    let report = env.reap().await;
    assert_eq!(report.total, 4);
    assert_eq!(report.successful, 3);
    assert_eq!(report.failed, 1);

    for id in ids {
        let task = env.task(id).await;
        if id == poisoned {
            assert_eq!(task.status, TaskStatus::InProgress, "failed item untouched");
        } else {
            assert_eq!(task.status, TaskStatus::Stuck);
        }
    }
}

#[tokio::test]
async fn tasks_without_deadlines_are_never_reaped() {
    // No deadline configured anywhere: nothing to expire.
    let env = TestEnv::with_deadlines(&[]);
    let a = env.agent("agent-a");

    let created = env.create(&a, "A task with no deadline at all").await;
    env.service.claim(&a, created.task.id, "mine").await.unwrap();

    let report = env.reap().await;
    assert_eq!(report.total, 0);
    assert_eq!(env.task(created.task.id).await.status, TaskStatus::InProgress);
}

#[tokio::test]
async fn future_deadlines_are_left_alone() {
    let env = TestEnv::new();
    let a = env.agent("agent-a");

    let created = env.create(&a, "A freshly created task").await;
    let report = env.reap().await;
    assert_eq!(report.total, 0);
    assert_eq!(env.task(created.task.id).await.status, TaskStatus::New);
}
