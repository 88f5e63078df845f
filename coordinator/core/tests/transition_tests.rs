// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! End-to-end transition scenarios against the in-memory backend:
//! create / claim / finish, auto-activation, escalation, takeover,
//! blocker gating, cycle rejection, and the deadline and assignee laws.

mod support;

use chrono::{Duration, Utc};
use support::{input, raw_task, TestEnv};
use taskboard_core::domain::{DomainError, EventKind, TaskStatus, TaskVisibility};

#[tokio::test]
async fn s1_create_claim_finish() {
    let env = TestEnv::new();
    let a = env.agent("agent-a");

    let created = env.create(&a, "Update MTL node configuration").await;
    assert_eq!(created.task.status, TaskStatus::New);
    assert!(created.task.assignee_id.is_none());
    // NEW carries a 60-minute deadline in this workspace.
    let deadline = created.task.status_deadline_at.expect("deadline missing");
    let skew = deadline - (Utc::now() + Duration::minutes(60));
    assert!(skew.num_seconds().abs() < 5);

    let event = env
        .service
        .claim(&a, created.task.id, "taking")
        .await
        .expect("claim failed");
    assert_eq!(event.kind, EventKind::Claimed);
    assert_eq!(event.old_status, Some(TaskStatus::New));
    assert_eq!(event.new_status, Some(TaskStatus::InProgress));

    let task = env.task(created.task.id).await;
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.assignee_id, Some(a.id));
    let deadline = task.status_deadline_at.expect("deadline missing");
    let skew = deadline - (Utc::now() + Duration::minutes(120));
    assert!(skew.num_seconds().abs() < 5);

    env.service
        .transition_status(&a, task.id, TaskStatus::Done, "done")
        .await
        .expect("finish failed");
    let task = env.task(task.id).await;
    assert_eq!(task.status, TaskStatus::Done);
    assert!(task.status_deadline_at.is_none());

    let detail = env.service.get_task_detail(&a, task.id).await.unwrap();
    let kinds: Vec<EventKind> = detail.events.iter().map(|e| e.event.kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Created, EventKind::Claimed, EventKind::StatusChanged]
    );
}

#[tokio::test]
async fn s2_create_with_assignee_auto_activates() {
    let env = TestEnv::new();
    let a = env.agent("agent-a");
    let b = env.agent("agent-b");

    let mut request = input("Deploy the collector service");
    request.assignee_id = Some(b.id);
    let created = env.service.create_task(&a, request).await.unwrap();

    assert_eq!(created.task.status, TaskStatus::InProgress);
    assert_eq!(created.task.assignee_id, Some(b.id));
    let deadline = created.task.status_deadline_at.expect("deadline missing");
    let skew = deadline - (Utc::now() + Duration::minutes(120));
    assert!(skew.num_seconds().abs() < 5);

    let detail = env.service.get_task_detail(&a, created.task.id).await.unwrap();
    assert_eq!(detail.events.len(), 1);
    assert_eq!(detail.events[0].event.kind, EventKind::Created);
    assert_eq!(
        detail.events[0].event.new_status,
        Some(TaskStatus::InProgress)
    );
}

#[tokio::test]
async fn create_rejects_bad_input() {
    let env = TestEnv::new();
    let a = env.agent("agent-a");

    let mut short = input("abc");
    short.title = "abc".to_string();
    assert!(matches!(
        env.service.create_task(&a, short).await,
        Err(DomainError::Validation(_))
    ));

    let mut blank = input("A task with a blank description");
    blank.description = "   ".to_string();
    assert!(matches!(
        env.service.create_task(&a, blank).await,
        Err(DomainError::Validation(_))
    ));

    let mut unknown_blocker = input("A task with unknown blockers");
    unknown_blocker.blocked_by = vec![taskboard_core::domain::TaskId::new()];
    assert!(matches!(
        env.service.create_task(&a, unknown_blocker).await,
        Err(DomainError::Validation(_))
    ));
}

/// Creation with an assignee while blockers are unresolved is a hard
/// 422 rather than a silent fallback to NEW.
#[tokio::test]
async fn create_with_assignee_and_unresolved_blockers_is_rejected() {
    let env = TestEnv::new();
    let a = env.agent("agent-a");
    let b = env.agent("agent-b");

    let blocker = env.create(&a, "The prerequisite work item").await;

    let mut request = input("Dependent work item");
    request.assignee_id = Some(b.id);
    request.blocked_by = vec![blocker.task.id];
    assert!(matches!(
        env.service.create_task(&a, request).await,
        Err(DomainError::Validation(_))
    ));
}

#[tokio::test]
async fn s3_escalate_preserves_assignee_and_rejects_owner() {
    let env = TestEnv::new();
    let a = env.agent("agent-a");
    let b = env.agent("agent-b");

    let created = env.create(&a, "Investigate intermittent failures").await;
    env.service.claim(&a, created.task.id, "mine").await.unwrap();

    let event = env
        .service
        .escalate(&b, created.task.id, "looks stuck")
        .await
        .expect("escalate failed");
    assert_eq!(event.kind, EventKind::Escalated);

    let task = env.task(created.task.id).await;
    assert_eq!(task.status, TaskStatus::Blocked);
    assert_eq!(task.assignee_id, Some(a.id), "escalation must not reassign");

    // The assignee hitting the same endpoint is told it is their own
    // task, not that the transition is invalid.
    assert!(matches!(
        env.service.escalate(&a, task.id, "stuck").await,
        Err(DomainError::CannotEscalateOwn)
    ));

    // The assignee resumes, then tries to escalate their own task.
    env.service
        .transition_status(&a, task.id, TaskStatus::InProgress, "resuming")
        .await
        .unwrap();
    assert!(matches!(
        env.service.escalate(&a, task.id, "stuck").await,
        Err(DomainError::CannotEscalateOwn)
    ));
}

#[tokio::test]
async fn s4_takeover_reassigns_and_rejects_repeat() {
    // IN_PROGRESS deadline in the past: the claim is instantly overdue.
    let env = TestEnv::with_deadlines(&[(TaskStatus::New, 60), (TaskStatus::InProgress, -60)]);
    let a = env.agent("agent-a");
    let b = env.agent("agent-b");

    let created = env.create(&a, "Long running migration job").await;
    env.service.claim(&a, created.task.id, "mine").await.unwrap();

    let report = env.reap().await;
    assert_eq!(report.successful, 1);
    let task = env.task(created.task.id).await;
    assert_eq!(task.status, TaskStatus::Stuck);
    assert_eq!(task.assignee_id, Some(a.id));

    let event = env
        .service
        .takeover(&b, task.id, "taking over")
        .await
        .expect("takeover failed");
    assert_eq!(event.kind, EventKind::TakenOver);

    let task = env.task(task.id).await;
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.assignee_id, Some(b.id));

    assert!(matches!(
        env.service.takeover(&b, task.id, "again").await,
        Err(DomainError::CannotTakeover)
    ));
}

#[tokio::test]
async fn s5_blocker_gate_lifts_when_last_blocker_completes() {
    let env = TestEnv::new();
    let a = env.agent("agent-a");
    let b = env.agent("agent-b");

    let alpha = env.create(&a, "Prepare the schema change").await;
    let mut request = input("Apply the dependent change");
    request.blocked_by = vec![alpha.task.id];
    let beta = env.service.create_task(&a, request).await.unwrap();
    assert!(beta.has_unresolved_blockers);

    assert!(matches!(
        env.service.claim(&b, beta.task.id, "starting").await,
        Err(DomainError::UnresolvedBlockers)
    ));

    env.service.claim(&a, alpha.task.id, "on it").await.unwrap();
    env.service
        .transition_status(&a, alpha.task.id, TaskStatus::Done, "done")
        .await
        .unwrap();

    env.service
        .claim(&b, beta.task.id, "unblocked now")
        .await
        .expect("claim after unblock failed");
}

#[tokio::test]
async fn cycle_in_blocker_graph_is_rejected() {
    let env = TestEnv::new();
    let a = env.agent("agent-a");

    // A -> B -> C -> A, seeded directly: the API cannot produce this
    // because blockers are frozen at creation.
    let mut t_a = raw_task(env.workspace.id, a.id, Vec::new());
    let mut t_b = raw_task(env.workspace.id, a.id, Vec::new());
    let t_c = raw_task(env.workspace.id, a.id, vec![t_a.id]);
    t_b.blocked_by = vec![t_c.id];
    t_a.blocked_by = vec![t_b.id];
    env.seed_task(t_a.clone()).await;
    env.seed_task(t_b.clone()).await;
    env.seed_task(t_c.clone()).await;

    for id in [t_a.id, t_b.id, t_c.id] {
        assert!(matches!(
            env.service.claim(&a, id, "activating").await,
            Err(DomainError::CyclicDependency(_))
        ));
    }
}

#[tokio::test]
async fn deep_blocker_chain_hits_depth_bound() {
    let env = TestEnv::new();
    let a = env.agent("agent-a");

    // Acyclic chain of 200; the DFS budget (100) must trip first.
    let mut next = None;
    let mut head = None;
    for _ in 0..200 {
        let task = raw_task(
            env.workspace.id,
            a.id,
            next.map(|id| vec![id]).unwrap_or_default(),
        );
        next = Some(task.id);
        head = Some(task.id);
        env.seed_task(task).await;
    }

    assert!(matches!(
        env.service.claim(&a, head.unwrap(), "activating").await,
        Err(DomainError::CyclicDependency(_))
    ));
}

#[tokio::test]
async fn release_to_new_clears_assignee() {
    let env = TestEnv::new();
    let a = env.agent("agent-a");

    let created = env.create(&a, "A task that gets returned").await;
    env.service.claim(&a, created.task.id, "mine").await.unwrap();
    env.service
        .transition_status(&a, created.task.id, TaskStatus::New, "returning it")
        .await
        .unwrap();

    let task = env.task(created.task.id).await;
    assert_eq!(task.status, TaskStatus::New);
    assert!(task.assignee_id.is_none());
}

#[tokio::test]
async fn unconfigured_status_has_no_deadline() {
    // Only IN_PROGRESS carries a deadline here; NEW and BLOCKED do not.
    let env = TestEnv::with_deadlines(&[(TaskStatus::InProgress, 120)]);
    let a = env.agent("agent-a");
    let b = env.agent("agent-b");

    let created = env.create(&a, "A task without a NEW deadline").await;
    assert!(created.task.status_deadline_at.is_none());

    env.service.claim(&a, created.task.id, "mine").await.unwrap();
    env.service
        .escalate(&b, created.task.id, "blocked on infra")
        .await
        .unwrap();
    let task = env.task(created.task.id).await;
    assert_eq!(task.status, TaskStatus::Blocked);
    assert!(task.status_deadline_at.is_none());
}

#[tokio::test]
async fn terminal_states_allow_comments_but_no_transitions() {
    let env = TestEnv::new();
    let a = env.agent("agent-a");

    let created = env.create(&a, "A short-lived work item").await;
    env.service.claim(&a, created.task.id, "mine").await.unwrap();
    env.service
        .transition_status(&a, created.task.id, TaskStatus::Done, "done")
        .await
        .unwrap();

    let event = env
        .service
        .comment(&a, created.task.id, "postmortem notes")
        .await
        .expect("comment on terminal task failed");
    assert_eq!(event.kind, EventKind::Commented);
    assert!(event.new_status.is_none());

    for target in [TaskStatus::New, TaskStatus::InProgress, TaskStatus::Cancelled] {
        assert!(matches!(
            env.service
                .transition_status(&a, created.task.id, target, "nope")
                .await,
            Err(DomainError::InvalidTransition { .. })
        ));
    }
}

/// STUCK -> IN_PROGRESS by the current assignee is a plain resume and
/// must emit `status_changed`, not `taken_over`.
#[tokio::test]
async fn stuck_resume_by_assignee_emits_status_changed() {
    let env = TestEnv::with_deadlines(&[(TaskStatus::New, 60), (TaskStatus::InProgress, -60)]);
    let a = env.agent("agent-a");

    let created = env.create(&a, "A task that will go stuck").await;
    env.service.claim(&a, created.task.id, "mine").await.unwrap();
    env.reap().await;
    assert_eq!(env.task(created.task.id).await.status, TaskStatus::Stuck);

    let event = env
        .service
        .transition_status(&a, created.task.id, TaskStatus::InProgress, "resuming")
        .await
        .unwrap();
    assert_eq!(event.kind, EventKind::StatusChanged);
    assert_eq!(env.task(created.task.id).await.assignee_id, Some(a.id));
}

#[tokio::test]
async fn empty_comment_is_rejected_on_every_verb() {
    let env = TestEnv::new();
    let a = env.agent("agent-a");
    let created = env.create(&a, "A task needing comments").await;

    assert!(matches!(
        env.service.claim(&a, created.task.id, "").await,
        Err(DomainError::EmptyComment)
    ));
    assert!(matches!(
        env.service
            .transition_status(&a, created.task.id, TaskStatus::Cancelled, " ")
            .await,
        Err(DomainError::EmptyComment)
    ));
    assert!(matches!(
        env.service.comment(&a, created.task.id, "").await,
        Err(DomainError::EmptyComment)
    ));
}

#[tokio::test]
async fn private_task_cannot_be_claimed() {
    let env = TestEnv::new();
    let a = env.agent("agent-a");
    let b = env.agent("agent-b");

    let mut request = input("A private piece of work");
    request.visibility = TaskVisibility::Private;
    let created = env.service.create_task(&a, request).await.unwrap();

    // Even the creator cannot claim: the claim path is public-only.
    assert!(matches!(
        env.service.claim(&a, created.task.id, "mine").await,
        Err(DomainError::InsufficientAccess)
    ));
    // A non-participant is rejected at the visibility gate.
    assert!(matches!(
        env.service.claim(&b, created.task.id, "mine").await,
        Err(DomainError::InsufficientAccess)
    ));
}
