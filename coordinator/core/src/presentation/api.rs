// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use crate::application::task_service::TaskService;
use crate::domain::repository::{AgentRepository, TaskStore};
use crate::presentation::{auth, handlers};

pub struct AppState<S> {
    pub service: TaskService<S>,
    pub agents: Arc<dyn AgentRepository>,
}

/// Assemble the HTTP application: authenticated `/api/v1` routes plus
/// the public liveness probe and the agent manual.
pub fn app<S: TaskStore>(service: TaskService<S>, agents: Arc<dyn AgentRepository>) -> Router {
    let state = Arc::new(AppState { service, agents });

    let protected = Router::new()
        .route(
            "/tasks",
            get(handlers::list_tasks::<S>).post(handlers::create_task::<S>),
        )
        .route("/tasks/:id", get(handlers::get_task::<S>))
        .route("/tasks/:id/status", patch(handlers::transition_status::<S>))
        .route("/tasks/:id/claim", post(handlers::claim_task::<S>))
        .route("/tasks/:id/escalate", post(handlers::escalate_task::<S>))
        .route("/tasks/:id/takeover", post(handlers::takeover_task::<S>))
        .route("/tasks/:id/comments", post(handlers::comment_task::<S>))
        .route("/stats", get(handlers::get_stats::<S>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate::<S>,
        ));

    Router::new()
        .nest("/api/v1", protected)
        .route("/healthz", get(handlers::healthz::<S>))
        .route("/skill.md", get(handlers::skill_md))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
