// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Bearer-token authentication middleware.
//!
//! Resolves `Authorization: Bearer <token>` to an active agent and
//! stores it in the request extensions; every protected handler reads
//! the agent from there. The agent's workspace scopes all subsequent
//! reads and writes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::domain::error::DomainError;
use crate::domain::repository::TaskStore;
use crate::presentation::api::AppState;
use crate::presentation::dto::ApiError;

pub async fn authenticate<S: TaskStore>(
    State(state): State<Arc<AppState<S>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let Some(token) = parse_bearer_token(header_value) else {
        return Err(ApiError::invalid_token());
    };

    let agent = state
        .agents
        .get_by_token(token)
        .await
        .map_err(|e| ApiError::from(DomainError::from(e)))?
        .ok_or_else(ApiError::invalid_token)?;

    if !agent.is_active {
        return Err(ApiError::from(DomainError::AgentInactive));
    }

    req.extensions_mut().insert(agent);
    Ok(next.run(req).await)
}

/// Extract the token from a `Bearer <token>` header, tolerating a
/// lowercase scheme.
fn parse_bearer_token(header: &str) -> Option<&str> {
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))?;
    if token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer_token() {
        assert_eq!(parse_bearer_token("Bearer tok-A"), Some("tok-A"));
        assert_eq!(parse_bearer_token("bearer tok-A"), Some("tok-A"));
        assert_eq!(parse_bearer_token("Bearer "), None);
        assert_eq!(parse_bearer_token("Basic dXNlcg=="), None);
        assert_eq!(parse_bearer_token(""), None);
    }
}
