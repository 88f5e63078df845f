// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod db;
pub mod memory;
pub mod postgres_agent;
pub mod postgres_task;
pub mod postgres_workspace;

pub use db::Database;
pub use memory::{InMemoryAgentRepository, InMemoryStore, InMemoryWorkspaceRepository};
pub use postgres_agent::PgAgentRepository;
pub use postgres_task::PgStore;
pub use postgres_workspace::PgWorkspaceRepository;
