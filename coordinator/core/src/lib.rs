// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Taskboard Core
//!
//! Coordination core for a fleet of autonomous agents sharing a pool of
//! work items: a state machine over tasks with ownership- and
//! dependency-gated transitions, per-status deadlines enforced by a
//! background reaper, and an append-only audit trail.
//!
//! # Architecture
//!
//! - **domain**: entities, the transition table, the error taxonomy
//! - **application**: task service (transition engine), dependency
//!   resolver, deadline reaper
//! - **infrastructure**: PostgreSQL and in-memory storage backends
//! - **presentation**: HTTP/JSON surface (axum)

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
