// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod api;
pub mod auth;
pub mod dto;
pub mod handlers;

pub use api::{app, AppState};
