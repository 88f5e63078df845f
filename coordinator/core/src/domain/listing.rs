// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Filter and ordering spec for task listing queries.
//!
//! Sort keys come from an allow-list and are resolved to column names
//! here; caller-supplied identifiers never reach the query layer.

use crate::domain::agent::AgentId;
use crate::domain::task::{TaskPriority, TaskStatus, TaskVisibility};
use crate::domain::workspace::WorkspaceId;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Id,
    Status,
    Priority,
    CreatedAt,
    UpdatedAt,
    Title,
}

impl SortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "id" => Some(SortField::Id),
            "status" => Some(SortField::Status),
            "priority" => Some(SortField::Priority),
            "created_at" => Some(SortField::CreatedAt),
            "updated_at" => Some(SortField::UpdatedAt),
            "title" => Some(SortField::Title),
            _ => None,
        }
    }

    /// Column name used by the SQL backend. Only values from this
    /// allow-list are ever interpolated into a query.
    pub fn column(self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Status => "status",
            SortField::Priority => "priority",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Title => "title",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

impl SortKey {
    /// Parse one `field` / `-field` token. Unknown fields yield `None`.
    pub fn parse(token: &str) -> Option<Self> {
        let (token, descending) = match token.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (token, false),
        };
        SortField::parse(token).map(|field| SortKey { field, descending })
    }

    /// Parse a comma-separated sort spec, silently dropping unknown keys.
    pub fn parse_list(spec: &str) -> Vec<Self> {
        spec.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .filter_map(SortKey::parse)
            .collect()
    }

    /// Default ordering: priority descending, then creation ascending.
    pub fn default_sort() -> Vec<Self> {
        vec![
            SortKey {
                field: SortField::Priority,
                descending: true,
            },
            SortKey {
                field: SortField::CreatedAt,
                descending: false,
            },
        ]
    }
}

/// Clamp a requested page size into [1, MAX_LIMIT].
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Filter spec for the listing query. The query is always confined to
/// `workspace_id`; `viewer_id` feeds the private-visibility predicate.
#[derive(Debug, Clone)]
pub struct TaskFilters {
    pub workspace_id: WorkspaceId,
    pub viewer_id: AgentId,
    pub statuses: Vec<TaskStatus>,
    pub assignee_id: Option<AgentId>,
    pub unassigned: bool,
    pub visibility: Option<TaskVisibility>,
    pub priorities: Vec<TaskPriority>,
    pub overdue_only: bool,
    pub unresolved_blockers_only: bool,
    pub sort: Vec<SortKey>,
    pub limit: i64,
    pub offset: i64,
}

impl TaskFilters {
    pub fn for_viewer(workspace_id: WorkspaceId, viewer_id: AgentId) -> Self {
        Self {
            workspace_id,
            viewer_id,
            statuses: Vec::new(),
            assignee_id: None,
            unassigned: false,
            visibility: None,
            priorities: Vec::new(),
            overdue_only: false,
            unresolved_blockers_only: false,
            sort: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    /// The effective ordering: the caller's sanitised keys, or the
    /// default when none survive.
    pub fn effective_sort(&self) -> Vec<SortKey> {
        if self.sort.is_empty() {
            SortKey::default_sort()
        } else {
            self.sort.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key_parse() {
        let key = SortKey::parse("-priority").unwrap();
        assert_eq!(key.field, SortField::Priority);
        assert!(key.descending);

        let key = SortKey::parse("created_at").unwrap();
        assert_eq!(key.field, SortField::CreatedAt);
        assert!(!key.descending);
    }

    #[test]
    fn test_unknown_sort_keys_are_dropped() {
        assert_eq!(SortKey::parse("id; drop table tasks--"), None);
        assert_eq!(SortKey::parse("assignee_id"), None);

        let keys = SortKey::parse_list("-priority,id; drop table tasks--,title");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].field, SortField::Priority);
        assert_eq!(keys[1].field, SortField::Title);
    }

    #[test]
    fn test_parse_list_trims_and_skips_empty() {
        let keys = SortKey::parse_list(" -updated_at , , created_at ");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].field, SortField::UpdatedAt);
        assert!(keys[0].descending);
        assert_eq!(keys[1].field, SortField::CreatedAt);
    }

    #[test]
    fn test_default_sort() {
        let filters = TaskFilters::for_viewer(WorkspaceId::new(), AgentId::new());
        let sort = filters.effective_sort();
        assert_eq!(sort.len(), 2);
        assert_eq!(sort[0].field, SortField::Priority);
        assert!(sort[0].descending);
        assert_eq!(sort[1].field, SortField::CreatedAt);
        assert!(!sort[1].descending);
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-5)), 1);
        assert_eq!(clamp_limit(Some(500)), MAX_LIMIT);
        assert_eq!(clamp_limit(Some(25)), 25);
    }
}
