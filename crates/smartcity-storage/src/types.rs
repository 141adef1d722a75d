//! Query types for the record store.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use smartcity_core::Record;

/// Sort order over record creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// A read query against one domain.
///
/// Filters are equality matches on top-level payload fields and are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordQuery {
    pub filters: Vec<(String, Value)>,
    pub sort: SortOrder,
    pub limit: Option<usize>,
}

impl RecordQuery {
    /// Creates an empty query: every record, newest first.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The newest `limit` records.
    #[must_use]
    pub fn newest(limit: usize) -> Self {
        Self::new().with_limit(limit)
    }

    #[must_use]
    pub fn with_filter(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filters.push((field.into(), value));
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` if the record satisfies every filter.
    pub fn matches(&self, record: &Record) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| record.field(field) == Some(expected))
    }
}
