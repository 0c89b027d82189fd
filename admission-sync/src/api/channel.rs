//! The query/update channel the reconciliation engine and executor talk to

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use super::statement::{TableRef, UpdateStatement};
use crate::errors::SyncResult;

/// A row returned by an identifier query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetRow {
    pub id: i64,
    /// Selected payload columns; `None` for SQL NULL
    pub fields: BTreeMap<String, Option<String>>,
}

impl TargetRow {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: Option<&str>) -> Self {
        self.fields
            .insert(name.to_string(), value.map(|v| v.to_string()));
        self
    }
}

/// Column name and declared type, from introspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
}

/// Post-update summary of one column over the whole table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnStats {
    pub column: String,
    pub total_rows: u64,
    pub non_null: u64,
    /// Numeric aggregates; `None` when no value parses as a number
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    /// Most frequent non-null values, most common first
    pub top_values: Vec<(String, u64)>,
}

impl ColumnStats {
    /// Share of table rows holding a value
    pub fn fill_ratio(&self) -> f64 {
        if self.total_rows == 0 {
            0.0
        } else {
            self.non_null as f64 / self.total_rows as f64
        }
    }
}

/// Explicitly owned connection to the target table
///
/// Calls are awaited one at a time; implementations need not support
/// concurrent use.
#[async_trait]
pub trait TargetChannel: Send + Sync {
    /// Table every call operates on
    fn table(&self) -> &TableRef;

    /// Rows whose identifier is in `ids`; every matching row is returned,
    /// duplicates included
    async fn query_rows(&self, ids: &[i64]) -> SyncResult<Vec<TargetRow>>;

    /// Submit one bulk update
    async fn apply(&self, statement: &UpdateStatement) -> SyncResult<()>;

    /// Total rows in the table (pre-flight and coverage universe)
    async fn row_count(&self) -> SyncResult<u64>;

    /// Column listing (pre-flight only)
    async fn columns(&self) -> SyncResult<Vec<ColumnInfo>>;

    /// Fill rate, numeric range and the `top` most frequent values of
    /// `column`, for checking what an update left behind
    async fn column_stats(&self, column: &str, top: usize) -> SyncResult<ColumnStats>;
}
