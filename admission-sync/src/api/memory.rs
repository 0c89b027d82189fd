//! In-memory target table for tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use super::channel::{ColumnInfo, ColumnStats, TargetChannel, TargetRow};
use super::statement::{TableRef, UpdateStatement};
use crate::errors::{SyncError, SyncResult};

pub struct MemoryChannel {
    table: TableRef,
    rows: Mutex<Vec<TargetRow>>,
    /// Statements touching any of these identifiers are rejected
    reject_ids: Mutex<HashSet<i64>>,
    unavailable: AtomicBool,
    queries: AtomicUsize,
    applied: AtomicUsize,
}

impl MemoryChannel {
    pub fn new(rows: Vec<TargetRow>) -> Self {
        Self {
            table: TableRef::new("gaokao", "admission_test", "id"),
            rows: Mutex::new(rows),
            reject_ids: Mutex::new(HashSet::new()),
            unavailable: AtomicBool::new(false),
            queries: AtomicUsize::new(0),
            applied: AtomicUsize::new(0),
        }
    }

    /// One row per identifier, with a single `column` holding `value`
    pub fn with_ids(ids: impl IntoIterator<Item = i64>, column: &str, value: Option<&str>) -> Self {
        Self::new(
            ids.into_iter()
                .map(|id| TargetRow::new(id).with_field(column, value))
                .collect(),
        )
    }

    pub fn reject_ids(&self, ids: impl IntoIterator<Item = i64>) {
        self.reject_ids.lock().unwrap().extend(ids);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn applied_count(&self) -> usize {
        self.applied.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Vec<TargetRow> {
        self.rows.lock().unwrap().clone()
    }

    pub fn value_of(&self, id: i64, column: &str) -> Option<String> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .and_then(|r| r.fields.get(column).cloned().flatten())
    }

    fn check_available(&self) -> SyncResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(SyncError::TargetUnavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TargetChannel for MemoryChannel {
    fn table(&self) -> &TableRef {
        &self.table
    }

    async fn query_rows(&self, ids: &[i64]) -> SyncResult<Vec<TargetRow>> {
        self.check_available()?;
        self.queries.fetch_add(1, Ordering::SeqCst);

        let wanted: HashSet<i64> = ids.iter().copied().collect();
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| wanted.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn apply(&self, statement: &UpdateStatement) -> SyncResult<()> {
        self.check_available()?;

        {
            let rejected = self.reject_ids.lock().unwrap();
            if let Some(id) = statement.ids().into_iter().find(|id| rejected.contains(id)) {
                return Err(SyncError::TargetRejected(format!("row {} is locked", id)));
            }
        }

        let cases: BTreeMap<i64, String> = statement
            .assignments
            .iter()
            .map(|(id, value)| (*id, value.as_plain()))
            .collect();

        for row in self.rows.lock().unwrap().iter_mut() {
            if let Some(value) = cases.get(&row.id) {
                row.fields
                    .insert(statement.column.clone(), Some(value.clone()));
            }
        }

        self.applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn row_count(&self) -> SyncResult<u64> {
        self.check_available()?;
        Ok(self.rows.lock().unwrap().len() as u64)
    }

    async fn columns(&self) -> SyncResult<Vec<ColumnInfo>> {
        self.check_available()?;
        let rows = self.rows.lock().unwrap();
        let mut columns = vec![ColumnInfo {
            name: self.table.id_column.clone(),
            type_name: "Int64".to_string(),
        }];
        if let Some(first) = rows.first() {
            columns.extend(first.fields.keys().map(|name| ColumnInfo {
                name: name.clone(),
                type_name: "Nullable(String)".to_string(),
            }));
        }
        Ok(columns)
    }

    async fn column_stats(&self, column: &str, top: usize) -> SyncResult<ColumnStats> {
        self.check_available()?;
        let rows = self.rows.lock().unwrap();

        let values: Vec<&str> = rows
            .iter()
            .filter_map(|r| r.fields.get(column).and_then(|v| v.as_deref()))
            .collect();
        let numbers: Vec<f64> = values.iter().filter_map(|v| v.parse().ok()).collect();

        let mut counts: HashMap<&str, u64> = HashMap::new();
        for value in &values {
            *counts.entry(*value).or_insert(0) += 1;
        }
        let mut top_values: Vec<(String, u64)> =
            counts.into_iter().map(|(v, n)| (v.to_string(), n)).collect();
        top_values.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        top_values.truncate(top);

        Ok(ColumnStats {
            column: column.to_string(),
            total_rows: rows.len() as u64,
            non_null: values.len() as u64,
            min: numbers.iter().copied().reduce(f64::min),
            max: numbers.iter().copied().reduce(f64::max),
            avg: (!numbers.is_empty()).then(|| numbers.iter().sum::<f64>() / numbers.len() as f64),
            top_values,
        })
    }
}
