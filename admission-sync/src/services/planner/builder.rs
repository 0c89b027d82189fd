use serde::Serialize;

use crate::api::{SqlValue, TableRef, UpdateStatement};
use crate::errors::{SyncError, SyncResult};
use crate::ingest::ValueMap;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// A contiguous slice of the mapping, applied as one statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateBatch {
    /// 1-based position in the plan
    pub number: usize,
    pub entries: Vec<(i64, SqlValue)>,
}

impl UpdateBatch {
    /// Rows carried by this batch
    pub fn size(&self) -> usize {
        self.entries.len()
    }
}

/// Ordered batches for one target column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdatePlan {
    pub table: TableRef,
    pub column: String,
    pub batch_size: usize,
    pub batches: Vec<UpdateBatch>,
}

impl UpdatePlan {
    pub fn total_entries(&self) -> usize {
        self.batches.iter().map(|b| b.size()).sum()
    }

    pub fn statements(&self) -> impl Iterator<Item = UpdateStatement> + '_ {
        self.batches.iter().map(|b| render(b, &self.table, &self.column))
    }
}

/// Partition `values` into batches of `batch_size`, keeping mapping order
pub fn plan(
    values: &ValueMap,
    table: &TableRef,
    column: &str,
    batch_size: usize,
) -> SyncResult<UpdatePlan> {
    if batch_size == 0 {
        return Err(SyncError::Configuration(
            "batch size must be at least 1".to_string(),
        ));
    }

    let batches: Vec<UpdateBatch> = values
        .entries()
        .chunks(batch_size)
        .enumerate()
        .map(|(i, chunk)| UpdateBatch {
            number: i + 1,
            entries: chunk.to_vec(),
        })
        .collect();

    log::info!(
        "Planned {} entries for {}.{} in {} batches of up to {}",
        values.len(),
        table,
        column,
        batches.len(),
        batch_size
    );

    Ok(UpdatePlan {
        table: table.clone(),
        column: column.to_string(),
        batch_size,
        batches,
    })
}

/// The conditional bulk update for one batch
pub fn render(batch: &UpdateBatch, table: &TableRef, column: &str) -> UpdateStatement {
    UpdateStatement {
        table: table.clone(),
        column: column.to_string(),
        assignments: batch.entries.clone(),
    }
}
