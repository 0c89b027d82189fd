// Reconciliation service: which source identifiers exist in the target
//
// Queries the channel in bounded chunks, never fetching the whole table,
// and reports matched / source-only / target-only sets plus duplicate rows.
// Thresholds are applied later by the reporter.

pub mod core;
pub mod models;

pub use self::core::compare_samples;
pub use models::{CoverageBasis, MatchSample, ReconciliationResult};

use std::collections::BTreeSet;

use crate::api::TargetChannel;
use crate::errors::SyncResult;

pub const DEFAULT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub chunk_size: usize,
    /// Coverage denominator; the requested identifiers when unset
    pub universe: Option<u64>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            universe: None,
        }
    }
}

/// Look up `source_ids` in the target, one chunk at a time
pub async fn reconcile(
    source_ids: &BTreeSet<i64>,
    channel: &dyn TargetChannel,
    options: &ReconcileOptions,
) -> SyncResult<ReconciliationResult> {
    let chunks = core::chunk_ids(source_ids, options.chunk_size);
    log::info!(
        "Looking up {} identifiers in {} ({} queries)",
        source_ids.len(),
        channel.table(),
        chunks.len()
    );

    let mut rows = Vec::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let returned = channel.query_rows(chunk).await?;
        log::debug!(
            "Chunk {}/{}: {} ids -> {} rows",
            i + 1,
            chunks.len(),
            chunk.len(),
            returned.len()
        );
        rows.extend(returned);
    }

    let result = core::compare(source_ids, rows, options.universe);

    log::info!(
        "Matched {}/{} identifiers, coverage {:.2}% ({})",
        result.matched.len(),
        result.requested,
        result.coverage * 100.0,
        result.basis.label()
    );
    if !result.duplicates.is_empty() {
        log::warn!(
            "{} identifiers occur on more than one target row",
            result.duplicates.len()
        );
    }

    Ok(result)
}
