use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::ColumnStats;
use crate::ingest::CoercionReport;
use crate::ingest::record::ValueConflict;
use crate::services::planner::BatchOutcome;
use crate::services::reconcile::CoverageBasis;

/// Thresholds deciding the verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptancePolicy {
    pub min_coverage: f64,
    /// Failed rows tolerated before the run fails
    pub max_failures: usize,
    pub fail_on_duplicates: bool,
    /// Duplicate identifiers listed in the report
    pub duplicate_preview: usize,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self {
            min_coverage: 0.8,
            max_failures: 0,
            fail_on_duplicates: false,
            duplicate_preview: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub passed: bool,
    /// Why the run failed; empty on a pass
    pub reasons: Vec<String>,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        if self.passed { "PASS" } else { "FAIL" }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateEntry {
    pub id: i64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub target: String,
    pub column: Option<String>,

    pub total_candidates: usize,
    pub matched: usize,
    pub coverage: f64,
    pub coverage_basis: CoverageBasis,
    pub source_only: usize,
    pub target_only: usize,

    pub duplicate_count: usize,
    pub duplicate_preview: Vec<DuplicateEntry>,

    pub coercion: Option<CoercionReport>,
    pub value_conflicts: Vec<ValueConflict>,

    pub batch_count: usize,
    /// Rows in applied batches, whether or not the target holds the id
    pub success_count: usize,
    /// Of those, rows whose id reconciliation found in the target
    pub matched_submitted: usize,
    pub failure_count: usize,
    pub batches: Vec<BatchOutcome>,
    /// Reconciliation failed the policy, so nothing was written
    pub update_skipped: bool,
    /// What the update column holds after the run
    pub column_stats: Option<ColumnStats>,

    pub verdict: Verdict,
}
