use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::api::TargetRow;

/// What the coverage ratio is relative to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "size", rename_all = "snake_case")]
pub enum CoverageBasis {
    /// Caller-supplied universe size (e.g. all rows of the target table)
    Universe(u64),
    /// The identifiers that were looked up
    Requested(u64),
}

impl CoverageBasis {
    pub fn denominator(&self) -> u64 {
        match self {
            CoverageBasis::Universe(n) | CoverageBasis::Requested(n) => *n,
        }
    }

    pub fn label(&self) -> String {
        match self {
            CoverageBasis::Universe(n) => format!("universe of {}", n),
            CoverageBasis::Requested(n) => format!("{} requested ids", n),
        }
    }
}

/// Outcome of comparing source identifiers against the target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationResult {
    pub requested: usize,
    pub matched: BTreeSet<i64>,
    pub source_only: BTreeSet<i64>,
    /// Returned identifiers that were not requested. Empty for a well-behaved
    /// channel, kept to surface one that over-returns.
    pub target_only: BTreeSet<i64>,
    /// Identifiers returned more than once, with their row counts
    pub duplicates: BTreeMap<i64, usize>,
    pub coverage: f64,
    pub basis: CoverageBasis,
    /// Every returned row, in return order
    #[serde(skip)]
    pub rows: Vec<TargetRow>,
}

impl ReconciliationResult {
    /// First returned row for `id`
    pub fn row(&self, id: i64) -> Option<&TargetRow> {
        self.rows.iter().find(|r| r.id == id)
    }
}

/// Source record and target row side by side, for manual review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchSample {
    pub id: i64,
    pub source_college: String,
    pub source_major: String,
    pub source_value: Option<String>,
    pub target_fields: BTreeMap<String, Option<String>>,
}
