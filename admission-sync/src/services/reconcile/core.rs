//! Pure set computations behind reconciliation

use std::collections::{BTreeMap, BTreeSet};

use super::models::{CoverageBasis, MatchSample, ReconciliationResult};
use crate::api::TargetRow;
use crate::ingest::{AdmissionRecord, ValueField};

/// Ascending identifiers split into chunks of at most `size`
pub fn chunk_ids(ids: &BTreeSet<i64>, size: usize) -> Vec<Vec<i64>> {
    let sorted: Vec<i64> = ids.iter().copied().collect();
    sorted.chunks(size.max(1)).map(|c| c.to_vec()).collect()
}

/// Identifiers appearing on more than one row, with their counts
pub fn find_duplicates(rows: &[TargetRow]) -> BTreeMap<i64, usize> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for row in rows {
        *counts.entry(row.id).or_insert(0) += 1;
    }
    counts.retain(|_, count| *count > 1);
    counts
}

pub fn coverage_ratio(matched: usize, basis: CoverageBasis) -> f64 {
    match basis.denominator() {
        0 => 0.0,
        n => matched as f64 / n as f64,
    }
}

/// Compare requested identifiers with returned rows
pub fn compare(
    source_ids: &BTreeSet<i64>,
    rows: Vec<TargetRow>,
    universe: Option<u64>,
) -> ReconciliationResult {
    let target_ids: BTreeSet<i64> = rows.iter().map(|r| r.id).collect();

    let matched: BTreeSet<i64> = source_ids.intersection(&target_ids).copied().collect();
    let source_only: BTreeSet<i64> = source_ids.difference(&target_ids).copied().collect();
    let target_only: BTreeSet<i64> = target_ids.difference(source_ids).copied().collect();

    let basis = match universe {
        Some(n) => CoverageBasis::Universe(n),
        None => CoverageBasis::Requested(source_ids.len() as u64),
    };

    ReconciliationResult {
        requested: source_ids.len(),
        coverage: coverage_ratio(matched.len(), basis),
        duplicates: find_duplicates(&rows),
        matched,
        source_only,
        target_only,
        basis,
        rows,
    }
}

/// Up to `limit` matched records paired with their first target row
pub fn compare_samples(
    records: &[AdmissionRecord],
    result: &ReconciliationResult,
    field: ValueField,
    limit: usize,
) -> Vec<MatchSample> {
    let mut seen = BTreeSet::new();

    records
        .iter()
        .filter(|r| result.matched.contains(&r.id) && seen.insert(r.id))
        .take(limit)
        .filter_map(|record| {
            let row = result.row(record.id)?;
            Some(MatchSample {
                id: record.id,
                source_college: record.college_name.clone(),
                source_major: record.major_name.clone(),
                source_value: field.extract(record).map(|v| v.as_plain()),
                target_fields: row.fields.clone(),
            })
        })
        .collect()
}
