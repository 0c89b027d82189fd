// Run report: counts, coverage, batch tallies and the pass/fail verdict
//
// `summarize` builds the report from the reconciliation and execution
// results. Writing it out (JSON, Excel, console) never feeds back into a
// later run.

pub mod console;
pub mod excel;
pub mod models;

pub use console::print_report;
pub use excel::export_report_to_excel;
pub use models::{AcceptancePolicy, DuplicateEntry, Report, Verdict};

use std::path::Path;

use anyhow::{Context, Result};

use crate::api::ColumnStats;
use crate::ingest::CoercionReport;
use crate::ingest::record::ValueConflict;
use crate::services::planner::{BatchStatus, ExecutionOutcome, UpdatePlan};
use crate::services::reconcile::ReconciliationResult;

/// Build the report and decide the verdict
pub fn summarize(
    result: &ReconciliationResult,
    plan: Option<&UpdatePlan>,
    outcome: Option<&ExecutionOutcome>,
    policy: &AcceptancePolicy,
) -> Report {
    let mut duplicates: Vec<DuplicateEntry> = result
        .duplicates
        .iter()
        .map(|(id, count)| DuplicateEntry {
            id: *id,
            count: *count,
        })
        .collect();
    duplicates.sort_by(|a, b| b.count.cmp(&a.count).then(a.id.cmp(&b.id)));
    duplicates.truncate(policy.duplicate_preview);

    let (success_count, failure_count, batches) = match outcome {
        Some(o) => (o.success_count, o.failure_count, o.batches.clone()),
        None => (0, 0, Vec::new()),
    };

    let matched_submitted = match (plan, outcome) {
        (Some(plan), Some(outcome)) => plan
            .batches
            .iter()
            .zip(&outcome.batches)
            .filter(|(_, done)| done.status == BatchStatus::Applied)
            .flat_map(|(batch, _)| batch.entries.iter())
            .filter(|(id, _)| result.matched.contains(id))
            .count(),
        _ => 0,
    };

    let verdict = decide(
        result.coverage,
        failure_count,
        result.duplicates.len(),
        policy,
    );

    Report {
        run_id: uuid::Uuid::new_v4(),
        generated_at: chrono::Utc::now(),
        target: plan
            .map(|p| p.table.to_string())
            .unwrap_or_default(),
        column: plan.map(|p| p.column.clone()),
        total_candidates: result.requested,
        matched: result.matched.len(),
        coverage: result.coverage,
        coverage_basis: result.basis,
        source_only: result.source_only.len(),
        target_only: result.target_only.len(),
        duplicate_count: result.duplicates.len(),
        duplicate_preview: duplicates,
        coercion: None,
        value_conflicts: Vec::new(),
        batch_count: plan.map(|p| p.batches.len()).unwrap_or(0),
        success_count,
        matched_submitted,
        failure_count,
        batches,
        update_skipped: false,
        column_stats: None,
        verdict,
    }
}

/// Checks that depend only on reconciliation. An update must not start
/// unless these pass.
pub fn admit(result: &ReconciliationResult, policy: &AcceptancePolicy) -> Verdict {
    let reasons = reconciliation_reasons(result.coverage, result.duplicates.len(), policy);
    Verdict {
        passed: reasons.is_empty(),
        reasons,
    }
}

fn reconciliation_reasons(
    coverage: f64,
    duplicate_count: usize,
    policy: &AcceptancePolicy,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if coverage < policy.min_coverage {
        reasons.push(format!(
            "coverage {:.2}% is below the required {:.2}%",
            coverage * 100.0,
            policy.min_coverage * 100.0
        ));
    }
    if policy.fail_on_duplicates && duplicate_count > 0 {
        reasons.push(format!(
            "{} identifiers occur on more than one target row",
            duplicate_count
        ));
    }

    reasons
}

fn decide(
    coverage: f64,
    failure_count: usize,
    duplicate_count: usize,
    policy: &AcceptancePolicy,
) -> Verdict {
    let mut reasons = reconciliation_reasons(coverage, duplicate_count, policy);

    if failure_count > policy.max_failures {
        reasons.push(format!(
            "{} rows failed to update (allowed: {})",
            failure_count, policy.max_failures
        ));
    }

    Verdict {
        passed: reasons.is_empty(),
        reasons,
    }
}

impl Report {
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_coercion(mut self, coercion: CoercionReport) -> Self {
        self.coercion = Some(coercion);
        self
    }

    pub fn with_value_conflicts(mut self, conflicts: Vec<ValueConflict>) -> Self {
        self.value_conflicts = conflicts;
        self
    }

    /// Mark the update as not attempted; the run fails
    pub fn with_update_skipped(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self.update_skipped = true;
        self.verdict.passed = false;
        self.verdict
            .reasons
            .push("update skipped: reconciliation did not meet the acceptance policy".to_string());
        self
    }

    pub fn with_column_stats(mut self, stats: ColumnStats) -> Self {
        self.column_stats = Some(stats);
        self
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        log::info!("Report written to: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::MemoryChannel;
    use crate::api::{SqlValue, TargetChannel, TargetRow};
    use crate::ingest::ValueMap;
    use crate::services::planner::{execute, plan};
    use crate::services::reconcile::core::compare;
    use std::collections::BTreeSet;

    fn ids(range: std::ops::RangeInclusive<i64>) -> BTreeSet<i64> {
        range.collect()
    }

    fn rows(range: std::ops::RangeInclusive<i64>) -> Vec<TargetRow> {
        range.map(TargetRow::new).collect()
    }

    #[test]
    fn test_pass_on_full_coverage() {
        let result = compare(&ids(1..=10), rows(1..=10), None);
        let report = summarize(&result, None, None, &AcceptancePolicy::default());

        assert!(report.verdict.passed);
        assert!(report.verdict.reasons.is_empty());
        assert_eq!(report.matched, 10);
        assert_eq!(report.batch_count, 0);
    }

    #[test]
    fn test_fail_on_low_coverage() {
        let result = compare(&ids(1..=10), rows(1..=7), None);
        let report = summarize(&result, None, None, &AcceptancePolicy::default());

        assert!(!report.verdict.passed);
        assert_eq!(report.verdict.reasons.len(), 1);
        assert!(report.verdict.reasons[0].contains("70.00%"));
    }

    #[test]
    fn test_coverage_at_threshold_passes() {
        let result = compare(&ids(1..=10), rows(1..=8), None);
        let report = summarize(&result, None, None, &AcceptancePolicy::default());
        assert!(report.verdict.passed);
    }

    #[test]
    fn test_duplicates_only_fail_when_asked() {
        let mut target = rows(1..=5);
        target.extend(rows(1..=3));
        target.push(TargetRow::new(1));
        let result = compare(&ids(1..=5), target, None);

        let lenient = summarize(&result, None, None, &AcceptancePolicy::default());
        assert!(lenient.verdict.passed);
        assert_eq!(lenient.duplicate_count, 3);
        assert_eq!(lenient.duplicate_preview[0], DuplicateEntry { id: 1, count: 3 });

        let strict = AcceptancePolicy {
            fail_on_duplicates: true,
            duplicate_preview: 2,
            ..AcceptancePolicy::default()
        };
        let report = summarize(&result, None, None, &strict);
        assert!(!report.verdict.passed);
        assert_eq!(report.duplicate_preview.len(), 2);
    }

    #[test]
    fn test_admit_checks_coverage_and_duplicates() {
        let low = compare(&ids(1..=10), rows(1..=7), None);
        let gate = admit(&low, &AcceptancePolicy::default());
        assert!(!gate.passed);
        assert_eq!(gate.reasons.len(), 1);

        let mut target = rows(1..=10);
        target.push(TargetRow::new(4));
        let duplicated = compare(&ids(1..=10), target, None);
        assert!(admit(&duplicated, &AcceptancePolicy::default()).passed);

        let strict = AcceptancePolicy {
            fail_on_duplicates: true,
            ..AcceptancePolicy::default()
        };
        assert!(!admit(&duplicated, &strict).passed);
    }

    #[test]
    fn test_skipped_update_fails_the_run() {
        let result = compare(&ids(1..=10), rows(1..=9), None);
        let report = summarize(&result, None, None, &AcceptancePolicy::default())
            .with_update_skipped("major_min_score_2024");

        assert!(report.update_skipped);
        assert!(!report.verdict.passed);
        assert_eq!(report.column.as_deref(), Some("major_min_score_2024"));
        assert!(report.verdict.reasons[0].starts_with("update skipped"));
    }

    #[tokio::test]
    async fn test_failed_batches_fail_the_run() {
        let channel = MemoryChannel::with_ids(1..=20, "score", None);
        channel.reject_ids([3]);
        let values =
            ValueMap::from_entries((1..=20).map(|id| (id, SqlValue::Int(id))).collect());
        let plan = plan(&values, channel.table(), "score", 10).unwrap();
        let outcome = execute(&plan, &channel).await;
        let result = compare(&values.ids(), channel.snapshot(), None);

        let report = summarize(&result, Some(&plan), Some(&outcome), &AcceptancePolicy::default());
        assert!(!report.verdict.passed);
        assert_eq!(report.failure_count, 10);
        assert_eq!(report.success_count, 10);
        assert_eq!(report.batch_count, 2);
        assert_eq!(report.target, "gaokao.admission_test");

        let tolerant = AcceptancePolicy {
            max_failures: 10,
            ..AcceptancePolicy::default()
        };
        assert!(summarize(&result, Some(&plan), Some(&outcome), &tolerant).verdict.passed);
    }

    #[tokio::test]
    async fn test_matched_rows_counted_apart_from_submitted() {
        let channel = MemoryChannel::with_ids(1..=6, "score", None);
        let values =
            ValueMap::from_entries((1..=10).map(|id| (id, SqlValue::Int(id))).collect());
        let result = compare(&values.ids(), channel.snapshot(), None);
        let plan = plan(&values, channel.table(), "score", 4).unwrap();
        let outcome = execute(&plan, &channel).await;

        let report = summarize(&result, Some(&plan), Some(&outcome), &AcceptancePolicy::default());
        assert_eq!(report.success_count, 10);
        assert_eq!(report.matched_submitted, 6);

        channel.reject_ids([5]);
        let outcome = execute(&plan, &channel).await;
        let report = summarize(&result, Some(&plan), Some(&outcome), &AcceptancePolicy::default());
        assert_eq!(report.success_count, 6);
        assert_eq!(report.matched_submitted, 4);
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let result = compare(&ids(1..=3), rows(1..=2), Some(2));
        let report = summarize(&result, None, None, &AcceptancePolicy::default())
            .with_coercion(CoercionReport {
                input_rows: 4,
                dropped_rows: 1,
                ..CoercionReport::default()
            })
            .with_column_stats(ColumnStats {
                column: "major_min_score_2024".to_string(),
                total_rows: 3,
                non_null: 2,
                min: Some(540.0),
                max: Some(612.0),
                avg: Some(576.0),
                top_values: vec![("540".to_string(), 1), ("612".to_string(), 1)],
            });

        report.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["coverage"], 1.0);
        assert_eq!(value["coverage_basis"]["kind"], "universe");
        assert_eq!(value["coercion"]["dropped_rows"], 1);
        assert_eq!(value["verdict"]["passed"], true);
        assert_eq!(value["update_skipped"], false);
        assert_eq!(value["column_stats"]["non_null"], 2);
        assert_eq!(value["column_stats"]["top_values"][0][0], "540");
    }
}
