use serde::Serialize;

use super::builder::UpdatePlan;
use crate::api::TargetChannel;

/// Batches between progress log lines
const PROGRESS_EVERY: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    Applied,
    Failed { error: String, unavailable: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub number: usize,
    pub size: usize,
    pub first_id: Option<i64>,
    pub last_id: Option<i64>,
    #[serde(flatten)]
    pub status: BatchStatus,
}

/// Row tallies plus the per-batch record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub success_count: usize,
    pub failure_count: usize,
    pub batches: Vec<BatchOutcome>,
}

/// Apply every batch in order. A failed batch is recorded and skipped; there
/// is no retry and no rollback of earlier batches.
pub async fn execute(plan: &UpdatePlan, channel: &dyn TargetChannel) -> ExecutionOutcome {
    let total = plan.batches.len();
    let mut outcome = ExecutionOutcome::default();

    for (batch, statement) in plan.batches.iter().zip(plan.statements()) {
        let status = match channel.apply(&statement).await {
            Ok(()) => {
                outcome.success_count += batch.size();
                BatchStatus::Applied
            }
            Err(e) => {
                log::error!("Batch {}/{} failed: {}", batch.number, total, e);
                outcome.failure_count += batch.size();
                BatchStatus::Failed {
                    unavailable: e.is_unavailable(),
                    error: e.to_string(),
                }
            }
        };

        outcome.batches.push(BatchOutcome {
            number: batch.number,
            size: batch.size(),
            first_id: batch.entries.first().map(|(id, _)| *id),
            last_id: batch.entries.last().map(|(id, _)| *id),
            status,
        });

        if batch.number % PROGRESS_EVERY == 0 || batch.number == total {
            log::info!(
                "Progress: {}/{} batches, {} rows applied, {} failed",
                batch.number,
                total,
                outcome.success_count,
                outcome.failure_count
            );
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::MemoryChannel;
    use crate::api::{SqlValue, TargetChannel};
    use crate::ingest::ValueMap;
    use crate::services::planner::plan;

    const COLUMN: &str = "major_min_score_2024";

    fn scores(ids: std::ops::RangeInclusive<i64>) -> ValueMap {
        ValueMap::from_entries(ids.map(|id| (id, SqlValue::Int(600 - id))).collect())
    }

    #[tokio::test]
    async fn test_applies_every_batch() {
        let channel = MemoryChannel::with_ids(1..=25, COLUMN, None);
        let plan = plan(&scores(1..=25), channel.table(), COLUMN, 10).unwrap();

        let outcome = execute(&plan, &channel).await;

        assert_eq!(outcome.success_count, 25);
        assert_eq!(outcome.failure_count, 0);
        assert_eq!(outcome.batches.len(), 3);
        assert_eq!(channel.applied_count(), 3);
        assert_eq!(channel.value_of(7, COLUMN).as_deref(), Some("593"));
    }

    #[tokio::test]
    async fn test_continues_past_failed_batch() {
        let channel = MemoryChannel::with_ids(1..=30, COLUMN, None);
        channel.reject_ids([15]);
        let plan = plan(&scores(1..=30), channel.table(), COLUMN, 10).unwrap();

        let outcome = execute(&plan, &channel).await;

        assert_eq!(outcome.success_count, 20);
        assert_eq!(outcome.failure_count, 10);
        let failed: Vec<usize> = outcome
            .batches
            .iter()
            .filter(|b| b.status != BatchStatus::Applied)
            .map(|b| b.number)
            .collect();
        assert_eq!(failed, vec![2]);
        assert_eq!(outcome.batches[1].first_id, Some(11));
        assert!(matches!(
            &outcome.batches[1].status,
            BatchStatus::Failed { unavailable: false, .. }
        ));
        // batch 3 still ran
        assert_eq!(channel.value_of(25, COLUMN).as_deref(), Some("575"));
        assert_eq!(channel.value_of(15, COLUMN), None);
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let channel = MemoryChannel::with_ids(1..=12, COLUMN, Some("0"));
        let plan = plan(&scores(1..=12), channel.table(), COLUMN, 5).unwrap();

        let first = execute(&plan, &channel).await;
        let after_first = channel.snapshot();
        let second = execute(&plan, &channel).await;

        assert_eq!(first.failure_count, 0);
        assert_eq!(second.failure_count, 0);
        assert_eq!(second.success_count, 12);
        assert_eq!(channel.snapshot(), after_first);
    }

    #[tokio::test]
    async fn test_rows_outside_plan_untouched() {
        let channel = MemoryChannel::with_ids(1..=5, COLUMN, Some("1"));
        let plan = plan(&scores(1..=2), channel.table(), COLUMN, 1000).unwrap();

        execute(&plan, &channel).await;

        assert_eq!(channel.value_of(1, COLUMN).as_deref(), Some("599"));
        assert_eq!(channel.value_of(5, COLUMN).as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_unavailable_target_recorded_per_batch() {
        let channel = MemoryChannel::with_ids(1..=4, COLUMN, None);
        channel.set_unavailable(true);
        let plan = plan(&scores(1..=4), channel.table(), COLUMN, 2).unwrap();

        let outcome = execute(&plan, &channel).await;

        assert_eq!(outcome.failure_count, 4);
        assert!(outcome.batches.iter().all(|b| matches!(
            b.status,
            BatchStatus::Failed { unavailable: true, .. }
        )));
    }
}
