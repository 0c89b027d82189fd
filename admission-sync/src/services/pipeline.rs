//! End-to-end run: source -> value map -> reconciliation -> update -> report

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};

use crate::api::TargetChannel;
use crate::config::SourceConfig;
use crate::errors::SyncResult;
use crate::ingest::{
    RecordFilter, ShapedSource, SourceOptions, ValueField, ValueMap, build_value_map, load_source,
    shape_records,
};
use crate::services::planner;
use crate::services::reconcile::{self, ReconcileOptions, ReconciliationResult};
use crate::services::report::{self, AcceptancePolicy, Report};

/// Most frequent values listed by the post-update check
const TOP_VALUES: usize = 10;

/// Source rows shaped and collapsed into the mapping to apply
#[derive(Debug, Clone)]
pub struct PreparedSource {
    pub shaped: ShapedSource,
    pub values: ValueMap,
    pub field: ValueField,
}

impl PreparedSource {
    /// Identifiers to look up; the first `sample` in source order when set
    pub fn lookup_ids(&self, sample: Option<usize>) -> BTreeSet<i64> {
        match sample {
            Some(n) => self.values.sample_ids(n),
            None => self.values.ids(),
        }
    }
}

/// Read, detect headers, filter and collapse the source file
pub fn prepare_source(path: &Path, config: &SourceConfig, field: ValueField) -> Result<PreparedSource> {
    let options = SourceOptions {
        sheet: config.sheet.clone(),
        header_offset: config.header_offset,
        ..SourceOptions::new(path)
    };

    let detected = load_source(&options, &config.column_spec())
        .with_context(|| format!("Failed to load source {}", path.display()))?;
    log::info!(
        "Header row {} with {} resolved columns, {} data rows",
        detected.header_offset,
        detected.columns.len(),
        detected.table.len()
    );

    let shaped = shape_records(
        &detected,
        &RecordFilter {
            region: config.region.clone(),
            value_field: Some(field),
        },
    )
    .context("Failed to shape source rows")?;

    let values = build_value_map(&shaped.records, field, config.duplicate_policy)
        .context("Failed to build the identifier mapping")?;

    log::info!(
        "{} records, {} distinct identifiers with a value",
        shaped.records.len(),
        values.len()
    );

    Ok(PreparedSource {
        shaped,
        values,
        field,
    })
}

/// Where the coverage denominator comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Universe {
    /// The identifiers looked up
    #[default]
    Requested,
    Fixed(u64),
    /// Row count of the target table
    TargetRows,
}

pub async fn resolve_universe(
    universe: Universe,
    channel: &dyn TargetChannel,
) -> SyncResult<Option<u64>> {
    match universe {
        Universe::Requested => Ok(None),
        Universe::Fixed(n) => Ok(Some(n)),
        Universe::TargetRows => channel.row_count().await.map(Some),
    }
}

/// Knobs for one run
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub column: String,
    pub batch_size: usize,
    pub chunk_size: usize,
    pub universe: Universe,
    pub sample: Option<usize>,
    /// Plan and execute the update; reconciliation only when false
    pub apply: bool,
    pub policy: AcceptancePolicy,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub result: ReconciliationResult,
    pub report: Report,
}

/// Reconcile, then (when `apply` is set and reconciliation passes the policy)
/// plan, execute and check the written column
pub async fn run(
    prepared: &PreparedSource,
    channel: &dyn TargetChannel,
    settings: &RunSettings,
) -> Result<RunOutcome> {
    let ids = prepared.lookup_ids(settings.sample);
    let universe = resolve_universe(settings.universe, channel)
        .await
        .context("Failed to determine the coverage universe")?;

    let result = reconcile::reconcile(
        &ids,
        channel,
        &ReconcileOptions {
            chunk_size: settings.chunk_size,
            universe,
        },
    )
    .await
    .context("Reconciliation failed")?;

    let admitted = !settings.apply || {
        let gate = report::admit(&result, &settings.policy);
        if !gate.passed {
            log::error!("Update skipped: {}", gate.reasons.join("; "));
        }
        gate.passed
    };

    let (plan, execution) = if settings.apply && admitted {
        let plan = planner::plan(
            &prepared.values,
            channel.table(),
            &settings.column,
            settings.batch_size,
        )?;
        let execution = planner::execute(&plan, channel).await;
        (Some(plan), Some(execution))
    } else {
        (None, None)
    };

    let mut report = report::summarize(&result, plan.as_ref(), execution.as_ref(), &settings.policy)
        .with_target(channel.table().to_string())
        .with_coercion(prepared.shaped.coercion.clone())
        .with_value_conflicts(prepared.values.conflicts.clone());

    if !admitted {
        report = report.with_update_skipped(settings.column.as_str());
    }

    if execution.is_some() {
        match channel.column_stats(&settings.column, TOP_VALUES).await {
            Ok(stats) => report = report.with_column_stats(stats),
            Err(e) => log::warn!("Post-update check of {} failed: {}", settings.column, e),
        }
    }

    Ok(RunOutcome { result, report })
}
