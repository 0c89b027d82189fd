//! Verify command: reconciliation only, no writes

use anyhow::Result;
use clap::Args;
use colored::*;

use crate::cli::{CoverageArgs, ReportArgs, SourceArgs, TargetArgs};
use crate::config::Config;
use crate::services::pipeline::{self, RunSettings};
use crate::services::reconcile::{MatchSample, compare_samples};
use crate::services::report::print_report;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub coverage: CoverageArgs,

    #[command(flatten)]
    pub reports: ReportArgs,

    /// Show N matched rows side by side with the target
    #[arg(long, default_value_t = 5)]
    pub show_samples: usize,
}

pub async fn handle_verify_command(args: VerifyArgs, mut config: Config) -> Result<bool> {
    args.source.apply(&mut config);
    args.target.apply(&mut config);
    args.coverage.apply(&mut config);

    let prepared = pipeline::prepare_source(&args.source.file, &config.source, args.source.field)?;
    println!(
        "Source: {} identifiers with a value",
        prepared.values.len().to_string().green()
    );

    let channel = super::connect(&config, &config.target.compare_columns).await?;

    let settings = RunSettings {
        column: config.update.column.clone(),
        batch_size: config.update.batch_size,
        chunk_size: config.update.query_chunk_size,
        universe: args.coverage.universe(),
        sample: args.coverage.sample,
        apply: false,
        policy: config.acceptance.clone(),
    };
    let outcome = pipeline::run(&prepared, &channel, &settings).await?;

    let samples = compare_samples(
        &prepared.shaped.records,
        &outcome.result,
        prepared.field,
        args.show_samples,
    );
    print_samples(&samples);

    print_report(&outcome.report);
    super::write_reports(&outcome.report, &args.reports)?;

    Ok(outcome.report.verdict.passed)
}

fn print_samples(samples: &[MatchSample]) {
    if samples.is_empty() {
        return;
    }

    println!();
    println!("{}", "Matched samples".bold().underline());
    for sample in samples {
        println!(
            "  {} {} / {} = {}",
            sample.id.to_string().cyan(),
            sample.source_college,
            sample.source_major,
            sample.source_value.as_deref().unwrap_or("-")
        );
        let target: Vec<String> = sample
            .target_fields
            .iter()
            .map(|(name, value)| format!("{}={}", name, value.as_deref().unwrap_or("NULL")))
            .collect();
        println!("    {}", target.join(", ").dimmed());
    }
}
