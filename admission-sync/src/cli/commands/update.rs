//! Update command: reconcile, then write values in batches

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use dialoguer::Confirm;
use is_terminal::IsTerminal;

use crate::cli::{CoverageArgs, ReportArgs, SourceArgs, TargetArgs};
use crate::config::Config;
use crate::export::export_update_data;
use crate::services::pipeline::{self, RunSettings};
use crate::services::planner;
use crate::services::report::print_report;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub coverage: CoverageArgs,

    #[command(flatten)]
    pub reports: ReportArgs,

    /// Target column to write
    #[arg(long)]
    pub column: Option<String>,

    /// Rows per UPDATE statement
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Write the SQL scripts to this directory instead of executing
    #[arg(long)]
    pub emit_sql: Option<PathBuf>,

    /// Also write the cleaned mapping CSV and sample
    #[arg(long)]
    pub export: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

pub async fn handle_update_command(args: UpdateArgs, mut config: Config) -> Result<bool> {
    args.source.apply(&mut config);
    args.target.apply(&mut config);
    args.coverage.apply(&mut config);
    if let Some(column) = &args.column {
        config.update.column = column.clone();
    }
    if let Some(batch_size) = args.batch_size {
        config.update.batch_size = batch_size;
    }

    let prepared = pipeline::prepare_source(&args.source.file, &config.source, args.source.field)?;
    if prepared.values.is_empty() {
        anyhow::bail!("No source rows carry a value for {}", config.update.column);
    }
    println!(
        "Source: {} identifiers to write into {}",
        prepared.values.len().to_string().green(),
        config.update.column.cyan()
    );

    if args.export {
        let files = export_update_data(
            &prepared.shaped.records,
            &prepared.values,
            &config.update.column,
            &config.output.dir,
            &config.output.prefix,
            config.output.sample_rows,
        )?;
        println!(
            "Mapping saved to: {}",
            files.data.display().to_string().bright_green()
        );
    }

    if let Some(dir) = &args.emit_sql {
        let plan = planner::plan(
            &prepared.values,
            &config.target.table_ref(),
            &config.update.column,
            config.update.batch_size,
        )?;
        let written = planner::write_scripts(&plan, dir)?;
        println!(
            "Wrote {} batch scripts and update_all.sql to {}",
            written.len().saturating_sub(1),
            dir.display().to_string().bright_green()
        );
        return Ok(true);
    }

    let channel = super::connect(&config, &[]).await?;
    super::preflight(&channel, Some(&config.update.column)).await?;

    if !args.yes && std::io::stdin().is_terminal() {
        let batches = prepared.values.len().div_ceil(config.update.batch_size.max(1));
        let proceed = Confirm::new()
            .with_prompt(format!(
                "Update {} rows of {}.{} in {} batches?",
                prepared.values.len(),
                config.target.table_ref(),
                config.update.column,
                batches
            ))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;

        if !proceed {
            println!("{}", "Update cancelled".yellow());
            return Ok(false);
        }
    }

    let settings = RunSettings {
        column: config.update.column.clone(),
        batch_size: config.update.batch_size,
        chunk_size: config.update.query_chunk_size,
        universe: args.coverage.universe(),
        sample: args.coverage.sample,
        apply: true,
        policy: config.acceptance.clone(),
    };
    let outcome = pipeline::run(&prepared, &channel, &settings).await?;

    print_report(&outcome.report);
    super::write_reports(&outcome.report, &args.reports)?;

    Ok(outcome.report.verdict.passed)
}
