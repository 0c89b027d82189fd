//! Inspect command: dry look at the source and, optionally, the target

use anyhow::Result;
use clap::Args;
use colored::*;

use crate::cli::{SourceArgs, TargetArgs};
use crate::config::Config;
use crate::export::export_update_data;
use crate::services::pipeline::prepare_source;

#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Also check the target table is reachable and has the update column
    #[arg(long)]
    pub check_target: bool,

    /// Target column the values would be written to
    #[arg(long)]
    pub column: Option<String>,

    /// Write the cleaned mapping and a sample as CSV
    #[arg(long)]
    pub export: bool,

    /// Rows shown in the preview
    #[arg(long, default_value_t = 10)]
    pub preview: usize,
}

pub async fn handle_inspect_command(args: InspectArgs, mut config: Config) -> Result<bool> {
    args.source.apply(&mut config);
    args.target.apply(&mut config);
    if let Some(column) = &args.column {
        config.update.column = column.clone();
    }

    println!("Reading {}", args.source.file.display().to_string().cyan());
    let prepared = prepare_source(&args.source.file, &config.source, args.source.field)?;
    let shaped = &prepared.shaped;

    println!("  Header row:        {}", shaped.header_offset);
    println!("  Rows read:         {}", shaped.raw_rows);
    match &config.source.region {
        Some(region) => println!("  Rows in {}:       {}", region, shaped.filtered_rows),
        None => println!("  Rows kept:         {}", shaped.filtered_rows),
    }
    if shaped.coercion.dropped_rows > 0 {
        println!(
            "  Unparseable rows:  {}",
            shaped.coercion.dropped_rows.to_string().yellow()
        );
        for (column, count) in &shaped.coercion.dropped_by_column {
            println!("    {}: {}", column, count);
        }
    }
    if shaped.skipped_without_id > 0 {
        println!(
            "  Rows without id:   {}",
            shaped.skipped_without_id.to_string().yellow()
        );
    }
    println!("  Distinct ids:      {}", prepared.values.len().to_string().green());
    if !prepared.values.conflicts.is_empty() {
        println!(
            "  Conflicting ids:   {}",
            prepared.values.conflicts.len().to_string().yellow()
        );
    }

    println!();
    println!("{}", format!("First {} values:", args.preview).bold());
    for (id, value) in prepared.values.entries().iter().take(args.preview) {
        println!("  {} -> {}", id, value);
    }

    if args.export {
        let files = export_update_data(
            &shaped.records,
            &prepared.values,
            &config.update.column,
            &config.output.dir,
            &config.output.prefix,
            config.output.sample_rows,
        )?;
        println!();
        println!(
            "Mapping saved to: {} ({} rows)",
            files.data.display().to_string().bright_green(),
            files.rows
        );
        println!(
            "Sample saved to:  {}",
            files.sample.display().to_string().bright_green()
        );
    }

    if args.check_target {
        println!();
        let channel = super::connect(&config, &[]).await?;
        super::preflight(&channel, Some(&config.update.column)).await?;
    }

    Ok(true)
}
