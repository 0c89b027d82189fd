pub mod inspect;
pub mod update;
pub mod verify;

use anyhow::{Context, Result};
use colored::*;

use super::ReportArgs;
use crate::api::{ClickHouseChannel, TargetChannel};
use crate::config::Config;
use crate::services::report::{self, Report};

/// Open the target channel, fetching `extra_columns` with each row
pub async fn connect(config: &Config, extra_columns: &[String]) -> Result<ClickHouseChannel> {
    println!(
        "Connecting to {} ({})...",
        config.target.base_url().cyan(),
        config.target.table_ref()
    );

    let channel = ClickHouseChannel::connect(&config.target)
        .await
        .context("Failed to connect to ClickHouse")?;

    Ok(channel.with_select_columns(extra_columns.to_vec()))
}

/// Confirm the identifier column and, when given, the update column exist
pub async fn preflight(channel: &dyn TargetChannel, update_column: Option<&str>) -> Result<()> {
    let columns = channel
        .columns()
        .await
        .context("Failed to list target columns")?;
    let rows = channel
        .row_count()
        .await
        .context("Failed to count target rows")?;

    println!(
        "Target {}: {} rows, {} columns",
        channel.table().to_string().cyan(),
        rows,
        columns.len()
    );

    let has = |name: &str| columns.iter().any(|c| c.name == name);

    let id_column = &channel.table().id_column;
    if !has(id_column) {
        anyhow::bail!("Target table has no identifier column '{}'", id_column);
    }
    if let Some(column) = update_column {
        match columns.iter().find(|c| c.name == column) {
            Some(info) => println!("Update column {} ({})", column.cyan(), info.type_name),
            None => anyhow::bail!(
                "Target table has no column '{}'; add it before updating",
                column
            ),
        }
    }

    Ok(())
}

pub fn write_reports(report: &Report, args: &ReportArgs) -> Result<()> {
    if let Some(path) = &args.report_json {
        report.write_json(path)?;
        println!("Report saved to: {}", path.display().to_string().bright_green());
    }
    if let Some(path) = &args.report_xlsx {
        report::export_report_to_excel(report, path)?;
        println!("Workbook saved to: {}", path.display().to_string().bright_green());
    }
    Ok(())
}
