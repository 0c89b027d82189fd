//! Excel rendering of a run report
//!
//! Sheets: Summary, Duplicates, Batches, and Conflicts when the source had
//! conflicting values.

use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::*;

use super::models::Report;
use crate::services::planner::BatchStatus;

pub fn export_report_to_excel(report: &Report, file_path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();

    create_summary_sheet(&mut workbook, report)?;
    create_duplicates_sheet(&mut workbook, report)?;
    create_batches_sheet(&mut workbook, report)?;
    if !report.value_conflicts.is_empty() {
        create_conflicts_sheet(&mut workbook, report)?;
    }

    workbook
        .save(file_path)
        .with_context(|| format!("Failed to save Excel file: {}", file_path.display()))?;

    log::info!("Report exported to: {}", file_path.display());
    Ok(())
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0x4472C4))
        .set_font_color(Color::White)
}

fn write_headers(sheet: &mut Worksheet, headers: &[&str]) -> Result<()> {
    let format = header_format();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &format)?;
    }
    Ok(())
}

fn create_summary_sheet(workbook: &mut Workbook, report: &Report) -> Result<()> {
    let sheet = workbook.add_worksheet();
    sheet.set_name("Summary")?;

    let title_format = Format::new().set_bold().set_font_size(16);
    let bold_format = Format::new().set_bold();
    let percent_format = Format::new().set_num_format("0.00%");
    let verdict_format = if report.verdict.passed {
        Format::new().set_bold().set_font_color(Color::Green)
    } else {
        Format::new().set_bold().set_font_color(Color::Red)
    };

    sheet.write_string_with_format(
        0,
        0,
        &format!("Admission Sync Report: {}", report.target),
        &title_format,
    )?;

    let mut row = 2u32;

    sheet.write_string_with_format(row, 0, "Run ID", &bold_format)?;
    sheet.write_string(row, 1, report.run_id.to_string())?;
    row += 1;

    sheet.write_string_with_format(row, 0, "Generated", &bold_format)?;
    sheet.write_string(
        row,
        1,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )?;
    row += 1;

    if let Some(column) = &report.column {
        sheet.write_string_with_format(row, 0, "Column", &bold_format)?;
        sheet.write_string(row, 1, column)?;
        row += 1;
    }

    sheet.write_string_with_format(row, 0, "Verdict", &bold_format)?;
    sheet.write_string_with_format(row, 1, report.verdict.label(), &verdict_format)?;
    row += 1;
    for reason in &report.verdict.reasons {
        sheet.write_string(row, 1, reason)?;
        row += 1;
    }
    row += 1;

    let counts = [
        ("Candidates", report.total_candidates),
        ("Matched", report.matched),
        ("Source only", report.source_only),
        ("Target only", report.target_only),
        ("Duplicate ids", report.duplicate_count),
        ("Batches", report.batch_count),
        ("Rows submitted", report.success_count),
        ("Rows matched in target", report.matched_submitted),
        ("Rows failed", report.failure_count),
    ];
    for (name, value) in counts {
        sheet.write_string_with_format(row, 0, name, &bold_format)?;
        sheet.write_number(row, 1, value as f64)?;
        row += 1;
    }

    sheet.write_string_with_format(row, 0, "Coverage", &bold_format)?;
    sheet.write_number_with_format(row, 1, report.coverage, &percent_format)?;
    row += 1;
    sheet.write_string_with_format(row, 0, "Coverage basis", &bold_format)?;
    sheet.write_string(row, 1, report.coverage_basis.label())?;
    row += 1;

    if report.update_skipped {
        sheet.write_string_with_format(row, 0, "Update", &bold_format)?;
        sheet.write_string(row, 1, "skipped")?;
        row += 1;
    }

    if let Some(stats) = &report.column_stats {
        sheet.write_string_with_format(row, 0, "Rows with value after update", &bold_format)?;
        sheet.write_number(row, 1, stats.non_null as f64)?;
        row += 1;
        sheet.write_string_with_format(row, 0, "Table rows", &bold_format)?;
        sheet.write_number(row, 1, stats.total_rows as f64)?;
        row += 1;
        sheet.write_string_with_format(row, 0, "Fill rate", &bold_format)?;
        sheet.write_number_with_format(row, 1, stats.fill_ratio(), &percent_format)?;
        row += 1;
        let aggregates = [("Min", stats.min), ("Max", stats.max), ("Average", stats.avg)];
        for (name, value) in aggregates {
            if let Some(value) = value {
                sheet.write_string_with_format(row, 0, name, &bold_format)?;
                sheet.write_number(row, 1, value)?;
                row += 1;
            }
        }
        for (value, count) in &stats.top_values {
            sheet.write_string(row, 0, format!("  {}", value))?;
            sheet.write_number(row, 1, *count as f64)?;
            row += 1;
        }
    }

    if let Some(coercion) = &report.coercion {
        sheet.write_string_with_format(row, 0, "Rows dropped (unparseable)", &bold_format)?;
        sheet.write_number(row, 1, coercion.dropped_rows as f64)?;
        row += 1;
        for (column, count) in &coercion.dropped_by_column {
            sheet.write_string(row, 0, format!("  {}", column))?;
            sheet.write_number(row, 1, *count as f64)?;
            row += 1;
        }
    }

    sheet.autofit();
    Ok(())
}

fn create_duplicates_sheet(workbook: &mut Workbook, report: &Report) -> Result<()> {
    let sheet = workbook.add_worksheet();
    sheet.set_name("Duplicates")?;
    write_headers(sheet, &["ID", "Rows"])?;

    for (i, entry) in report.duplicate_preview.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_number(row, 0, entry.id as f64)?;
        sheet.write_number(row, 1, entry.count as f64)?;
    }

    if report.duplicate_count > report.duplicate_preview.len() {
        let row = report.duplicate_preview.len() as u32 + 2;
        sheet.write_string(
            row,
            0,
            format!(
                "... and {} more",
                report.duplicate_count - report.duplicate_preview.len()
            ),
        )?;
    }

    sheet.autofit();
    Ok(())
}

fn create_batches_sheet(workbook: &mut Workbook, report: &Report) -> Result<()> {
    let sheet = workbook.add_worksheet();
    sheet.set_name("Batches")?;
    write_headers(sheet, &["Batch", "Rows", "First ID", "Last ID", "Status", "Error"])?;

    let failed_format = Format::new().set_font_color(Color::Red);

    for (i, batch) in report.batches.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_number(row, 0, batch.number as f64)?;
        sheet.write_number(row, 1, batch.size as f64)?;
        if let Some(first) = batch.first_id {
            sheet.write_number(row, 2, first as f64)?;
        }
        if let Some(last) = batch.last_id {
            sheet.write_number(row, 3, last as f64)?;
        }
        match &batch.status {
            BatchStatus::Applied => {
                sheet.write_string(row, 4, "applied")?;
            }
            BatchStatus::Failed { error, .. } => {
                sheet.write_string_with_format(row, 4, "failed", &failed_format)?;
                sheet.write_string(row, 5, error)?;
            }
        }
    }

    sheet.autofit();
    Ok(())
}

fn create_conflicts_sheet(workbook: &mut Workbook, report: &Report) -> Result<()> {
    let sheet = workbook.add_worksheet();
    sheet.set_name("Conflicts")?;
    write_headers(sheet, &["ID", "Kept", "Discarded"])?;

    for (i, conflict) in report.value_conflicts.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_number(row, 0, conflict.id as f64)?;
        sheet.write_string(row, 1, conflict.kept.as_plain())?;
        let discarded: Vec<String> = conflict.discarded.iter().map(|v| v.as_plain()).collect();
        sheet.write_string(row, 2, discarded.join(", "))?;
    }

    sheet.autofit();
    Ok(())
}
