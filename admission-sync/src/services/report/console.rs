use colored::*;

use super::models::Report;
use crate::services::planner::BatchStatus;

/// Print the report as the final block of command output
pub fn print_report(report: &Report) {
    println!();
    println!("{}", "Reconciliation".bold().underline());
    if !report.target.is_empty() {
        println!("  Target:         {}", report.target.cyan());
    }
    println!("  Candidates:     {}", report.total_candidates);
    println!(
        "  Matched:        {} ({:.2}% of {})",
        report.matched.to_string().green(),
        report.coverage * 100.0,
        report.coverage_basis.label()
    );
    if report.source_only > 0 {
        println!("  Source only:    {}", report.source_only.to_string().yellow());
    }
    if report.target_only > 0 {
        println!("  Target only:    {}", report.target_only.to_string().yellow());
    }

    if report.duplicate_count > 0 {
        println!(
            "  Duplicate ids:  {}",
            report.duplicate_count.to_string().yellow()
        );
        for entry in &report.duplicate_preview {
            println!("    {} x{}", entry.id, entry.count);
        }
        let hidden = report.duplicate_count - report.duplicate_preview.len();
        if hidden > 0 {
            println!("    {}", format!("... and {} more", hidden).dimmed());
        }
    }

    if let Some(coercion) = report.coercion.as_ref().filter(|c| c.dropped_rows > 0) {
        println!(
            "  Dropped rows:   {} of {} (unparseable values)",
            coercion.dropped_rows.to_string().yellow(),
            coercion.input_rows
        );
    }

    if !report.value_conflicts.is_empty() {
        println!(
            "  Conflicting source values: {} ids (last value kept)",
            report.value_conflicts.len().to_string().yellow()
        );
    }

    if report.update_skipped {
        println!();
        println!("{}", "Update".bold().underline());
        if let Some(column) = &report.column {
            println!("  Column:         {}", column.cyan());
        }
        println!("  {}", "Skipped: nothing was written".red());
    }

    if report.batch_count > 0 {
        println!();
        println!("{}", "Update".bold().underline());
        if let Some(column) = &report.column {
            println!("  Column:         {}", column.cyan());
        }
        println!("  Batches:        {}", report.batch_count);
        println!("  Rows submitted: {}", report.success_count.to_string().green());
        println!(
            "  Rows matched:   {} (ids present in the target)",
            report.matched_submitted.to_string().green()
        );
        if report.failure_count > 0 {
            println!("  Rows failed:    {}", report.failure_count.to_string().red());
            for batch in &report.batches {
                if let BatchStatus::Failed { error, .. } = &batch.status {
                    println!(
                        "    batch {} (ids {}..{}): {}",
                        batch.number,
                        batch.first_id.unwrap_or_default(),
                        batch.last_id.unwrap_or_default(),
                        error.red()
                    );
                }
            }
        }
    }

    if let Some(stats) = &report.column_stats {
        println!();
        println!("{}", "After update".bold().underline());
        println!(
            "  {}:  {} of {} rows hold a value ({:.2}%)",
            stats.column.cyan(),
            stats.non_null.to_string().green(),
            stats.total_rows,
            stats.fill_ratio() * 100.0
        );
        if let (Some(min), Some(max), Some(avg)) = (stats.min, stats.max, stats.avg) {
            println!("  Range:          {} - {} (avg {:.1})", min, max, avg);
        }
        for (value, count) in &stats.top_values {
            println!("    {}: {}", value, count);
        }
    }

    println!();
    if report.verdict.passed {
        println!("{} {}", "Verdict:".bold(), report.verdict.label().green().bold());
    } else {
        println!("{} {}", "Verdict:".bold(), report.verdict.label().red().bold());
        for reason in &report.verdict.reasons {
            println!("  - {}", reason);
        }
    }
    println!("{}", format!("Run {}", report.run_id).dimmed());
}
