use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::builder::UpdatePlan;

/// Write `update_batch_<n>.sql` per batch plus `update_all.sql`, for review or
/// manual application. Returns the written paths, combined script last.
pub fn write_scripts(plan: &UpdatePlan, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create script directory {}", dir.display()))?;

    let mut written = Vec::with_capacity(plan.batches.len() + 1);
    let mut combined = format!(
        "-- {} rows into {}.{} in {} batches\n\n",
        plan.total_entries(),
        plan.table,
        plan.column,
        plan.batches.len()
    );

    for (batch, statement) in plan.batches.iter().zip(plan.statements()) {
        let sql = format!("{};\n", statement.to_sql());
        let path = dir.join(format!("update_batch_{}.sql", batch.number));
        fs::write(&path, &sql)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        combined.push_str(&format!("-- batch {} ({} rows)\n{}\n", batch.number, batch.size(), sql));
        written.push(path);
    }

    let all_path = dir.join("update_all.sql");
    fs::write(&all_path, combined)
        .with_context(|| format!("Failed to write {}", all_path.display()))?;
    written.push(all_path);

    log::info!("Wrote {} SQL scripts to {}", written.len(), dir.display());
    Ok(written)
}
