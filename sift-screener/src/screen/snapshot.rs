//! Snapshot writer.
//!
//! Serializes a run's passing symbols into `screened_symbols_<run-id>.csv`.
//! The file is written under a temporary name and renamed into place, so a
//! failed run never leaves a partial snapshot where a consumer might read it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use super::config::ScreenPlan;
use super::engine::{ScreenResult, ScreenedSymbol};

/// Writes run snapshots as CSV files into one output directory.
pub struct SnapshotWriter {
    output_dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Snapshot file name for a run id.
    pub fn file_name(run_id: &str) -> String {
        format!("screened_symbols_{}.csv", run_id)
    }

    /// Write the snapshot for a completed run, returning the final path.
    pub fn write(&self, plan: &ScreenPlan, result: &ScreenResult) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Failed to create snapshot directory {}",
                self.output_dir.display()
            )
        })?;

        let file_name = Self::file_name(&result.id);
        let final_path = self.output_dir.join(&file_name);
        let tmp_path = self.output_dir.join(format!(".{}.tmp", file_name));

        if let Err(e) = write_csv(&tmp_path, plan, result) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        fs::rename(&tmp_path, &final_path)
            .with_context(|| format!("Failed to finalize snapshot {}", final_path.display()))?;

        info!(
            path = %final_path.display(),
            rows = result.rows.len(),
            "Snapshot written"
        );

        Ok(final_path)
    }
}

fn write_csv(path: &Path, plan: &ScreenPlan, result: &ScreenResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create snapshot file {}", path.display()))?;

    let columns = plan.column_names();

    let mut header = Vec::with_capacity(columns.len() + 1);
    header.push("symbol".to_string());
    header.extend(columns.iter().cloned());
    writer
        .write_record(&header)
        .context("Failed to write snapshot header")?;

    // Sorted rows keep back-to-back runs over unchanged data byte-identical
    let mut rows: Vec<&ScreenedSymbol> = result.rows.iter().collect();
    rows.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    for row in rows {
        let mut record = Vec::with_capacity(columns.len() + 1);
        record.push(row.symbol.clone());
        for column in &columns {
            // Values a row does not carry stay as empty cells
            record.push(
                row.values
                    .get(column)
                    .map(|value| value.to_string())
                    .unwrap_or_default(),
            );
        }
        writer
            .write_record(&record)
            .with_context(|| format!("Failed to write snapshot row for {}", row.symbol))?;
    }

    writer.flush().context("Failed to flush snapshot")?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
