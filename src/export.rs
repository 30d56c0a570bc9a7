use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::AnalysisResult;

pub const RESULTS_PREFIX: &str = "company_analysis";
pub const VALIDATION_PREFIX: &str = "validation_report";

/// `<prefix>_YYYYMMDD_HHMMSS.json`
pub fn timestamped_file_name(prefix: &str, at: DateTime<Local>) -> String {
    format!("{}_{}.json", prefix, at.format("%Y%m%d_%H%M%S"))
}

pub fn results_file_name() -> String {
    timestamped_file_name(RESULTS_PREFIX, Local::now())
}

/// The download body: a JSON array of results.
pub fn results_to_json(results: &[AnalysisResult]) -> Result<String> {
    serde_json::to_string_pretty(results)
        .context("Failed to serialize analysis results")
}

pub fn export_results(results: &[AnalysisResult], output_dir: &Path) -> Result<PathBuf> {
    log::debug!(
        "Exporting {} results to {}",
        results.len(),
        output_dir.display()
    );

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let path = output_dir.join(results_file_name());
    fs::write(&path, results_to_json(results)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    log::info!("Exported {} results to {}", results.len(), path.display());
    Ok(path)
}
