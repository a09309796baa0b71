//! CSV rollup for archiving the set log.
//!
//! This module implements atomic log-to-CSV conversion with proper error
//! handling to prevent data loss.

use crate::types::LoggedSet;
use crate::Result;
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    user_id: String,
    session_id: String,
    prescription_id: String,
    lift_id: String,
    set_number: u32,
    weight: f64,
    target_reps: u32,
    reps_performed: u32,
    is_amrap: bool,
    rpe: Option<f64>,
    created_at: String,
}

impl From<&LoggedSet> for CsvRow {
    fn from(set: &LoggedSet) -> Self {
        CsvRow {
            id: set.id.to_string(),
            user_id: set.user_id.to_string(),
            session_id: set.session_id.to_string(),
            prescription_id: set.prescription_id.clone(),
            lift_id: set.lift_id.clone(),
            set_number: set.set_number,
            weight: set.weight,
            target_reps: set.target_reps,
            reps_performed: set.reps_performed,
            is_amrap: set.is_amrap,
            rpe: set.rpe,
            created_at: set.created_at.to_rfc3339(),
        }
    }
}

/// Roll up logged sets into CSV and archive the set log atomically
///
/// This function:
/// 1. Reads all sets from the log
/// 2. Appends them to the CSV file (creates with headers if needed)
/// 3. Syncs the CSV to disk
/// 4. Renames the log to .processed
/// 5. Returns the number of sets processed
///
/// # Safety
/// - CSV is fsynced before the log is renamed
/// - The log is renamed (not deleted) to allow manual recovery if needed
pub fn log_to_csv_and_archive(log_path: &Path, csv_path: &Path) -> Result<usize> {
    let sets = crate::setlog::read_sets(log_path)?;

    if sets.is_empty() {
        tracing::info!("No sets in the log to roll up");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    // Headers only when the file is brand new
    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for set in &sets {
        let row = CsvRow::from(set);
        writer.serialize(row)?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Wrote {} sets to CSV", sets.len());

    let processed_path = log_path.with_extension("jsonl.processed");
    std::fs::rename(log_path, &processed_path)?;

    tracing::info!("Archived set log to {:?}", processed_path);

    Ok(sets.len())
}

/// Clean up old processed set log files
///
/// This removes all .processed files in the given directory.
pub fn cleanup_processed_logs(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if let Some(extension) = path.extension() {
            if extension == "processed" {
                std::fs::remove_file(&path)?;
                tracing::debug!("Removed processed set log: {:?}", path);
                count += 1;
            }
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed set log files", count);
    }

    Ok(count)
}
