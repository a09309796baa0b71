//! Append-only set log.
//!
//! Logged sets are the system's fact record: what actually happened under
//! the bar. They append to a JSONL file with file locking and are never
//! rewritten in place.

use crate::types::LoggedSet;
use crate::Result;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Sink trait for persisting logged sets
pub trait SetSink {
    fn append(&mut self, set: &LoggedSet) -> Result<()>;
}

/// JSONL-based set sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a new JSONL sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl SetSink for JsonlSink {
    fn append(&mut self, set: &LoggedSet) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(set)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Appended set {} to set log", set.id);
        Ok(())
    }
}

/// Read all logged sets from a set log file
pub fn read_sets(path: &Path) -> Result<Vec<LoggedSet>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut sets = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<LoggedSet>(&line) {
            Ok(set) => sets.push(set),
            Err(e) => {
                tracing::warn!("Failed to parse set at line {}: {}", line_num + 1, e);
                // Continue reading, don't fail completely
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} sets from set log", sets.len());
    Ok(sets)
}
