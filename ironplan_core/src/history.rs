//! Logged-set history loading and session-scoped lookup.
//!
//! Merges the active set log with the CSV archive, deduplicating by set
//! id, and provides the session lookup used by relative-load resolution.

use crate::load::SessionLookup;
use crate::types::LoggedSet;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

/// CSV row format for reading archived sets
#[derive(Debug, Deserialize)]
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

impl TryFrom<CsvRow> for LoggedSet {
    type Error = crate::Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let parse_uuid = |s: &str| {
            Uuid::parse_str(s).map_err(|e| crate::Error::State(format!("Invalid UUID: {}", e)))
        };

        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| crate::Error::State(format!("Invalid date: {}", e)))?
            .with_timezone(&Utc);

        Ok(LoggedSet {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            session_id: parse_uuid(&row.session_id)?,
            prescription_id: row.prescription_id,
            lift_id: row.lift_id,
            set_number: row.set_number,
            weight: row.weight,
            target_reps: row.target_reps,
            reps_performed: row.reps_performed,
            is_amrap: row.is_amrap,
            rpe: row.rpe,
            created_at,
        })
    }
}

/// Load sets from the last N days from both the set log and the CSV
///
/// Returns sets sorted by created_at (newest first). Deduplicates sets
/// that appear in both places.
pub fn load_recent_sets(log_path: &Path, csv_path: &Path, days: i64) -> Result<Vec<LoggedSet>> {
    let cutoff = Utc::now() - Duration::days(days);
    let mut sets = Vec::new();
    let mut seen_ids = HashSet::new();

    if log_path.exists() {
        for set in crate::setlog::read_sets(log_path)? {
            if set.created_at >= cutoff {
                seen_ids.insert(set.id);
                sets.push(set);
            }
        }
        tracing::debug!("Loaded {} sets from the set log", sets.len());
    }

    if csv_path.exists() {
        let archived = load_sets_from_csv(csv_path)?;
        let mut csv_count = 0;
        for set in archived {
            if set.created_at >= cutoff && !seen_ids.contains(&set.id) {
                seen_ids.insert(set.id);
                sets.push(set);
                csv_count += 1;
            }
        }
        tracing::debug!("Loaded {} sets from CSV", csv_count);
    }

    sets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(sets)
}

/// Load all sets from a CSV file
fn load_sets_from_csv(path: &Path) -> Result<Vec<LoggedSet>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut sets = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        match result {
            Ok(row) => match LoggedSet::try_from(row) {
                Ok(set) => sets.push(set),
                Err(e) => {
                    tracing::warn!("Failed to parse CSV row: {}", e);
                }
            },
            Err(e) => {
                tracing::warn!("Failed to deserialize CSV row: {}", e);
            }
        }
    }

    Ok(sets)
}

/// Sets belonging to one session, ordered for prescription sequencing
#[derive(Clone, Debug, Default)]
pub struct SessionSets {
    sets: Vec<LoggedSet>,
}

impl SessionSets {
    /// Filter a set list down to one session, sorted by creation time
    pub fn for_session(all: &[LoggedSet], session_id: Uuid) -> Self {
        let mut sets: Vec<LoggedSet> = all
            .iter()
            .filter(|s| s.session_id == session_id)
            .cloned()
            .collect();
        sets.sort_by_key(|s| s.created_at);
        Self { sets }
    }

    /// This session's sets for one prescription, in logged order
    pub fn for_prescription(&self, prescription_id: &str) -> Vec<LoggedSet> {
        self.sets
            .iter()
            .filter(|s| s.prescription_id == prescription_id)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> &[LoggedSet] {
        &self.sets
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl SessionLookup for SessionSets {
    fn logged_set(&self, session_id: Uuid, lift_id: &str, set_number: u32) -> Option<LoggedSet> {
        self.sets
            .iter()
            .find(|s| {
                s.session_id == session_id && s.lift_id == lift_id && s.set_number == set_number
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setlog::{JsonlSink, SetSink};

    fn test_set(lift: &str, session_id: Uuid, set_number: u32, days_ago: i64) -> LoggedSet {
        LoggedSet {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            session_id,
            prescription_id: format!("p_{}", lift),
            lift_id: lift.into(),
            set_number,
            weight: 225.0,
            target_reps: 5,
            reps_performed: 5,
            is_amrap: false,
            rpe: None,
            created_at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn test_load_recent_sets_respects_window() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("sets.jsonl");
        let csv_path = temp_dir.path().join("sets.csv");

        let session = Uuid::new_v4();
        let mut sink = JsonlSink::new(&log_path);
        sink.append(&test_set("squat", session, 1, 1)).unwrap();
        sink.append(&test_set("squat", session, 2, 3)).unwrap();
        sink.append(&test_set("squat", session, 3, 10)).unwrap(); // Too old

        let sets = load_recent_sets(&log_path, &csv_path, 7).unwrap();
        assert_eq!(sets.len(), 2);
    }

    #[test]
    fn test_sets_sorted_newest_first() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("sets.jsonl");
        let csv_path = temp_dir.path().join("sets.csv");

        let session = Uuid::new_v4();
        let mut sink = JsonlSink::new(&log_path);
        sink.append(&test_set("old", session, 1, 5)).unwrap();
        sink.append(&test_set("new", session, 2, 1)).unwrap();

        let sets = load_recent_sets(&log_path, &csv_path, 7).unwrap();
        assert_eq!(sets[0].lift_id, "new");
        assert_eq!(sets[1].lift_id, "old");
    }

    #[test]
    fn test_deduplication_across_log_and_csv() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("sets.jsonl");
        let csv_path = temp_dir.path().join("sets.csv");

        let set = test_set("squat", Uuid::new_v4(), 1, 1);
        let set_id = set.id;
        let mut sink = JsonlSink::new(&log_path);
        sink.append(&set).unwrap();

        crate::csv_rollup::log_to_csv_and_archive(&log_path, &csv_path).unwrap();

        // Re-append the same set to a fresh log to simulate the overlap
        let mut sink = JsonlSink::new(&log_path);
        sink.append(&set).unwrap();

        let sets = load_recent_sets(&log_path, &csv_path, 7).unwrap();
        let count = sets.iter().filter(|s| s.id == set_id).count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_session_sets_lookup() {
        let session_a = Uuid::new_v4();
        let session_b = Uuid::new_v4();
        let all = vec![
            test_set("squat", session_a, 1, 0),
            test_set("squat", session_a, 2, 0),
            test_set("squat", session_b, 1, 0),
        ];

        let sets = SessionSets::for_session(&all, session_a);
        assert_eq!(sets.all().len(), 2);
        assert!(sets.logged_set(session_a, "squat", 2).is_some());
        assert!(sets.logged_set(session_a, "squat", 3).is_none());
        assert!(sets.logged_set(session_b, "squat", 1).is_none());
    }

    #[test]
    fn test_for_prescription_filters_and_orders() {
        let session = Uuid::new_v4();
        let mut first = test_set("squat", session, 1, 0);
        first.created_at = Utc::now() - Duration::minutes(10);
        let second = test_set("squat", session, 2, 0);
        let other = test_set("bench", session, 1, 0);

        let sets = SessionSets::for_session(&[second.clone(), other, first.clone()], session);
        let squat_sets = sets.for_prescription("p_squat");
        assert_eq!(squat_sets.len(), 2);
        assert_eq!(squat_sets[0].set_number, 1);
        assert_eq!(squat_sets[1].set_number, 2);
    }
}
