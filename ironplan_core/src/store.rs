//! Athlete state persistence with file locking.
//!
//! A single JSON file holds everything mutable about one athlete: the
//! enrollment row, recorded maxes, failure counters, session records,
//! stage overrides, and the applied-progression ledger. Saves go through
//! a locked temp file and an atomic rename.

use crate::failure::FailureLedger;
use crate::load::MaxLookup;
use crate::scheme::SetScheme;
use crate::types::{LiftMax, MaxKind, MaxSource, UserProgramState, WorkoutSession};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// A stage progression's scheme override for one prescription
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageOverride {
    pub stage: usize,
    pub scheme: SetScheme,
}

/// Everything persisted for one athlete
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AthleteState {
    #[serde(default)]
    pub maxes: Vec<LiftMax>,
    #[serde(default)]
    pub failures: FailureLedger,
    /// Progression applications already recorded, keyed
    /// "progression_id/event_id"; the idempotency ledger
    #[serde(default)]
    pub applied_events: HashSet<String>,
    #[serde(default)]
    pub enrollment: Option<UserProgramState>,
    /// Scheme/stage overrides written by stage progressions, keyed by
    /// prescription id
    #[serde(default)]
    pub stage_overrides: HashMap<String, StageOverride>,
    #[serde(default)]
    pub sessions: HashMap<Uuid, WorkoutSession>,
}

impl AthleteState {
    /// Record a new max entry. Existing entries are never mutated.
    pub fn record_max(&mut self, max: LiftMax) {
        tracing::info!(
            "Recorded {} {} = {} ({:?})",
            max.lift_id,
            max.kind,
            max.value,
            max.source
        );
        self.maxes.push(max);
    }

    /// Apply a progression delta to a lift's current max of the given
    /// kind, producing a new entry.
    pub fn apply_max_delta(
        &mut self,
        user_id: Uuid,
        lift_id: &str,
        kind: MaxKind,
        delta: f64,
        at: DateTime<Utc>,
    ) -> Result<f64> {
        let current = self
            .current_max(user_id, lift_id, kind)
            .ok_or_else(|| {
                Error::NotFound(format!("no {} recorded for lift '{}'", kind, lift_id))
            })?;
        let new_value = current.value + delta;
        self.maxes.push(LiftMax {
            user_id,
            lift_id: lift_id.to_string(),
            kind,
            value: new_value,
            effective_date: at,
            source: MaxSource::Progression,
        });
        tracing::info!(
            "{} {} adjusted {:+} to {}",
            lift_id,
            kind,
            delta,
            new_value
        );
        Ok(new_value)
    }

    /// Mark a progression application in the idempotency ledger.
    /// Returns false if it was already recorded.
    pub fn mark_applied(&mut self, progression_id: &str, event_id: Uuid) -> bool {
        self.applied_events
            .insert(format!("{}/{}", progression_id, event_id))
    }

    pub fn was_applied(&self, progression_id: &str, event_id: Uuid) -> bool {
        self.applied_events
            .contains(&format!("{}/{}", progression_id, event_id))
    }
}

impl MaxLookup for AthleteState {
    /// Latest entry by effective date for the (user, lift, kind) triple
    fn current_max(&self, user_id: Uuid, lift_id: &str, kind: MaxKind) -> Option<LiftMax> {
        self.maxes
            .iter()
            .filter(|m| m.user_id == user_id && m.lift_id == lift_id && m.kind == kind)
            .max_by_key(|m| m.effective_date)
            .cloned()
    }
}

impl AthleteState {
    /// Load athlete state from a file with shared locking
    ///
    /// Returns default state if file doesn't exist.
    /// If file is corrupted, logs a warning and returns default state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No state file found, using default state");
            return Ok(Self::default());
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open state file {:?}: {}. Using defaults.", path, e);
                return Ok(Self::default());
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock state file {:?}: {}. Using defaults.", path, e);
            return Ok(Self::default());
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!("Failed to read state file {:?}: {}. Using defaults.", path, e);
            return Ok(Self::default());
        }

        file.unlock()?;

        match serde_json::from_str::<AthleteState>(&contents) {
            Ok(state) => {
                tracing::debug!("Loaded athlete state from {:?}", path);
                Ok(state)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse state file {:?}: {}. Using defaults.",
                    path,
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Save athlete state to a file with exclusive locking
    ///
    /// Atomically writes state by:
    /// 1. Writing to a temp file
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = NamedTempFile::new_in(path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "state path missing parent")
        })?)?;

        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved athlete state to {:?}", path);
        Ok(())
    }

    /// Load state, modify it, and save it back atomically
    pub fn update<F>(path: &Path, f: F) -> Result<Self>
    where
        F: FnOnce(&mut AthleteState) -> Result<()>,
    {
        let mut state = Self::load(path)?;
        f(&mut state)?;
        state.save(path)?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max(lift: &str, kind: MaxKind, value: f64, user: Uuid) -> LiftMax {
        LiftMax {
            user_id: user,
            lift_id: lift.into(),
            kind,
            value,
            effective_date: Utc::now(),
            source: MaxSource::Manual,
        }
    }

    #[test]
    fn test_current_max_picks_latest_entry() {
        let user = Uuid::new_v4();
        let mut state = AthleteState::default();

        let mut old = max("squat", MaxKind::TrainingMax, 300.0, user);
        old.effective_date = Utc::now() - chrono::Duration::days(30);
        state.record_max(old);
        state.record_max(max("squat", MaxKind::TrainingMax, 310.0, user));

        let current = state.current_max(user, "squat", MaxKind::TrainingMax).unwrap();
        assert_eq!(current.value, 310.0);
    }

    #[test]
    fn test_max_kinds_are_independent() {
        let user = Uuid::new_v4();
        let mut state = AthleteState::default();
        state.record_max(max("squat", MaxKind::OneRm, 350.0, user));

        assert!(state.current_max(user, "squat", MaxKind::TrainingMax).is_none());
        assert!(state.current_max(user, "bench", MaxKind::OneRm).is_none());
    }

    #[test]
    fn test_apply_max_delta_appends_entry() {
        let user = Uuid::new_v4();
        let mut state = AthleteState::default();
        let mut base = max("squat", MaxKind::TrainingMax, 300.0, user);
        base.effective_date = Utc::now() - chrono::Duration::days(1);
        state.record_max(base);

        let new_value = state
            .apply_max_delta(user, "squat", MaxKind::TrainingMax, 5.0, Utc::now())
            .unwrap();
        assert_eq!(new_value, 305.0);
        assert_eq!(state.maxes.len(), 2);

        let current = state.current_max(user, "squat", MaxKind::TrainingMax).unwrap();
        assert_eq!(current.value, 305.0);
        assert_eq!(current.source, MaxSource::Progression);
    }

    #[test]
    fn test_apply_delta_without_max_is_not_found() {
        let user = Uuid::new_v4();
        let mut state = AthleteState::default();
        assert!(matches!(
            state.apply_max_delta(user, "squat", MaxKind::TrainingMax, 5.0, Utc::now()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_applied_ledger() {
        let mut state = AthleteState::default();
        let event_id = Uuid::new_v4();

        assert!(!state.was_applied("rule1", event_id));
        assert!(state.mark_applied("rule1", event_id));
        assert!(state.was_applied("rule1", event_id));
        // Second mark reports the duplicate
        assert!(!state.mark_applied("rule1", event_id));
        // Same event, different rule is distinct
        assert!(state.mark_applied("rule2", event_id));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state_path = temp_dir.path().join("athlete.json");
        let user = Uuid::new_v4();

        let mut state = AthleteState::default();
        state.record_max(max("squat", MaxKind::TrainingMax, 300.0, user));
        state.mark_applied("rule1", Uuid::new_v4());
        state.save(&state_path).unwrap();

        let loaded = AthleteState::load(&state_path).unwrap();
        assert_eq!(loaded.maxes.len(), 1);
        assert_eq!(loaded.applied_events.len(), 1);
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = AthleteState::load(&temp_dir.path().join("nope.json")).unwrap();
        assert!(state.maxes.is_empty());
        assert!(state.enrollment.is_none());
    }

    #[test]
    fn test_corrupted_state_returns_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state_path = temp_dir.path().join("corrupted.json");
        std::fs::write(&state_path, "{ invalid json }").unwrap();

        let state = AthleteState::load(&state_path).unwrap();
        assert!(state.maxes.is_empty());
    }

    #[test]
    fn test_update_pattern() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state_path = temp_dir.path().join("athlete.json");
        let user = Uuid::new_v4();

        AthleteState::default().save(&state_path).unwrap();
        AthleteState::update(&state_path, |state| {
            state.record_max(max("bench", MaxKind::OneRm, 225.0, user));
            Ok(())
        })
        .unwrap();

        let loaded = AthleteState::load(&state_path).unwrap();
        assert_eq!(loaded.maxes.len(), 1);
    }
}
