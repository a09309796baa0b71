//! Core domain types for the ironplan system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Recorded lift maxes and their kinds
//! - Generated and logged sets
//! - Enrollment, cycle/week, and workout-session state
//! - Failure counters for progression rules

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Lift Maxes
// ============================================================================

/// Kind of recorded max for a lift
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MaxKind {
    /// True one-rep max
    OneRm,
    /// Deliberately conservative max used as the percentage base
    TrainingMax,
    /// Estimated 1RM back-calculated from a submaximal set
    E1Rm,
}

impl std::fmt::Display for MaxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OneRm => write!(f, "one_rm"),
            Self::TrainingMax => write!(f, "training_max"),
            Self::E1Rm => write!(f, "e1rm"),
        }
    }
}

/// How a max entry came to exist
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaxSource {
    /// Entered by hand (manual overrides are logged as such)
    Manual,
    /// Written by an applied progression delta
    Progression,
    /// Back-calculated from a logged set's weight/reps/RPE
    Estimated,
}

/// A recorded max for a lift. Immutable once recorded; changes arrive as
/// new entries with a later effective date.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LiftMax {
    pub user_id: Uuid,
    pub lift_id: String,
    pub kind: MaxKind,
    pub value: f64,
    pub effective_date: DateTime<Utc>,
    pub source: MaxSource,
}

// ============================================================================
// Sets
// ============================================================================

/// A single prescribed set produced by resolution. Ephemeral; regenerated
/// on every resolution call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GeneratedSet {
    pub set_number: u32,
    /// 0.0 means "no prescribed weight" (the user finds their own, e.g.
    /// during an NRM test)
    pub weight: f64,
    pub target_reps: u32,
    pub is_work_set: bool,
    /// True for sets of a variable-count scheme until the corresponding
    /// logged set exists
    pub is_provisional: bool,
    pub is_amrap: bool,
}

/// An append-only fact record of what actually happened. Source of truth
/// for failure detection and E1RM.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggedSet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub prescription_id: String,
    pub lift_id: String,
    pub set_number: u32,
    pub weight: f64,
    pub target_reps: u32,
    pub reps_performed: u32,
    pub is_amrap: bool,
    pub rpe: Option<f64>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Enrollment and Session State
// ============================================================================

/// Enrollment lifecycle. "Not enrolled" is the absence of a
/// [`UserProgramState`] row, so it needs no variant here.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    BetweenCycles,
    /// Terminal
    Quit,
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::BetweenCycles => write!(f, "between_cycles"),
            Self::Quit => write!(f, "quit"),
        }
    }
}

/// Status of a cycle or week within the program
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

/// Status of a workout session. InProgress is the only non-terminal state.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

/// How the program's days are scheduled
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    #[default]
    Weekly,
    /// Counts down to a configured meet date; enables taper loading
    MeetPrep,
}

/// The single source of truth for "where is this user in their program".
/// One active row per (user, program).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserProgramState {
    pub user_id: Uuid,
    pub program_id: String,
    pub enrollment_status: EnrollmentStatus,
    pub cycle_status: PeriodStatus,
    pub week_status: PeriodStatus,
    pub current_week: u32,
    pub current_cycle_iteration: u32,
    pub current_day_index: u32,
    pub meet_date: Option<NaiveDate>,
    pub schedule: ScheduleType,
    /// Id of the one in-progress session, if any. At most one per
    /// enrollment at any time.
    pub active_session_id: Option<Uuid>,
}

/// A workout session. Created on start; finish/abandon are terminal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub id: Uuid,
    pub week_number: u32,
    pub day_index: u32,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Failure Tracking
// ============================================================================

/// Consecutive under-target performances for one (user, lift, progression)
/// triple. Scoped per progression so different rules keep independent
/// thresholds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FailureCounter {
    pub user_id: Uuid,
    pub lift_id: String,
    pub progression_id: String,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl FailureCounter {
    pub fn new(user_id: Uuid, lift_id: impl Into<String>, progression_id: impl Into<String>) -> Self {
        Self {
            user_id,
            lift_id: lift_id.into(),
            progression_id: progression_id.into(),
            consecutive_failures: 0,
            last_failure_at: None,
        }
    }
}
