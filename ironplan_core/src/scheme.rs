//! Set schemes: how a base weight becomes an ordered sequence of sets.
//!
//! Fixed-count schemes (fixed, amrap, ramp, rep_range) fully determine
//! their output from the base weight. Variable-count schemes (fatigue_drop,
//! mrs, total_reps) emit provisional sets one at a time, feeding each
//! logged set back in until a termination condition fires.

use crate::rounding::Rounding;
use crate::types::{GeneratedSet, LoggedSet};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// Termination
// ============================================================================

/// Performance snapshot a termination condition evaluates against
#[derive(Clone, Debug, Default)]
pub struct TerminationContext {
    pub last_rpe: Option<f64>,
    pub last_reps: u32,
    pub total_reps: u32,
    pub total_sets: u32,
}

impl TerminationContext {
    /// Build the snapshot from a prescription's logged sets, in order
    pub fn from_history(history: &[LoggedSet]) -> Self {
        let last = history.last();
        Self {
            last_rpe: last.and_then(|s| s.rpe),
            last_reps: last.map(|s| s.reps_performed).unwrap_or(0),
            total_reps: history.iter().map(|s| s.reps_performed).sum(),
            total_sets: history.len() as u32,
        }
    }
}

/// A single stop condition for a variable-count scheme
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminationCondition {
    /// Stop once the reported RPE reaches the threshold
    RpeThreshold { stop_rpe: f64 },
    /// Stop once a set's reps fall below the floor (technical failure)
    RepFailure { min_reps: u32 },
    /// Stop once cumulative reps reach the target; overshoot still counts
    TargetVolume { target_total_reps: u32 },
    /// Hard safety cap on set count, always checked alongside the others
    MaxSets { max_sets: u32 },
}

/// Why a variable-count sequence terminated. Exactly one reason is
/// attributable per terminated sequence.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    RpeReached,
    RepFailure,
    TargetVolumeReached,
    MaxSetsReached,
}

impl TerminationCondition {
    fn evaluate(&self, ctx: &TerminationContext) -> bool {
        // Nothing can terminate before the first set is logged
        if ctx.total_sets == 0 {
            return false;
        }
        match self {
            TerminationCondition::RpeThreshold { stop_rpe } => {
                ctx.last_rpe.map(|rpe| rpe >= *stop_rpe).unwrap_or(false)
            }
            TerminationCondition::RepFailure { min_reps } => ctx.last_reps < *min_reps,
            TerminationCondition::TargetVolume { target_total_reps } => {
                ctx.total_reps >= *target_total_reps
            }
            TerminationCondition::MaxSets { max_sets } => ctx.total_sets >= *max_sets,
        }
    }

    fn reason(&self) -> TerminationReason {
        match self {
            TerminationCondition::RpeThreshold { .. } => TerminationReason::RpeReached,
            TerminationCondition::RepFailure { .. } => TerminationReason::RepFailure,
            TerminationCondition::TargetVolume { .. } => TerminationReason::TargetVolumeReached,
            TerminationCondition::MaxSets { .. } => TerminationReason::MaxSetsReached,
        }
    }
}

/// Evaluate conditions in order; the first that fires names the reason
pub fn evaluate_termination(
    conditions: &[TerminationCondition],
    ctx: &TerminationContext,
) -> Option<TerminationReason> {
    conditions
        .iter()
        .find(|c| c.evaluate(ctx))
        .map(|c| c.reason())
}

/// Outcome of asking a variable-count scheme for its next set
#[derive(Clone, Debug, PartialEq)]
pub enum NextSet {
    Continue(GeneratedSet),
    Done(TerminationReason),
}

// ============================================================================
// Schemes
// ============================================================================

fn default_mrs_blocks() -> u32 {
    3
}

/// Set generation scheme for a prescription
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SetScheme {
    /// Straight sets: `sets` x `reps` at the base weight
    Fixed { sets: u32, reps: u32 },
    /// Straight sets with the final set taken for max reps
    Amrap { sets: u32, reps: u32 },
    /// Weights ramp linearly from `start_percent` of base up to base;
    /// only the final set is a work set
    Ramp {
        sets: u32,
        reps: u32,
        start_percent: f64,
    },
    /// Every set targets the rep range floor; the ceiling drives
    /// double progression
    RepRange {
        sets: u32,
        min_reps: u32,
        max_reps: u32,
    },
    /// Load-drop autoregulation: each set drops `drop_percent` from the
    /// previous weight, until the stop RPE is reported
    FatigueDrop {
        reps: u32,
        drop_percent: f64,
        stop_rpe: f64,
        max_sets: u32,
    },
    /// Max-rep sets at a single weight until the volume target is met or
    /// a set falls under the per-set floor
    Mrs {
        target_total_reps: u32,
        min_reps_per_set: u32,
        #[serde(default = "default_mrs_blocks")]
        number_of_blocks: u32,
        max_sets: u32,
    },
    /// Pure cumulative-volume target; the user self-paces distribution
    TotalReps {
        target_total_reps: u32,
        max_sets: u32,
    },
}

impl SetScheme {
    /// Generate the prescribed sets for a base weight.
    ///
    /// Variable-count schemes return only their provisional opening sets;
    /// the rest arrive through [`SetScheme::generate_next_set`].
    pub fn generate_sets(&self, base_weight: f64, rounding: &Rounding) -> Result<Vec<GeneratedSet>> {
        match self {
            SetScheme::Fixed { sets, reps } => Ok((1..=*sets)
                .map(|n| work_set(n, base_weight, *reps))
                .collect()),

            SetScheme::Amrap { sets, reps } => {
                let mut out: Vec<GeneratedSet> = (1..=*sets)
                    .map(|n| work_set(n, base_weight, *reps))
                    .collect();
                if let Some(last) = out.last_mut() {
                    last.is_amrap = true;
                }
                Ok(out)
            }

            SetScheme::Ramp {
                sets,
                reps,
                start_percent,
            } => {
                let mut out = Vec::with_capacity(*sets as usize);
                for n in 1..=*sets {
                    let fraction = if *sets == 1 {
                        1.0
                    } else {
                        start_percent + (1.0 - start_percent) * ((n - 1) as f64 / (*sets - 1) as f64)
                    };
                    let weight = if base_weight == 0.0 {
                        0.0
                    } else {
                        rounding.apply(base_weight * fraction)?
                    };
                    out.push(GeneratedSet {
                        set_number: n,
                        weight,
                        target_reps: *reps,
                        is_work_set: n == *sets,
                        is_provisional: false,
                        is_amrap: false,
                    });
                }
                Ok(out)
            }

            SetScheme::RepRange {
                sets, min_reps, ..
            } => Ok((1..=*sets)
                .map(|n| work_set(n, base_weight, *min_reps))
                .collect()),

            SetScheme::FatigueDrop { reps, .. } => Ok(vec![provisional_set(
                1,
                base_weight,
                *reps,
                false,
            )]),

            SetScheme::Mrs {
                min_reps_per_set,
                number_of_blocks,
                ..
            } => Ok((1..=*number_of_blocks)
                .map(|n| provisional_set(n, base_weight, *min_reps_per_set, true))
                .collect()),

            SetScheme::TotalReps {
                target_total_reps, ..
            } => Ok(vec![provisional_set(1, base_weight, *target_total_reps, true)]),
        }
    }

    /// True for schemes whose set count depends on in-session performance
    pub fn is_variable_count(&self) -> bool {
        matches!(
            self,
            SetScheme::FatigueDrop { .. } | SetScheme::Mrs { .. } | SetScheme::TotalReps { .. }
        )
    }

    /// The termination conditions for a variable-count scheme, primary
    /// condition(s) first, safety cap last. Empty for fixed schemes.
    pub fn termination_conditions(&self) -> Vec<TerminationCondition> {
        match self {
            SetScheme::FatigueDrop {
                stop_rpe, max_sets, ..
            } => vec![
                TerminationCondition::RpeThreshold { stop_rpe: *stop_rpe },
                TerminationCondition::MaxSets { max_sets: *max_sets },
            ],
            SetScheme::Mrs {
                target_total_reps,
                min_reps_per_set,
                max_sets,
                ..
            } => vec![
                TerminationCondition::TargetVolume {
                    target_total_reps: *target_total_reps,
                },
                TerminationCondition::RepFailure {
                    min_reps: *min_reps_per_set,
                },
                TerminationCondition::MaxSets { max_sets: *max_sets },
            ],
            SetScheme::TotalReps {
                target_total_reps,
                max_sets,
            } => vec![
                TerminationCondition::TargetVolume {
                    target_total_reps: *target_total_reps,
                },
                TerminationCondition::MaxSets { max_sets: *max_sets },
            ],
            _ => Vec::new(),
        }
    }

    /// Produce the next set of a variable-count sequence, or the reason
    /// it is done. `history` is this prescription's logged sets in order.
    pub fn generate_next_set(
        &self,
        base_weight: f64,
        history: &[LoggedSet],
        rounding: &Rounding,
    ) -> Result<NextSet> {
        if !self.is_variable_count() {
            return Err(Error::Validation(format!(
                "scheme {:?} has a fixed set count",
                self
            )));
        }

        let ctx = TerminationContext::from_history(history);
        if let Some(reason) = evaluate_termination(&self.termination_conditions(), &ctx) {
            tracing::debug!(
                "Sequence terminated after {} sets ({} reps): {:?}",
                ctx.total_sets,
                ctx.total_reps,
                reason
            );
            return Ok(NextSet::Done(reason));
        }

        let set_number = ctx.total_sets + 1;
        let next = match self {
            SetScheme::FatigueDrop {
                reps, drop_percent, ..
            } => {
                let weight = match history.last() {
                    None => base_weight,
                    Some(prev) => {
                        // Rounding may climb back up to the previous
                        // weight; never above it
                        let dropped = rounding.apply(prev.weight * (1.0 - drop_percent))?;
                        dropped.min(prev.weight)
                    }
                };
                provisional_set(set_number, weight, *reps, false)
            }

            SetScheme::Mrs {
                min_reps_per_set, ..
            } => provisional_set(set_number, base_weight, *min_reps_per_set, true),

            SetScheme::TotalReps {
                target_total_reps, ..
            } => {
                let remaining = target_total_reps.saturating_sub(ctx.total_reps);
                provisional_set(set_number, base_weight, remaining, true)
            }

            _ => unreachable!("fixed schemes rejected above"),
        };

        Ok(NextSet::Continue(next))
    }

    /// Number of work sets a fixed scheme prescribes. None for
    /// variable-count schemes.
    pub fn work_set_count(&self) -> Option<u32> {
        match self {
            SetScheme::Fixed { sets, .. }
            | SetScheme::Amrap { sets, .. }
            | SetScheme::RepRange { sets, .. } => Some(*sets),
            SetScheme::Ramp { .. } => Some(1),
            _ => None,
        }
    }

    /// The rep ceiling of a rep-range scheme, used by double progression
    pub fn rep_ceiling(&self) -> Option<u32> {
        match self {
            SetScheme::RepRange { max_reps, .. } => Some(*max_reps),
            _ => None,
        }
    }

    /// Check the scheme's parameters
    pub fn validate(&self) -> Result<()> {
        match self {
            SetScheme::Fixed { sets, reps } | SetScheme::Amrap { sets, reps } => {
                require(*sets >= 1, "sets must be >= 1")?;
                require(*reps >= 1, "reps must be >= 1")
            }
            SetScheme::Ramp {
                sets,
                reps,
                start_percent,
            } => {
                require(*sets >= 2, "ramp needs at least 2 sets")?;
                require(*reps >= 1, "reps must be >= 1")?;
                require(
                    *start_percent > 0.0 && *start_percent < 1.0,
                    "ramp start_percent must be in (0, 1)",
                )
            }
            SetScheme::RepRange {
                sets,
                min_reps,
                max_reps,
            } => {
                require(*sets >= 1, "sets must be >= 1")?;
                require(*min_reps >= 1, "min_reps must be >= 1")?;
                require(max_reps > min_reps, "max_reps must exceed min_reps")
            }
            SetScheme::FatigueDrop {
                reps,
                drop_percent,
                stop_rpe,
                max_sets,
            } => {
                require(*reps >= 1, "reps must be >= 1")?;
                require(
                    *drop_percent > 0.0 && *drop_percent < 0.5,
                    "drop_percent must be in (0, 0.5)",
                )?;
                require(
                    (crate::rpe::MIN_RPE..=crate::rpe::MAX_RPE).contains(stop_rpe),
                    "stop_rpe must be within the RPE chart range",
                )?;
                require(*max_sets >= 1, "max_sets must be >= 1")
            }
            SetScheme::Mrs {
                target_total_reps,
                min_reps_per_set,
                number_of_blocks,
                max_sets,
            } => {
                require(*target_total_reps >= 1, "target_total_reps must be >= 1")?;
                require(*min_reps_per_set >= 1, "min_reps_per_set must be >= 1")?;
                require(*number_of_blocks >= 1, "number_of_blocks must be >= 1")?;
                require(
                    max_sets >= number_of_blocks,
                    "max_sets must cover the planned blocks",
                )
            }
            SetScheme::TotalReps {
                target_total_reps,
                max_sets,
            } => {
                require(*target_total_reps >= 1, "target_total_reps must be >= 1")?;
                require(*max_sets >= 1, "max_sets must be >= 1")
            }
        }
    }
}

fn require(condition: bool, message: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::Validation(message.into()))
    }
}

fn work_set(set_number: u32, weight: f64, target_reps: u32) -> GeneratedSet {
    GeneratedSet {
        set_number,
        weight,
        target_reps,
        is_work_set: true,
        is_provisional: false,
        is_amrap: false,
    }
}

fn provisional_set(set_number: u32, weight: f64, target_reps: u32, is_amrap: bool) -> GeneratedSet {
    GeneratedSet {
        set_number,
        weight,
        target_reps,
        is_work_set: true,
        is_provisional: true,
        is_amrap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn logged(set_number: u32, weight: f64, reps: u32, rpe: Option<f64>) -> LoggedSet {
        LoggedSet {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            session_id: Uuid::nil(),
            prescription_id: "p1".into(),
            lift_id: "squat".into(),
            set_number,
            weight,
            target_reps: reps,
            reps_performed: reps,
            is_amrap: false,
            rpe,
            created_at: Utc::now(),
        }
    }

    fn logged_reps(set_number: u32, weight: f64, reps: u32) -> LoggedSet {
        logged(set_number, weight, reps, None)
    }

    #[test]
    fn test_fixed_scheme() {
        let scheme = SetScheme::Fixed { sets: 3, reps: 5 };
        let sets = scheme.generate_sets(225.0, &Rounding::default()).unwrap();
        assert_eq!(sets.len(), 3);
        assert!(sets.iter().all(|s| s.weight == 225.0 && s.target_reps == 5));
        assert!(sets.iter().all(|s| s.is_work_set && !s.is_provisional));
    }

    #[test]
    fn test_amrap_scheme_marks_last_set() {
        let scheme = SetScheme::Amrap { sets: 3, reps: 5 };
        let sets = scheme.generate_sets(225.0, &Rounding::default()).unwrap();
        assert!(!sets[0].is_amrap);
        assert!(!sets[1].is_amrap);
        assert!(sets[2].is_amrap);
    }

    #[test]
    fn test_ramp_scheme_climbs_to_base() {
        let scheme = SetScheme::Ramp {
            sets: 4,
            reps: 3,
            start_percent: 0.5,
        };
        let sets = scheme.generate_sets(300.0, &Rounding::default()).unwrap();
        assert_eq!(sets[0].weight, 150.0);
        assert_eq!(sets[3].weight, 300.0);
        for pair in sets.windows(2) {
            assert!(pair[1].weight >= pair[0].weight);
        }
        // Only the top set is work
        assert!(sets[..3].iter().all(|s| !s.is_work_set));
        assert!(sets[3].is_work_set);
    }

    #[test]
    fn test_rep_range_targets_floor() {
        let scheme = SetScheme::RepRange {
            sets: 3,
            min_reps: 8,
            max_reps: 12,
        };
        let sets = scheme.generate_sets(135.0, &Rounding::default()).unwrap();
        assert!(sets.iter().all(|s| s.target_reps == 8));
        assert_eq!(scheme.rep_ceiling(), Some(12));
    }

    #[test]
    fn test_variable_schemes_start_provisional() {
        let scheme = SetScheme::FatigueDrop {
            reps: 5,
            drop_percent: 0.05,
            stop_rpe: 9.0,
            max_sets: 6,
        };
        let sets = scheme.generate_sets(200.0, &Rounding::default()).unwrap();
        assert_eq!(sets.len(), 1);
        assert!(sets[0].is_provisional);

        let scheme = SetScheme::Mrs {
            target_total_reps: 25,
            min_reps_per_set: 3,
            number_of_blocks: 3,
            max_sets: 6,
        };
        let sets = scheme.generate_sets(150.0, &Rounding::default()).unwrap();
        assert_eq!(sets.len(), 3);
        assert!(sets.iter().all(|s| s.is_provisional && s.is_amrap));
    }

    #[test]
    fn test_fatigue_drop_weights_non_increasing() {
        let scheme = SetScheme::FatigueDrop {
            reps: 5,
            drop_percent: 0.06,
            stop_rpe: 9.5,
            max_sets: 8,
        };
        let rounding = Rounding::default();
        let mut history = Vec::new();
        let mut prev_weight = f64::MAX;
        let mut sets_generated = 0;

        loop {
            match scheme.generate_next_set(200.0, &history, &rounding).unwrap() {
                NextSet::Continue(set) => {
                    assert!(set.weight <= prev_weight);
                    prev_weight = set.weight;
                    sets_generated += 1;
                    history.push(logged(set.set_number, set.weight, 5, Some(8.0)));
                }
                NextSet::Done(reason) => {
                    assert_eq!(reason, TerminationReason::MaxSetsReached);
                    break;
                }
            }
        }
        assert_eq!(sets_generated, 8);
    }

    #[test]
    fn test_fatigue_drop_stops_at_rpe() {
        let scheme = SetScheme::FatigueDrop {
            reps: 5,
            drop_percent: 0.05,
            stop_rpe: 9.0,
            max_sets: 10,
        };
        let rounding = Rounding::default();
        let history = vec![
            logged(1, 200.0, 5, Some(8.0)),
            logged(2, 190.0, 5, Some(9.0)),
        ];
        assert_eq!(
            scheme.generate_next_set(200.0, &history, &rounding).unwrap(),
            NextSet::Done(TerminationReason::RpeReached)
        );
    }

    #[test]
    fn test_mrs_terminates_on_target_volume() {
        let scheme = SetScheme::Mrs {
            target_total_reps: 25,
            min_reps_per_set: 3,
            number_of_blocks: 3,
            max_sets: 6,
        };
        let rounding = Rounding::default();
        // Overshoot past 25 still completes immediately
        let history = vec![
            logged_reps(1, 150.0, 10),
            logged_reps(2, 150.0, 9),
            logged_reps(3, 150.0, 8),
        ];
        assert_eq!(
            scheme.generate_next_set(150.0, &history, &rounding).unwrap(),
            NextSet::Done(TerminationReason::TargetVolumeReached)
        );
    }

    #[test]
    fn test_mrs_terminates_on_rep_failure() {
        let scheme = SetScheme::Mrs {
            target_total_reps: 25,
            min_reps_per_set: 3,
            number_of_blocks: 3,
            max_sets: 6,
        };
        let rounding = Rounding::default();
        let history = vec![logged_reps(1, 150.0, 10), logged_reps(2, 150.0, 2)];
        assert_eq!(
            scheme.generate_next_set(150.0, &history, &rounding).unwrap(),
            NextSet::Done(TerminationReason::RepFailure)
        );
    }

    #[test]
    fn test_mrs_termination_reason_is_exclusive() {
        // Each terminated sequence attributes exactly one reason, in
        // priority order: volume, rep failure, cap
        let scheme = SetScheme::Mrs {
            target_total_reps: 12,
            min_reps_per_set: 3,
            number_of_blocks: 2,
            max_sets: 4,
        };
        let rounding = Rounding::default();

        // Final set under the floor but pushing the total past target:
        // volume wins
        let history = vec![logged_reps(1, 150.0, 10), logged_reps(2, 150.0, 2)];
        assert_eq!(
            scheme.generate_next_set(150.0, &history, &rounding).unwrap(),
            NextSet::Done(TerminationReason::TargetVolumeReached)
        );
    }

    #[test]
    fn test_mrs_continues_below_target() {
        let scheme = SetScheme::Mrs {
            target_total_reps: 25,
            min_reps_per_set: 3,
            number_of_blocks: 3,
            max_sets: 6,
        };
        let rounding = Rounding::default();
        let history = vec![logged_reps(1, 150.0, 10)];
        match scheme.generate_next_set(150.0, &history, &rounding).unwrap() {
            NextSet::Continue(set) => {
                assert_eq!(set.set_number, 2);
                assert_eq!(set.weight, 150.0);
            }
            other => panic!("Expected continue, got {:?}", other),
        }
    }

    #[test]
    fn test_total_reps_self_paced() {
        let scheme = SetScheme::TotalReps {
            target_total_reps: 50,
            max_sets: 10,
        };
        let rounding = Rounding::default();

        // Any distribution is acceptable; next target shows the remainder
        let history = vec![logged_reps(1, 100.0, 20), logged_reps(2, 100.0, 13)];
        match scheme.generate_next_set(100.0, &history, &rounding).unwrap() {
            NextSet::Continue(set) => assert_eq!(set.target_reps, 17),
            other => panic!("Expected continue, got {:?}", other),
        }

        let history = vec![
            logged_reps(1, 100.0, 20),
            logged_reps(2, 100.0, 13),
            logged_reps(3, 100.0, 17),
        ];
        assert_eq!(
            scheme.generate_next_set(100.0, &history, &rounding).unwrap(),
            NextSet::Done(TerminationReason::TargetVolumeReached)
        );
    }

    #[test]
    fn test_total_reps_max_sets_cap() {
        let scheme = SetScheme::TotalReps {
            target_total_reps: 100,
            max_sets: 2,
        };
        let rounding = Rounding::default();
        let history = vec![logged_reps(1, 100.0, 5), logged_reps(2, 100.0, 5)];
        assert_eq!(
            scheme.generate_next_set(100.0, &history, &rounding).unwrap(),
            NextSet::Done(TerminationReason::MaxSetsReached)
        );
    }

    #[test]
    fn test_generate_next_set_rejected_for_fixed_schemes() {
        let scheme = SetScheme::Fixed { sets: 3, reps: 5 };
        assert!(scheme
            .generate_next_set(200.0, &[], &Rounding::default())
            .is_err());
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        assert!(SetScheme::Fixed { sets: 0, reps: 5 }.validate().is_err());
        assert!(SetScheme::Ramp {
            sets: 1,
            reps: 3,
            start_percent: 0.5
        }
        .validate()
        .is_err());
        assert!(SetScheme::RepRange {
            sets: 3,
            min_reps: 12,
            max_reps: 8
        }
        .validate()
        .is_err());
        assert!(SetScheme::FatigueDrop {
            reps: 5,
            drop_percent: 0.8,
            stop_rpe: 9.0,
            max_sets: 6
        }
        .validate()
        .is_err());
        assert!(SetScheme::Mrs {
            target_total_reps: 25,
            min_reps_per_set: 3,
            number_of_blocks: 5,
            max_sets: 3
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_json_discriminator_round_trip() {
        let json = r#"{"type": "mrs", "target_total_reps": 25, "min_reps_per_set": 3, "max_sets": 6}"#;
        let scheme: SetScheme = serde_json::from_str(json).unwrap();
        assert_eq!(
            scheme,
            SetScheme::Mrs {
                target_total_reps: 25,
                min_reps_per_set: 3,
                number_of_blocks: 3,
                max_sets: 6
            }
        );
    }
}
