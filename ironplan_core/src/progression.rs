//! Progression rules: how maxes and schemes move in response to training.
//!
//! Each rule is a tagged variant with a trigger type, a validate, and an
//! apply. Apply is pure: it reads the trigger event and the current
//! failure count and returns a delta, never writing anything itself.
//! Persisting the result (and the idempotency ledger) is the
//! dispatcher's job.

use crate::scheme::SetScheme;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// Triggers
// ============================================================================

/// When a progression rule is evaluated
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    AfterSet,
    AfterSession,
    AfterWeek,
    AfterCycle,
    OnFailure,
}

/// The data a progression rule evaluates against. Built by the
/// dispatcher from a state event plus session history.
#[derive(Clone, Debug)]
pub struct TriggerEvent {
    /// Identity of the originating state event; idempotency key
    pub event_id: Uuid,
    pub trigger: TriggerType,
    pub user_id: Uuid,
    pub lift_id: String,
    pub prescription_id: Option<String>,
    pub reps_performed: Option<u32>,
    pub target_reps: Option<u32>,
    /// Rep ceiling of the prescription's rep-range scheme, when it has one
    pub rep_ceiling: Option<u32>,
    pub is_amrap: bool,
    pub rpe: Option<f64>,
    /// Total reps logged for the prescription this session
    pub session_volume: Option<u32>,
    /// True once every work set of the prescription reached the ceiling
    pub all_sets_at_ceiling: Option<bool>,
    /// Stage index currently governing the prescription
    pub current_stage: Option<usize>,
    /// The lift's current working max, for percent-based deltas
    pub current_max: Option<f64>,
    pub occurred_at: DateTime<Utc>,
    /// Administrative override: re-apply even if already recorded
    pub force: bool,
}

impl TriggerEvent {
    /// A bare event; callers fill in what their rule needs
    pub fn new(trigger: TriggerType, user_id: Uuid, lift_id: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            trigger,
            user_id,
            lift_id: lift_id.into(),
            prescription_id: None,
            reps_performed: None,
            target_reps: None,
            rep_ceiling: None,
            is_amrap: false,
            rpe: None,
            session_volume: None,
            all_sets_at_ceiling: None,
            current_stage: None,
            current_max: None,
            occurred_at: Utc::now(),
            force: false,
        }
    }
}

/// Outcome of applying a progression rule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgressionResult {
    pub applied: bool,
    /// Weight change to the lift's working max; negative for deloads
    pub delta: f64,
    pub new_stage: Option<usize>,
    pub new_scheme: Option<SetScheme>,
    /// Whether the rule asks for its failure counter to be cleared
    pub reset_failures: bool,
    pub reason: String,
}

impl ProgressionResult {
    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            applied: false,
            delta: 0.0,
            new_stage: None,
            new_scheme: None,
            reset_failures: false,
            reason: reason.into(),
        }
    }

    fn delta(delta: f64, reason: impl Into<String>) -> Self {
        Self {
            applied: true,
            delta,
            new_stage: None,
            new_scheme: None,
            reset_failures: false,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Rule Variants
// ============================================================================

/// Which period boundary a linear progression fires on
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinearTrigger {
    #[default]
    AfterSession,
    AfterWeek,
}

/// AMRAP reward tier: at `min_reps` or more, add `increment`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RepThreshold {
    pub min_reps: u32,
    pub increment: f64,
}

/// How a deload reduces the working max
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeloadAmount {
    /// Fraction of the current max, e.g. 0.1 for a 10% cut
    Percent { percent: f64 },
    /// Flat weight cut
    Fixed { amount: f64 },
}

/// One set/rep configuration within a stage progression
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Stage {
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    #[serde(default)]
    pub is_amrap: bool,
    /// Session volume below this advances to the next stage
    pub min_volume: u32,
}

impl Stage {
    /// The scheme this stage prescribes
    pub fn scheme(&self) -> SetScheme {
        if self.is_amrap {
            SetScheme::Amrap {
                sets: self.sets,
                reps: self.reps,
            }
        } else {
            SetScheme::Fixed {
                sets: self.sets,
                reps: self.reps,
            }
        }
    }
}

/// Double-progression ceiling policy. The conventional reading requires
/// every work set at the ceiling before weight moves; any-set is kept as
/// a configurable alternative.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CeilingPolicy {
    #[default]
    AllSets,
    AnySet,
}

fn default_reset_counter() -> bool {
    true
}

/// A progression rule bound to a lift by the program definition
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Progression {
    /// Fixed increment on a period boundary, unconditional
    Linear {
        increment: f64,
        #[serde(default)]
        trigger: LinearTrigger,
    },
    /// Tiered increment by AMRAP rep count
    Amrap { thresholds: Vec<RepThreshold> },
    /// Cut the working max after enough consecutive failures
    DeloadOnFailure {
        failure_threshold: u32,
        deload: DeloadAmount,
        #[serde(default = "default_reset_counter")]
        reset_counter: bool,
    },
    /// Advance through set/rep stages on volume failure; weight increases
    /// belong to a paired rule
    Stage {
        stages: Vec<Stage>,
        #[serde(default)]
        reset_on_exhaustion: bool,
        /// Fraction of the current max to cut when stages wrap around
        #[serde(default)]
        deload_on_reset: Option<f64>,
    },
    /// Add weight once the rep-range ceiling is reached
    Double {
        increment: f64,
        #[serde(default)]
        policy: CeilingPolicy,
    },
    /// Per-cycle increment, with per-lift overrides
    Cycle {
        default_increment: f64,
        #[serde(default)]
        overrides: HashMap<String, f64>,
    },
}

impl Progression {
    /// Short type tag, matching the JSON discriminator
    pub fn progression_type(&self) -> &'static str {
        match self {
            Progression::Linear { .. } => "linear",
            Progression::Amrap { .. } => "amrap",
            Progression::DeloadOnFailure { .. } => "deload_on_failure",
            Progression::Stage { .. } => "stage",
            Progression::Double { .. } => "double",
            Progression::Cycle { .. } => "cycle",
        }
    }

    /// The trigger this rule listens for
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Progression::Linear { trigger, .. } => match trigger {
                LinearTrigger::AfterSession => TriggerType::AfterSession,
                LinearTrigger::AfterWeek => TriggerType::AfterWeek,
            },
            Progression::Amrap { .. } => TriggerType::AfterSet,
            Progression::DeloadOnFailure { .. } => TriggerType::OnFailure,
            Progression::Stage { .. } => TriggerType::OnFailure,
            Progression::Double { .. } => TriggerType::AfterSet,
            Progression::Cycle { .. } => TriggerType::AfterCycle,
        }
    }

    /// Evaluate this rule against a trigger event.
    ///
    /// `consecutive_failures` is the counter for this (lift, rule) pair,
    /// already updated for the event being processed.
    pub fn apply(
        &self,
        event: &TriggerEvent,
        consecutive_failures: u32,
    ) -> Result<ProgressionResult> {
        if event.trigger != self.trigger_type() {
            return Ok(ProgressionResult::skipped(format!(
                "{} does not fire on {:?}",
                self.progression_type(),
                event.trigger
            )));
        }

        match self {
            Progression::Linear { increment, .. } => Ok(ProgressionResult::delta(
                *increment,
                format!("linear +{}", increment),
            )),

            Progression::Amrap { thresholds } => {
                if !event.is_amrap {
                    return Ok(ProgressionResult::skipped("set was not an AMRAP"));
                }
                let reps = event
                    .reps_performed
                    .ok_or_else(|| Error::Validation("amrap trigger missing reps".into()))?;

                // Highest satisfied tier wins; thresholds are ascending
                let best = thresholds.iter().rev().find(|t| t.min_reps <= reps);
                match best {
                    Some(tier) => Ok(ProgressionResult::delta(
                        tier.increment,
                        format!("{} reps met the {}+ tier", reps, tier.min_reps),
                    )),
                    None => Ok(ProgressionResult::skipped(format!(
                        "{} reps below the lowest tier",
                        reps
                    ))),
                }
            }

            Progression::DeloadOnFailure {
                failure_threshold,
                deload,
                reset_counter,
            } => {
                if consecutive_failures < *failure_threshold {
                    return Ok(ProgressionResult::skipped(format!(
                        "{} of {} consecutive failures",
                        consecutive_failures, failure_threshold
                    )));
                }
                let cut = match deload {
                    DeloadAmount::Fixed { amount } => *amount,
                    DeloadAmount::Percent { percent } => {
                        let max = event.current_max.ok_or_else(|| {
                            Error::Validation(
                                "percent deload requires the current max on the event".into(),
                            )
                        })?;
                        max * percent
                    }
                };
                let mut result = ProgressionResult::delta(
                    -cut,
                    format!(
                        "deload after {} consecutive failures",
                        consecutive_failures
                    ),
                );
                result.reset_failures = *reset_counter;
                Ok(result)
            }

            Progression::Stage {
                stages,
                reset_on_exhaustion,
                deload_on_reset,
            } => self.apply_stage(event, stages, *reset_on_exhaustion, *deload_on_reset),

            Progression::Double { increment, policy } => {
                let ceiling = event.rep_ceiling.ok_or_else(|| {
                    Error::Validation("double progression requires a rep-range ceiling".into())
                })?;
                let hit = match policy {
                    CeilingPolicy::AnySet => event
                        .reps_performed
                        .map(|r| r >= ceiling)
                        .unwrap_or(false),
                    CeilingPolicy::AllSets => event.all_sets_at_ceiling.unwrap_or(false),
                };
                if hit {
                    Ok(ProgressionResult::delta(
                        *increment,
                        format!("rep ceiling {} reached", ceiling),
                    ))
                } else {
                    Ok(ProgressionResult::skipped(format!(
                        "rep ceiling {} not yet reached",
                        ceiling
                    )))
                }
            }

            Progression::Cycle {
                default_increment,
                overrides,
            } => {
                let increment = overrides
                    .get(&event.lift_id)
                    .copied()
                    .unwrap_or(*default_increment);
                Ok(ProgressionResult::delta(
                    increment,
                    format!("cycle increment for {}", event.lift_id),
                ))
            }
        }
    }

    fn apply_stage(
        &self,
        event: &TriggerEvent,
        stages: &[Stage],
        reset_on_exhaustion: bool,
        deload_on_reset: Option<f64>,
    ) -> Result<ProgressionResult> {
        let current = event.current_stage.unwrap_or(0);
        let stage = stages.get(current).ok_or_else(|| {
            Error::Validation(format!(
                "stage index {} out of range ({} stages)",
                current,
                stages.len()
            ))
        })?;
        let volume = event
            .session_volume
            .ok_or_else(|| Error::Validation("stage trigger missing session volume".into()))?;

        if volume >= stage.min_volume {
            return Ok(ProgressionResult::skipped(format!(
                "volume {} met stage '{}' minimum {}",
                volume, stage.name, stage.min_volume
            )));
        }

        let next = current + 1;
        if next < stages.len() {
            let next_stage = &stages[next];
            tracing::debug!(
                "Stage progression: '{}' failed ({} < {}), advancing to '{}'",
                stage.name,
                volume,
                stage.min_volume,
                next_stage.name
            );
            return Ok(ProgressionResult {
                applied: true,
                delta: 0.0,
                new_stage: Some(next),
                new_scheme: Some(next_stage.scheme()),
                reset_failures: false,
                reason: format!("advanced to stage '{}'", next_stage.name),
            });
        }

        if !reset_on_exhaustion {
            return Ok(ProgressionResult::skipped(format!(
                "final stage '{}' failed; manual intervention required",
                stage.name
            )));
        }

        let delta = match deload_on_reset {
            None => 0.0,
            Some(percent) => {
                let max = event.current_max.ok_or_else(|| {
                    Error::Validation("deload on stage reset requires the current max".into())
                })?;
                -(max * percent)
            }
        };
        let first = &stages[0];
        Ok(ProgressionResult {
            applied: true,
            delta,
            new_stage: Some(0),
            new_scheme: Some(first.scheme()),
            reset_failures: true,
            reason: format!("stages exhausted; reset to '{}'", first.name),
        })
    }

    /// Check the rule's parameters
    pub fn validate(&self) -> Result<()> {
        match self {
            Progression::Linear { increment, .. } => {
                if *increment <= 0.0 {
                    return Err(Error::Validation(format!(
                        "linear increment must be positive, got {}",
                        increment
                    )));
                }
                Ok(())
            }
            Progression::Amrap { thresholds } => {
                if thresholds.is_empty() {
                    return Err(Error::Validation("amrap thresholds must not be empty".into()));
                }
                let mut last: Option<u32> = None;
                for tier in thresholds {
                    if tier.increment <= 0.0 {
                        return Err(Error::Validation(format!(
                            "amrap tier increment must be positive, got {}",
                            tier.increment
                        )));
                    }
                    if let Some(prev) = last {
                        if tier.min_reps <= prev {
                            return Err(Error::Validation(
                                "amrap thresholds must be strictly ascending by min_reps".into(),
                            ));
                        }
                    }
                    last = Some(tier.min_reps);
                }
                Ok(())
            }
            Progression::DeloadOnFailure {
                failure_threshold,
                deload,
                ..
            } => {
                if *failure_threshold == 0 {
                    return Err(Error::Validation("failure_threshold must be >= 1".into()));
                }
                match deload {
                    DeloadAmount::Percent { percent } => {
                        if *percent <= 0.0 || *percent >= 1.0 {
                            return Err(Error::Validation(format!(
                                "deload percent must be in (0, 1), got {}",
                                percent
                            )));
                        }
                    }
                    DeloadAmount::Fixed { amount } => {
                        if *amount <= 0.0 {
                            return Err(Error::Validation(format!(
                                "deload amount must be positive, got {}",
                                amount
                            )));
                        }
                    }
                }
                Ok(())
            }
            Progression::Stage {
                stages,
                deload_on_reset,
                ..
            } => {
                if stages.is_empty() {
                    return Err(Error::Validation("stage list must not be empty".into()));
                }
                for stage in stages {
                    if stage.sets == 0 || stage.reps == 0 {
                        return Err(Error::Validation(format!(
                            "stage '{}' must have sets and reps >= 1",
                            stage.name
                        )));
                    }
                }
                if let Some(percent) = deload_on_reset {
                    if *percent <= 0.0 || *percent >= 1.0 {
                        return Err(Error::Validation(format!(
                            "deload_on_reset must be in (0, 1), got {}",
                            percent
                        )));
                    }
                }
                Ok(())
            }
            Progression::Double { increment, .. } => {
                if *increment <= 0.0 {
                    return Err(Error::Validation(format!(
                        "double increment must be positive, got {}",
                        increment
                    )));
                }
                Ok(())
            }
            Progression::Cycle {
                default_increment,
                overrides,
            } => {
                if *default_increment <= 0.0 {
                    return Err(Error::Validation(format!(
                        "cycle default_increment must be positive, got {}",
                        default_increment
                    )));
                }
                for (lift, increment) in overrides {
                    if *increment <= 0.0 {
                        return Err(Error::Validation(format!(
                            "cycle override for '{}' must be positive, got {}",
                            lift, increment
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(trigger: TriggerType) -> TriggerEvent {
        TriggerEvent::new(trigger, Uuid::new_v4(), "squat")
    }

    #[test]
    fn test_linear_applies_on_matching_trigger() {
        let rule = Progression::Linear {
            increment: 5.0,
            trigger: LinearTrigger::AfterSession,
        };
        let result = rule.apply(&event(TriggerType::AfterSession), 0).unwrap();
        assert!(result.applied);
        assert_eq!(result.delta, 5.0);
    }

    #[test]
    fn test_trigger_mismatch_is_a_no_op() {
        let rule = Progression::Linear {
            increment: 5.0,
            trigger: LinearTrigger::AfterWeek,
        };
        let result = rule.apply(&event(TriggerType::AfterSession), 0).unwrap();
        assert!(!result.applied);
        assert_eq!(result.delta, 0.0);
    }

    #[test]
    fn test_amrap_highest_satisfied_tier_wins() {
        let rule = Progression::Amrap {
            thresholds: vec![
                RepThreshold {
                    min_reps: 2,
                    increment: 5.0,
                },
                RepThreshold {
                    min_reps: 4,
                    increment: 10.0,
                },
                RepThreshold {
                    min_reps: 6,
                    increment: 15.0,
                },
            ],
        };
        let mut e = event(TriggerType::AfterSet);
        e.is_amrap = true;
        e.reps_performed = Some(5);

        let result = rule.apply(&e, 0).unwrap();
        assert!(result.applied);
        assert_eq!(result.delta, 10.0);
    }

    #[test]
    fn test_amrap_below_lowest_tier_skips() {
        let rule = Progression::Amrap {
            thresholds: vec![RepThreshold {
                min_reps: 3,
                increment: 5.0,
            }],
        };
        let mut e = event(TriggerType::AfterSet);
        e.is_amrap = true;
        e.reps_performed = Some(1);
        assert!(!rule.apply(&e, 0).unwrap().applied);
    }

    #[test]
    fn test_amrap_requires_amrap_set() {
        let rule = Progression::Amrap {
            thresholds: vec![RepThreshold {
                min_reps: 1,
                increment: 5.0,
            }],
        };
        let mut e = event(TriggerType::AfterSet);
        e.reps_performed = Some(10);
        // Not flagged AMRAP
        assert!(!rule.apply(&e, 0).unwrap().applied);
    }

    #[test]
    fn test_deload_fires_at_threshold() {
        let rule = Progression::DeloadOnFailure {
            failure_threshold: 3,
            deload: DeloadAmount::Percent { percent: 0.1 },
            reset_counter: true,
        };
        let mut e = event(TriggerType::OnFailure);
        e.current_max = Some(300.0);

        let below = rule.apply(&e, 2).unwrap();
        assert!(!below.applied);

        let at = rule.apply(&e, 3).unwrap();
        assert!(at.applied);
        assert_eq!(at.delta, -30.0);
        assert!(at.reset_failures);
    }

    #[test]
    fn test_deload_fixed_amount() {
        let rule = Progression::DeloadOnFailure {
            failure_threshold: 2,
            deload: DeloadAmount::Fixed { amount: 15.0 },
            reset_counter: false,
        };
        let result = rule.apply(&event(TriggerType::OnFailure), 2).unwrap();
        assert_eq!(result.delta, -15.0);
        assert!(!result.reset_failures);
    }

    fn three_stages() -> Vec<Stage> {
        vec![
            Stage {
                name: "5x3".into(),
                sets: 5,
                reps: 3,
                is_amrap: false,
                min_volume: 15,
            },
            Stage {
                name: "6x2".into(),
                sets: 6,
                reps: 2,
                is_amrap: false,
                min_volume: 12,
            },
            Stage {
                name: "10x1".into(),
                sets: 10,
                reps: 1,
                is_amrap: false,
                min_volume: 10,
            },
        ]
    }

    #[test]
    fn test_stage_advances_on_volume_failure() {
        let rule = Progression::Stage {
            stages: three_stages(),
            reset_on_exhaustion: true,
            deload_on_reset: Some(0.1),
        };
        let mut e = event(TriggerType::OnFailure);
        e.current_stage = Some(0);
        e.session_volume = Some(13); // below 15

        let result = rule.apply(&e, 1).unwrap();
        assert!(result.applied);
        assert_eq!(result.new_stage, Some(1));
        assert_eq!(
            result.new_scheme,
            Some(SetScheme::Fixed { sets: 6, reps: 2 })
        );
        assert_eq!(result.delta, 0.0);
    }

    #[test]
    fn test_stage_volume_met_is_a_no_op() {
        let rule = Progression::Stage {
            stages: three_stages(),
            reset_on_exhaustion: false,
            deload_on_reset: None,
        };
        let mut e = event(TriggerType::OnFailure);
        e.current_stage = Some(0);
        e.session_volume = Some(15);
        assert!(!rule.apply(&e, 1).unwrap().applied);
    }

    #[test]
    fn test_stage_exhaustion_resets_with_deload() {
        let rule = Progression::Stage {
            stages: three_stages(),
            reset_on_exhaustion: true,
            deload_on_reset: Some(0.1),
        };
        let mut e = event(TriggerType::OnFailure);
        e.current_stage = Some(2); // last
        e.session_volume = Some(7); // below 10
        e.current_max = Some(300.0);

        let result = rule.apply(&e, 1).unwrap();
        assert!(result.applied);
        assert_eq!(result.new_stage, Some(0));
        assert_eq!(result.delta, -30.0);
        assert!(result.reset_failures);
    }

    #[test]
    fn test_stage_exhaustion_without_reset_flags_manual() {
        let rule = Progression::Stage {
            stages: three_stages(),
            reset_on_exhaustion: false,
            deload_on_reset: None,
        };
        let mut e = event(TriggerType::OnFailure);
        e.current_stage = Some(2);
        e.session_volume = Some(7);

        let result = rule.apply(&e, 1).unwrap();
        assert!(!result.applied);
        assert!(result.reason.contains("manual intervention"));
    }

    #[test]
    fn test_double_all_sets_policy() {
        let rule = Progression::Double {
            increment: 5.0,
            policy: CeilingPolicy::AllSets,
        };
        let mut e = event(TriggerType::AfterSet);
        e.rep_ceiling = Some(12);
        e.reps_performed = Some(12);

        // Last set hit the ceiling but an earlier one did not
        e.all_sets_at_ceiling = Some(false);
        assert!(!rule.apply(&e, 0).unwrap().applied);

        e.all_sets_at_ceiling = Some(true);
        let result = rule.apply(&e, 0).unwrap();
        assert!(result.applied);
        assert_eq!(result.delta, 5.0);
    }

    #[test]
    fn test_double_any_set_policy() {
        let rule = Progression::Double {
            increment: 5.0,
            policy: CeilingPolicy::AnySet,
        };
        let mut e = event(TriggerType::AfterSet);
        e.rep_ceiling = Some(12);
        e.reps_performed = Some(12);
        e.all_sets_at_ceiling = Some(false);
        assert!(rule.apply(&e, 0).unwrap().applied);
    }

    #[test]
    fn test_cycle_override_beats_default() {
        let mut overrides = HashMap::new();
        overrides.insert("squat".to_string(), 10.0);
        let rule = Progression::Cycle {
            default_increment: 5.0,
            overrides,
        };

        let result = rule.apply(&event(TriggerType::AfterCycle), 0).unwrap();
        assert_eq!(result.delta, 10.0);

        let bench = TriggerEvent::new(TriggerType::AfterCycle, Uuid::new_v4(), "bench");
        assert_eq!(rule.apply(&bench, 0).unwrap().delta, 5.0);
    }

    #[test]
    fn test_validate_rejects_bad_rules() {
        assert!(Progression::Linear {
            increment: 0.0,
            trigger: LinearTrigger::AfterSession
        }
        .validate()
        .is_err());

        assert!(Progression::Amrap { thresholds: vec![] }.validate().is_err());

        assert!(Progression::Amrap {
            thresholds: vec![
                RepThreshold {
                    min_reps: 5,
                    increment: 5.0
                },
                RepThreshold {
                    min_reps: 3,
                    increment: 10.0
                },
            ]
        }
        .validate()
        .is_err());

        assert!(Progression::DeloadOnFailure {
            failure_threshold: 0,
            deload: DeloadAmount::Fixed { amount: 10.0 },
            reset_counter: true
        }
        .validate()
        .is_err());

        assert!(Progression::Stage {
            stages: vec![],
            reset_on_exhaustion: false,
            deload_on_reset: None
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_json_discriminator_round_trip() {
        let json = r#"{
            "type": "deload_on_failure",
            "failure_threshold": 3,
            "deload": {"type": "percent", "percent": 0.1}
        }"#;
        let rule: Progression = serde_json::from_str(json).unwrap();
        assert_eq!(
            rule,
            Progression::DeloadOnFailure {
                failure_threshold: 3,
                deload: DeloadAmount::Percent { percent: 0.1 },
                reset_counter: true
            }
        );
    }
}
