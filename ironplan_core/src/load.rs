//! Load strategies: how the base weight for a lift is computed.
//!
//! A strategy turns a user's recorded maxes (and sometimes the current
//! session's already-logged sets) into a concrete weight. Strategies are a
//! closed set of tagged variants so JSON round-trips stay exhaustive:
//! `{"type": "percent_of", "max_kind": "training_max", "percentage": 0.85}`.

use crate::rounding::Rounding;
use crate::types::{LiftMax, LoggedSet, MaxKind};
use crate::{rpe, Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Capability to look up a user's current max for a lift
pub trait MaxLookup {
    fn current_max(&self, user_id: Uuid, lift_id: &str, kind: MaxKind) -> Option<LiftMax>;
}

/// Capability to look up an already-logged set in a session
pub trait SessionLookup {
    fn logged_set(&self, session_id: Uuid, lift_id: &str, set_number: u32) -> Option<LoggedSet>;
}

/// Everything a strategy may need to compute a load
pub struct LoadContext<'a> {
    pub user_id: Uuid,
    pub lift_id: &'a str,
    pub maxes: &'a dyn MaxLookup,
    /// Current session's logged sets, when resolving mid-session
    pub session: Option<&'a dyn SessionLookup>,
    pub session_id: Option<Uuid>,
    /// Days until the configured meet, when one exists
    pub days_to_meet: Option<i64>,
    pub rounding: Rounding,
}

/// One point on a taper curve: at `days_out` or fewer days before the
/// meet, multiply the load by `multiplier`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TaperPoint {
    pub days_out: u32,
    pub multiplier: f64,
}

fn default_taper_curve() -> Vec<TaperPoint> {
    vec![
        TaperPoint {
            days_out: 6,
            multiplier: 0.85,
        },
        TaperPoint {
            days_out: 13,
            multiplier: 0.90,
        },
        TaperPoint {
            days_out: 21,
            multiplier: 0.95,
        },
    ]
}

/// Load calculation strategy for a prescription
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadStrategy {
    /// Percentage of a recorded max
    PercentOf { max_kind: MaxKind, percentage: f64 },
    /// RPE-chart percentage of the recorded 1RM
    RpeTarget { target_reps: u32, target_rpe: f64 },
    /// No prescribed weight; the user works up to an n-rep max
    FindRm { target_reps: u32 },
    /// Percentage of a set already logged earlier in the same session
    RelativeTo {
        reference_set: u32,
        percentage: f64,
    },
    /// Wraps another strategy, scaling its output by how close the meet is
    Taper {
        base: Box<LoadStrategy>,
        #[serde(default = "default_taper_curve")]
        curve: Vec<TaperPoint>,
    },
}

impl LoadStrategy {
    /// Compute the base weight for this strategy.
    ///
    /// Returns 0.0 for [`LoadStrategy::FindRm`]; callers render that as
    /// "no prescribed weight" rather than an actual zero.
    pub fn calculate_load(&self, ctx: &LoadContext<'_>) -> Result<f64> {
        match self {
            LoadStrategy::PercentOf {
                max_kind,
                percentage,
            } => {
                let max = ctx
                    .maxes
                    .current_max(ctx.user_id, ctx.lift_id, *max_kind)
                    .ok_or_else(|| {
                        Error::NotFound(format!(
                            "no {} recorded for lift '{}'",
                            max_kind, ctx.lift_id
                        ))
                    })?;
                let weight = ctx.rounding.apply(max.value * percentage)?;
                tracing::debug!(
                    "PercentOf: {:.0}% of {} {} = {}",
                    percentage * 100.0,
                    max.value,
                    max_kind,
                    weight
                );
                Ok(weight)
            }

            LoadStrategy::RpeTarget {
                target_reps,
                target_rpe,
            } => {
                let one_rm = ctx
                    .maxes
                    .current_max(ctx.user_id, ctx.lift_id, MaxKind::OneRm)
                    .ok_or_else(|| {
                        Error::NotFound(format!(
                            "no one_rm recorded for lift '{}'",
                            ctx.lift_id
                        ))
                    })?;
                let pct = rpe::percentage(*target_reps, *target_rpe)?;
                let weight = ctx.rounding.apply(one_rm.value * pct)?;
                tracing::debug!(
                    "RpeTarget: {} reps @ RPE {} -> {:.1}% of {} = {}",
                    target_reps,
                    target_rpe,
                    pct * 100.0,
                    one_rm.value,
                    weight
                );
                Ok(weight)
            }

            LoadStrategy::FindRm { target_reps } => {
                tracing::debug!("FindRm: user finds their {}RM, no prescribed weight", target_reps);
                Ok(0.0)
            }

            LoadStrategy::RelativeTo {
                reference_set,
                percentage,
            } => {
                let (session, session_id) = match (ctx.session, ctx.session_id) {
                    (Some(s), Some(id)) => (s, id),
                    _ => {
                        return Err(Error::Dependency(format!(
                            "relative load for lift '{}' requires an in-progress session",
                            ctx.lift_id
                        )))
                    }
                };
                let reference = session
                    .logged_set(session_id, ctx.lift_id, *reference_set)
                    .ok_or_else(|| {
                        Error::Dependency(format!(
                            "set {} of lift '{}' not yet logged in session {}",
                            reference_set, ctx.lift_id, session_id
                        ))
                    })?;
                let weight = ctx.rounding.apply(reference.weight * percentage)?;
                tracing::debug!(
                    "RelativeTo: {:.0}% of set {} ({}) = {}",
                    percentage * 100.0,
                    reference_set,
                    reference.weight,
                    weight
                );
                Ok(weight)
            }

            LoadStrategy::Taper { base, curve } => {
                let base_weight = base.calculate_load(ctx)?;
                if base_weight == 0.0 {
                    return Ok(0.0);
                }
                let multiplier = taper_multiplier(curve, ctx.days_to_meet);
                if (multiplier - 1.0).abs() < 1e-9 {
                    return Ok(base_weight);
                }
                let weight = ctx.rounding.apply(base_weight * multiplier)?;
                tracing::debug!(
                    "Taper: {} days out, multiplier {:.2}, {} -> {}",
                    ctx.days_to_meet.unwrap_or(i64::MAX),
                    multiplier,
                    base_weight,
                    weight
                );
                Ok(weight)
            }
        }
    }

    /// Check the strategy's parameters without computing anything
    pub fn validate(&self) -> Result<()> {
        match self {
            LoadStrategy::PercentOf { percentage, .. } => {
                if *percentage <= 0.0 || *percentage > 1.5 {
                    return Err(Error::Validation(format!(
                        "percent_of percentage must be in (0, 1.5], got {}",
                        percentage
                    )));
                }
                Ok(())
            }
            LoadStrategy::RpeTarget {
                target_reps,
                target_rpe,
            } => rpe::percentage(*target_reps, *target_rpe).map(|_| ()),
            LoadStrategy::FindRm { target_reps } => {
                if *target_reps == 0 {
                    return Err(Error::Validation("find_rm target_reps must be >= 1".into()));
                }
                Ok(())
            }
            LoadStrategy::RelativeTo {
                reference_set,
                percentage,
            } => {
                if *reference_set == 0 {
                    return Err(Error::Validation(
                        "relative_to reference_set must be >= 1".into(),
                    ));
                }
                if *percentage <= 0.0 || *percentage > 1.5 {
                    return Err(Error::Validation(format!(
                        "relative_to percentage must be in (0, 1.5], got {}",
                        percentage
                    )));
                }
                Ok(())
            }
            LoadStrategy::Taper { base, curve } => {
                base.validate()?;
                if matches!(**base, LoadStrategy::Taper { .. }) {
                    return Err(Error::Validation("taper cannot wrap another taper".into()));
                }
                if curve.is_empty() {
                    return Err(Error::Validation("taper curve must not be empty".into()));
                }
                let mut last_days = None;
                for point in curve {
                    if point.multiplier <= 0.0 || point.multiplier > 1.0 {
                        return Err(Error::Validation(format!(
                            "taper multiplier must be in (0, 1], got {}",
                            point.multiplier
                        )));
                    }
                    if let Some(prev) = last_days {
                        if point.days_out <= prev {
                            return Err(Error::Validation(
                                "taper curve days_out must be strictly increasing".into(),
                            ));
                        }
                    }
                    last_days = Some(point.days_out);
                }
                Ok(())
            }
        }
    }

    /// True when the strategy prescribes no weight of its own
    pub fn is_unprescribed(&self) -> bool {
        matches!(self, LoadStrategy::FindRm { .. })
    }
}

/// Pick the multiplier for the given days-to-meet. Past the last curve
/// point (or with no meet configured) the load is untouched.
fn taper_multiplier(curve: &[TaperPoint], days_to_meet: Option<i64>) -> f64 {
    let days = match days_to_meet {
        Some(d) => d.max(0) as u32,
        None => return 1.0,
    };
    for point in curve {
        if days <= point.days_out {
            return point.multiplier;
        }
    }
    1.0
}
