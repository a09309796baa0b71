//! Prescriptions: one load strategy plus one set scheme, bound to a lift.
//!
//! `resolve` composes the two into concrete sets. Variable-count schemes
//! resolve to provisional opening sets only; the session layer feeds each
//! logged set back through `next_set` until the scheme terminates.

use crate::load::{LoadContext, LoadStrategy};
use crate::scheme::{NextSet, SetScheme};
use crate::types::{GeneratedSet, LoggedSet};
use crate::Result;
use serde::{Deserialize, Serialize};

/// A single prescribed exercise within a program day
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Prescription {
    pub id: String,
    pub lift_id: String,
    pub strategy: LoadStrategy,
    pub scheme: SetScheme,
    /// Position within the day; relative loads may only reference earlier
    /// prescriptions' sets
    pub order: u32,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub rest_seconds: Option<u32>,
    /// Index into a stage progression's stage list, when one governs this
    /// prescription's scheme
    #[serde(default)]
    pub current_stage: Option<usize>,
}

/// The concrete output of resolving a prescription
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolvedPrescription {
    pub prescription_id: String,
    pub lift_id: String,
    pub sets: Vec<GeneratedSet>,
    pub notes: Option<String>,
    pub rest_seconds: Option<u32>,
    /// True when further sets arrive one at a time as sets are logged
    pub is_variable: bool,
}

impl Prescription {
    /// Resolve this prescription into concrete sets for the current user
    pub fn resolve(&self, ctx: &LoadContext<'_>) -> Result<ResolvedPrescription> {
        let base_weight = self.strategy.calculate_load(ctx)?;
        let sets = self.scheme.generate_sets(base_weight, &ctx.rounding)?;

        tracing::debug!(
            "Resolved prescription '{}' for lift '{}': {} set(s) at base {}",
            self.id,
            self.lift_id,
            sets.len(),
            base_weight
        );

        Ok(ResolvedPrescription {
            prescription_id: self.id.clone(),
            lift_id: self.lift_id.clone(),
            sets,
            notes: self.notes.clone(),
            rest_seconds: self.rest_seconds,
            is_variable: self.scheme.is_variable_count(),
        })
    }

    /// Next set of a variable-count prescription, given its logged sets
    pub fn next_set(&self, ctx: &LoadContext<'_>, history: &[LoggedSet]) -> Result<NextSet> {
        let base_weight = self.strategy.calculate_load(ctx)?;
        self.scheme.generate_next_set(base_weight, history, &ctx.rounding)
    }

    /// A copy with a stage progression's scheme/stage override applied
    pub fn with_stage(&self, stage: usize, scheme: SetScheme) -> Prescription {
        let mut out = self.clone();
        out.current_stage = Some(stage);
        out.scheme = scheme;
        out
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(crate::Error::Validation("prescription id must not be empty".into()));
        }
        if self.lift_id.is_empty() {
            return Err(crate::Error::Validation(format!(
                "prescription '{}' has no lift",
                self.id
            )));
        }
        self.strategy.validate()?;
        self.scheme.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::MaxLookup;
    use crate::rounding::Rounding;
    use crate::types::{LiftMax, MaxKind, MaxSource};
    use chrono::Utc;
    use uuid::Uuid;

    struct OneMax(f64);

    impl MaxLookup for OneMax {
        fn current_max(&self, user_id: Uuid, lift_id: &str, kind: MaxKind) -> Option<LiftMax> {
            Some(LiftMax {
                user_id,
                lift_id: lift_id.to_string(),
                kind,
                value: self.0,
                effective_date: Utc::now(),
                source: MaxSource::Manual,
            })
        }
    }

    fn ctx(maxes: &OneMax) -> LoadContext<'_> {
        LoadContext {
            user_id: Uuid::nil(),
            lift_id: "bench",
            maxes,
            session: None,
            session_id: None,
            days_to_meet: None,
            rounding: Rounding::default(),
        }
    }

    fn prescription(scheme: SetScheme) -> Prescription {
        Prescription {
            id: "p1".into(),
            lift_id: "bench".into(),
            strategy: LoadStrategy::PercentOf {
                max_kind: MaxKind::TrainingMax,
                percentage: 0.75,
            },
            scheme,
            order: 1,
            notes: None,
            rest_seconds: Some(180),
            current_stage: None,
        }
    }

    #[test]
    fn test_resolve_fixed_scheme() {
        let maxes = OneMax(200.0);
        let resolved = prescription(SetScheme::Fixed { sets: 5, reps: 5 })
            .resolve(&ctx(&maxes))
            .unwrap();

        assert_eq!(resolved.sets.len(), 5);
        assert!(resolved.sets.iter().all(|s| s.weight == 150.0));
        assert!(!resolved.is_variable);
        assert_eq!(resolved.rest_seconds, Some(180));
    }

    #[test]
    fn test_resolve_variable_scheme_is_provisional() {
        let maxes = OneMax(200.0);
        let resolved = prescription(SetScheme::TotalReps {
            target_total_reps: 50,
            max_sets: 10,
        })
        .resolve(&ctx(&maxes))
        .unwrap();

        assert!(resolved.is_variable);
        assert_eq!(resolved.sets.len(), 1);
        assert!(resolved.sets[0].is_provisional);
    }

    #[test]
    fn test_with_stage_override() {
        let p = prescription(SetScheme::Fixed { sets: 5, reps: 3 });
        let staged = p.with_stage(1, SetScheme::Fixed { sets: 6, reps: 2 });
        assert_eq!(staged.current_stage, Some(1));
        assert_eq!(staged.scheme, SetScheme::Fixed { sets: 6, reps: 2 });
        // Original untouched
        assert_eq!(p.current_stage, None);
    }

    #[test]
    fn test_validate_composes() {
        let mut p = prescription(SetScheme::Fixed { sets: 5, reps: 5 });
        assert!(p.validate().is_ok());

        p.scheme = SetScheme::Fixed { sets: 0, reps: 5 };
        assert!(p.validate().is_err());

        p.scheme = SetScheme::Fixed { sets: 5, reps: 5 };
        p.strategy = LoadStrategy::PercentOf {
            max_kind: MaxKind::TrainingMax,
            percentage: -1.0,
        };
        assert!(p.validate().is_err());
    }
}
