//! Built-in catalog of lifts and program definitions.
//!
//! Program authoring lives outside this system; the catalog ships a small
//! set of complete programs that exercise every load strategy, set
//! scheme, and progression rule the engine supports.

use crate::load::{LoadStrategy, TaperPoint};
use crate::prescription::Prescription;
use crate::progression::{
    CeilingPolicy, DeloadAmount, LinearTrigger, Progression, RepThreshold, Stage,
};
use crate::scheme::SetScheme;
use crate::types::{MaxKind, ScheduleType};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// A barbell or bodyweight lift
#[derive(Clone, Debug)]
pub struct Lift {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
}

/// One training day: an ordered list of prescriptions
#[derive(Clone, Debug)]
pub struct ProgramDay {
    pub name: String,
    pub prescriptions: Vec<Prescription>,
}

/// A progression rule bound to a lift within a program
#[derive(Clone, Debug)]
pub struct ProgressionBinding {
    pub id: String,
    pub lift_id: String,
    pub rule: Progression,
}

/// A complete program definition
#[derive(Clone, Debug)]
pub struct ProgramDefinition {
    pub id: String,
    pub name: String,
    pub weeks_per_cycle: u32,
    /// The week's days, repeated each week of the cycle
    pub days: Vec<ProgramDay>,
    pub progressions: Vec<ProgressionBinding>,
    pub schedule: ScheduleType,
}

impl ProgramDefinition {
    pub fn days_per_week(&self) -> u32 {
        self.days.len() as u32
    }

    /// The day's prescriptions, `day_index` 1-based, ordered for resolution
    pub fn day(&self, day_index: u32) -> Option<&ProgramDay> {
        self.days.get(day_index.saturating_sub(1) as usize)
    }

    /// Progression rules bound to a lift
    pub fn progressions_for(&self, lift_id: &str) -> Vec<&ProgressionBinding> {
        self.progressions
            .iter()
            .filter(|b| b.lift_id == lift_id)
            .collect()
    }

    pub fn find_prescription(&self, prescription_id: &str) -> Option<&Prescription> {
        self.days
            .iter()
            .flat_map(|d| d.prescriptions.iter())
            .find(|p| p.id == prescription_id)
    }
}

/// The complete catalog of lifts and programs
#[derive(Clone, Debug)]
pub struct Catalog {
    pub lifts: HashMap<String, Lift>,
    pub programs: HashMap<String, ProgramDefinition>,
}

/// Cached default catalog, built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

fn lift(id: &str, name: &str, tags: &[&str]) -> (String, Lift) {
    (
        id.to_string(),
        Lift {
            id: id.to_string(),
            name: name.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        },
    )
}

fn prescription(
    id: &str,
    lift_id: &str,
    order: u32,
    strategy: LoadStrategy,
    scheme: SetScheme,
    rest_seconds: Option<u32>,
) -> Prescription {
    Prescription {
        id: id.to_string(),
        lift_id: lift_id.to_string(),
        strategy,
        scheme,
        order,
        notes: None,
        rest_seconds,
        current_stage: None,
    }
}

/// Cycle increments for the wave program: +5 upper, +10 lower
fn wave_cycle_rule() -> Progression {
    Progression::Cycle {
        default_increment: 5.0,
        overrides: [("squat".to_string(), 10.0), ("deadlift".to_string(), 10.0)]
            .into_iter()
            .collect(),
    }
}

/// Builds the default catalog with built-in lifts and programs
pub fn build_default_catalog() -> Catalog {
    let lifts: HashMap<String, Lift> = [
        lift("squat", "Back Squat", &["lower", "knee_dominant"]),
        lift("bench", "Bench Press", &["upper", "push"]),
        lift("deadlift", "Deadlift", &["lower", "hinge"]),
        lift("press", "Overhead Press", &["upper", "push"]),
        lift("chinup", "Chin-up", &["upper", "pull", "bodyweight"]),
    ]
    .into_iter()
    .collect();

    let mut programs = HashMap::new();

    // ========================================================================
    // Linear: fixed work at the training max, add weight every session
    // ========================================================================
    programs.insert(
        "linear_base".to_string(),
        ProgramDefinition {
            id: "linear_base".into(),
            name: "Linear Base".into(),
            weeks_per_cycle: 4,
            schedule: ScheduleType::Weekly,
            days: vec![
                ProgramDay {
                    name: "Day A".into(),
                    prescriptions: vec![
                        prescription(
                            "linear_squat",
                            "squat",
                            1,
                            LoadStrategy::PercentOf {
                                max_kind: MaxKind::TrainingMax,
                                percentage: 1.0,
                            },
                            SetScheme::Fixed { sets: 3, reps: 5 },
                            Some(180),
                        ),
                        prescription(
                            "linear_bench",
                            "bench",
                            2,
                            LoadStrategy::PercentOf {
                                max_kind: MaxKind::TrainingMax,
                                percentage: 0.9,
                            },
                            SetScheme::RepRange {
                                sets: 3,
                                min_reps: 8,
                                max_reps: 12,
                            },
                            Some(120),
                        ),
                        prescription(
                            "linear_chinup",
                            "chinup",
                            3,
                            LoadStrategy::FindRm { target_reps: 8 },
                            SetScheme::TotalReps {
                                target_total_reps: 30,
                                max_sets: 8,
                            },
                            Some(90),
                        ),
                    ],
                },
                ProgramDay {
                    name: "Day B".into(),
                    prescriptions: vec![
                        prescription(
                            "linear_deadlift",
                            "deadlift",
                            1,
                            LoadStrategy::PercentOf {
                                max_kind: MaxKind::TrainingMax,
                                percentage: 1.0,
                            },
                            SetScheme::Fixed { sets: 1, reps: 5 },
                            Some(240),
                        ),
                        prescription(
                            "linear_press",
                            "press",
                            2,
                            LoadStrategy::PercentOf {
                                max_kind: MaxKind::TrainingMax,
                                percentage: 1.0,
                            },
                            SetScheme::Fixed { sets: 3, reps: 5 },
                            Some(180),
                        ),
                    ],
                },
            ],
            progressions: vec![
                ProgressionBinding {
                    id: "linear_squat_add".into(),
                    lift_id: "squat".into(),
                    rule: Progression::Linear {
                        increment: 5.0,
                        trigger: LinearTrigger::AfterSession,
                    },
                },
                ProgressionBinding {
                    id: "linear_press_add".into(),
                    lift_id: "press".into(),
                    rule: Progression::Linear {
                        increment: 2.5,
                        trigger: LinearTrigger::AfterWeek,
                    },
                },
                ProgressionBinding {
                    id: "linear_bench_double".into(),
                    lift_id: "bench".into(),
                    rule: Progression::Double {
                        increment: 5.0,
                        policy: CeilingPolicy::AllSets,
                    },
                },
                ProgressionBinding {
                    id: "linear_squat_deload".into(),
                    lift_id: "squat".into(),
                    rule: Progression::DeloadOnFailure {
                        failure_threshold: 3,
                        deload: DeloadAmount::Percent { percent: 0.1 },
                        reset_counter: true,
                    },
                },
            ],
        },
    );

    // ========================================================================
    // Wave: percentage waves with AMRAP top sets, cycle increments
    // ========================================================================
    programs.insert(
        "wave_amrap".to_string(),
        ProgramDefinition {
            id: "wave_amrap".into(),
            name: "AMRAP Wave".into(),
            weeks_per_cycle: 3,
            schedule: ScheduleType::Weekly,
            days: vec![
                ProgramDay {
                    name: "Squat".into(),
                    prescriptions: vec![prescription(
                        "wave_squat",
                        "squat",
                        1,
                        LoadStrategy::PercentOf {
                            max_kind: MaxKind::TrainingMax,
                            percentage: 0.85,
                        },
                        SetScheme::Amrap { sets: 3, reps: 5 },
                        Some(180),
                    )],
                },
                ProgramDay {
                    name: "Bench".into(),
                    prescriptions: vec![prescription(
                        "wave_bench",
                        "bench",
                        1,
                        LoadStrategy::PercentOf {
                            max_kind: MaxKind::TrainingMax,
                            percentage: 0.85,
                        },
                        SetScheme::Amrap { sets: 3, reps: 5 },
                        Some(180),
                    )],
                },
                ProgramDay {
                    name: "Deadlift".into(),
                    prescriptions: vec![prescription(
                        "wave_deadlift",
                        "deadlift",
                        1,
                        LoadStrategy::PercentOf {
                            max_kind: MaxKind::TrainingMax,
                            percentage: 0.85,
                        },
                        SetScheme::Amrap { sets: 3, reps: 5 },
                        Some(240),
                    )],
                },
            ],
            progressions: vec![
                ProgressionBinding {
                    id: "wave_squat_amrap".into(),
                    lift_id: "squat".into(),
                    rule: Progression::Amrap {
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
                    },
                },
                ProgressionBinding {
                    id: "wave_squat_cycle".into(),
                    lift_id: "squat".into(),
                    rule: wave_cycle_rule(),
                },
                ProgressionBinding {
                    id: "wave_bench_cycle".into(),
                    lift_id: "bench".into(),
                    rule: wave_cycle_rule(),
                },
                ProgressionBinding {
                    id: "wave_deadlift_cycle".into(),
                    lift_id: "deadlift".into(),
                    rule: wave_cycle_rule(),
                },
            ],
        },
    );

    // ========================================================================
    // Autoregulated meet prep: RPE loads, fatigue drops, MRS, taper
    // ========================================================================
    programs.insert(
        "autoreg_meet".to_string(),
        ProgramDefinition {
            id: "autoreg_meet".into(),
            name: "Autoregulated Meet Prep".into(),
            weeks_per_cycle: 4,
            schedule: ScheduleType::MeetPrep,
            days: vec![
                ProgramDay {
                    name: "Squat + Bench Volume".into(),
                    prescriptions: vec![
                        prescription(
                            "meet_squat_top",
                            "squat",
                            1,
                            LoadStrategy::Taper {
                                base: Box::new(LoadStrategy::RpeTarget {
                                    target_reps: 5,
                                    target_rpe: 8.0,
                                }),
                                curve: vec![
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
                                ],
                            },
                            SetScheme::FatigueDrop {
                                reps: 5,
                                drop_percent: 0.05,
                                stop_rpe: 9.0,
                                max_sets: 6,
                            },
                            Some(240),
                        ),
                        prescription(
                            "meet_bench_mrs",
                            "bench",
                            2,
                            LoadStrategy::PercentOf {
                                max_kind: MaxKind::E1Rm,
                                percentage: 0.7,
                            },
                            SetScheme::Mrs {
                                target_total_reps: 25,
                                min_reps_per_set: 3,
                                number_of_blocks: 3,
                                max_sets: 6,
                            },
                            Some(150),
                        ),
                    ],
                },
                ProgramDay {
                    name: "Deadlift Test".into(),
                    prescriptions: vec![
                        prescription(
                            "meet_deadlift_rm",
                            "deadlift",
                            1,
                            LoadStrategy::FindRm { target_reps: 3 },
                            SetScheme::Ramp {
                                sets: 4,
                                reps: 3,
                                start_percent: 0.6,
                            },
                            Some(240),
                        ),
                        prescription(
                            "meet_deadlift_backoff",
                            "deadlift",
                            2,
                            LoadStrategy::RelativeTo {
                                reference_set: 4,
                                percentage: 0.85,
                            },
                            SetScheme::Fixed { sets: 3, reps: 3 },
                            Some(180),
                        ),
                        prescription(
                            "meet_press_stage",
                            "press",
                            3,
                            LoadStrategy::PercentOf {
                                max_kind: MaxKind::TrainingMax,
                                percentage: 0.9,
                            },
                            SetScheme::Fixed { sets: 5, reps: 3 },
                            Some(120),
                        ),
                    ],
                },
            ],
            progressions: vec![ProgressionBinding {
                id: "meet_press_stages".into(),
                lift_id: "press".into(),
                rule: Progression::Stage {
                    stages: vec![
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
                    ],
                    reset_on_exhaustion: true,
                    deload_on_reset: Some(0.1),
                },
            }],
        },
    );

    Catalog { lifts, programs }
}

impl Catalog {
    /// Validate the catalog for consistency and completeness
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (id, l) in &self.lifts {
            if id.is_empty() || l.id.is_empty() {
                errors.push("Lift has empty ID".to_string());
            }
            if id != &l.id {
                errors.push(format!("Lift key '{}' doesn't match lift.id '{}'", id, l.id));
            }
            if l.name.is_empty() {
                errors.push(format!("Lift '{}' has empty name", id));
            }
        }

        for (id, program) in &self.programs {
            if id != &program.id {
                errors.push(format!(
                    "Program key '{}' doesn't match program.id '{}'",
                    id, program.id
                ));
            }
            if program.weeks_per_cycle == 0 {
                errors.push(format!("Program '{}' has zero weeks per cycle", id));
            }
            if program.days.is_empty() {
                errors.push(format!("Program '{}' has no days", id));
            }

            let mut prescription_ids = std::collections::HashSet::new();
            for day in &program.days {
                let mut last_order = 0;
                for p in &day.prescriptions {
                    if !prescription_ids.insert(p.id.clone()) {
                        errors.push(format!(
                            "Program '{}' has duplicate prescription id '{}'",
                            id, p.id
                        ));
                    }
                    if !self.lifts.contains_key(&p.lift_id) {
                        errors.push(format!(
                            "Prescription '{}' references non-existent lift '{}'",
                            p.id, p.lift_id
                        ));
                    }
                    if p.order <= last_order {
                        errors.push(format!(
                            "Prescription '{}' order {} not ascending within day '{}'",
                            p.id, p.order, day.name
                        ));
                    }
                    last_order = p.order;

                    if let Err(e) = p.validate() {
                        errors.push(format!("Prescription '{}' invalid: {}", p.id, e));
                    }

                    // A relative load must reference a set of an earlier
                    // prescription for the same lift on the same day
                    if let LoadStrategy::RelativeTo { .. } = p.strategy {
                        let has_earlier = day
                            .prescriptions
                            .iter()
                            .any(|q| q.lift_id == p.lift_id && q.order < p.order);
                        if !has_earlier {
                            errors.push(format!(
                                "Prescription '{}' resolves relative to a set no earlier \
                                 prescription can log",
                                p.id
                            ));
                        }
                    }
                }
            }

            let mut binding_ids = std::collections::HashSet::new();
            for binding in &program.progressions {
                if !binding_ids.insert(binding.id.clone()) {
                    errors.push(format!(
                        "Program '{}' has duplicate progression id '{}'",
                        id, binding.id
                    ));
                }
                if !self.lifts.contains_key(&binding.lift_id) {
                    errors.push(format!(
                        "Progression '{}' references non-existent lift '{}'",
                        binding.id, binding.lift_id
                    ));
                }
                if let Err(e) = binding.rule.validate() {
                    errors.push(format!("Progression '{}' invalid: {}", binding.id, e));
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_validates() {
        let catalog = build_default_catalog();
        let errors = catalog.validate();
        assert!(
            errors.is_empty(),
            "Default catalog has validation errors: {:?}",
            errors
        );
    }

    #[test]
    fn test_catalog_loads() {
        let catalog = build_default_catalog();
        assert_eq!(catalog.lifts.len(), 5);
        assert_eq!(catalog.programs.len(), 3);
    }

    #[test]
    fn test_all_referenced_lifts_exist() {
        let catalog = build_default_catalog();
        for program in catalog.programs.values() {
            for day in &program.days {
                for p in &day.prescriptions {
                    assert!(
                        catalog.lifts.contains_key(&p.lift_id),
                        "Lift {} referenced but not found",
                        p.lift_id
                    );
                }
            }
        }
    }

    #[test]
    fn test_day_lookup_is_one_based() {
        let catalog = build_default_catalog();
        let program = &catalog.programs["linear_base"];
        assert_eq!(program.day(1).unwrap().name, "Day A");
        assert_eq!(program.day(2).unwrap().name, "Day B");
        assert!(program.day(3).is_none());
        assert!(program.day(0).is_none());
    }

    #[test]
    fn test_progressions_for_lift() {
        let catalog = build_default_catalog();
        let program = &catalog.programs["linear_base"];
        let squat_rules = program.progressions_for("squat");
        assert_eq!(squat_rules.len(), 2);
    }

    #[test]
    fn test_validate_catches_dangling_lift() {
        let mut catalog = build_default_catalog();
        let program = catalog.programs.get_mut("linear_base").unwrap();
        program.days[0].prescriptions[0].lift_id = "nonexistent".into();

        let errors = catalog.validate();
        assert!(errors.iter().any(|e| e.contains("non-existent lift")));
    }

    #[test]
    fn test_validate_catches_misordered_relative_load() {
        let mut catalog = build_default_catalog();
        let program = catalog.programs.get_mut("autoreg_meet").unwrap();
        // Point the backoff at a lift with no earlier prescription that day
        let day = &mut program.days[1];
        day.prescriptions[1].lift_id = "squat".into();

        let errors = catalog.validate();
        assert!(errors.iter().any(|e| e.contains("relative")));
    }
}
