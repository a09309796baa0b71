//! Progression dispatcher: maps state events to rule evaluation.
//!
//! Subscribes to the event bus and, per event, builds trigger events for
//! the program's progression rules, consults the failure ledger and the
//! idempotency ledger, applies each rule, and persists the outcome as a
//! new max entry or a prescription stage override. Rule failures are
//! logged and isolated per rule; they never roll back the state
//! transition that produced the event.

use crate::catalog::{ProgramDefinition, ProgressionBinding};
use crate::events::{EventBus, EventType, StateEvent};
use crate::history::SessionSets;
use crate::load::{LoadStrategy, MaxLookup};
use crate::progression::{ProgressionResult, TriggerEvent, TriggerType};
use crate::scheme::{evaluate_termination, SetScheme, TerminationContext};
use crate::store::{AthleteState, StageOverride};
use crate::types::{LoggedSet, MaxKind, MaxSource};
use crate::{rpe, Error, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// One rule's outcome for one event, for callers that display results
#[derive(Clone, Debug)]
pub struct AppliedProgression {
    pub progression_id: String,
    pub lift_id: String,
    pub result: ProgressionResult,
}

/// The bus subscriber that runs progression rules
pub struct ProgressionDispatcher {
    program: ProgramDefinition,
    state_path: PathBuf,
    setlog_path: PathBuf,
}

/// The max kind a progression delta lands on: the one the prescription's
/// load strategy reads.
fn target_max_kind(strategy: &LoadStrategy) -> MaxKind {
    match strategy {
        LoadStrategy::PercentOf { max_kind, .. } => *max_kind,
        LoadStrategy::RpeTarget { .. } => MaxKind::OneRm,
        LoadStrategy::Taper { base, .. } => target_max_kind(base),
        _ => MaxKind::TrainingMax,
    }
}

impl ProgressionDispatcher {
    pub fn new(
        program: ProgramDefinition,
        state_path: impl Into<PathBuf>,
        setlog_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program,
            state_path: state_path.into(),
            setlog_path: setlog_path.into(),
        }
    }

    /// Subscribe this dispatcher to every event type it reacts to
    pub fn register(self: Arc<Self>, bus: &EventBus) {
        let dispatcher = self;
        bus.subscribe_all(
            &[
                EventType::SetLogged,
                EventType::WorkoutCompleted,
                EventType::WeekCompleted,
                EventType::CycleCompleted,
            ],
            Arc::new(move |event| dispatcher.handle_event(event).map(|_| ())),
        );
    }

    /// Evaluate an event against the program's progression rules
    pub fn handle_event(&self, event: &StateEvent) -> Result<Vec<AppliedProgression>> {
        self.handle_event_with(event, false)
    }

    /// Same, with an administrative force flag that bypasses the
    /// idempotency ledger
    pub fn handle_event_with(
        &self,
        event: &StateEvent,
        force: bool,
    ) -> Result<Vec<AppliedProgression>> {
        match event.event_type {
            EventType::SetLogged => self.handle_set_logged(event, force),
            EventType::WorkoutCompleted => {
                self.handle_period(event, TriggerType::AfterSession, self.lifts_for_day(event), force)
            }
            EventType::WeekCompleted => {
                self.handle_period(event, TriggerType::AfterWeek, self.all_lifts(), force)
            }
            EventType::CycleCompleted => {
                self.handle_period(event, TriggerType::AfterCycle, self.all_lifts(), force)
            }
            _ => Ok(Vec::new()),
        }
    }

    fn handle_set_logged(
        &self,
        event: &StateEvent,
        force: bool,
    ) -> Result<Vec<AppliedProgression>> {
        let set = event
            .payload
            .set
            .as_ref()
            .ok_or_else(|| Error::Validation("set_logged event carries no set".into()))?
            .clone();

        let all_sets = crate::setlog::read_sets(&self.setlog_path)?;
        let session_sets = SessionSets::for_session(&all_sets, set.session_id);
        let history = session_sets.for_prescription(&set.prescription_id);

        let prescription = self.program.find_prescription(&set.prescription_id);
        let mut outcomes = Vec::new();

        AthleteState::update(&self.state_path, |state| {
            // One estimate per event, re-deliveries included
            if set.rpe.is_some() && state.mark_applied("e1rm_estimate", event.event_id) {
                record_estimated_max(state, &set);
            }

            // The stage override, when one exists, is the scheme actually
            // being performed
            let override_entry = state.stage_overrides.get(&set.prescription_id).cloned();
            let scheme = override_entry
                .as_ref()
                .map(|o| o.scheme.clone())
                .or_else(|| prescription.map(|p| p.scheme.clone()));
            let current_stage = override_entry
                .map(|o| o.stage)
                .or_else(|| prescription.and_then(|p| p.current_stage));

            let complete = scheme
                .as_ref()
                .map(|s| prescription_complete(s, &history))
                .unwrap_or(false);
            let rep_ceiling = scheme.as_ref().and_then(|s| s.rep_ceiling());
            let session_volume: u32 = history.iter().map(|s| s.reps_performed).sum();
            let all_at_ceiling = complete
                && rep_ceiling
                    .map(|c| history.iter().all(|s| s.reps_performed >= c))
                    .unwrap_or(false);

            let max_kind = prescription
                .map(|p| target_max_kind(&p.strategy))
                .unwrap_or(MaxKind::TrainingMax);
            let current_max = state
                .current_max(event.user_id, &set.lift_id, max_kind)
                .map(|m| m.value);

            let mut trigger = TriggerEvent::new(TriggerType::AfterSet, event.user_id, &*set.lift_id);
            trigger.event_id = event.event_id;
            trigger.prescription_id = Some(set.prescription_id.clone());
            trigger.reps_performed = Some(set.reps_performed);
            trigger.target_reps = Some(set.target_reps);
            trigger.rep_ceiling = rep_ceiling;
            trigger.is_amrap = set.is_amrap;
            trigger.rpe = set.rpe;
            trigger.session_volume = Some(session_volume);
            trigger.all_sets_at_ceiling = Some(all_at_ceiling);
            trigger.current_stage = current_stage;
            trigger.current_max = current_max;
            trigger.occurred_at = event.occurred_at;
            trigger.force = force;

            let bindings = self.program.progressions_for(&set.lift_id);

            for binding in &bindings {
                if binding.rule.trigger_type() == TriggerType::AfterSet {
                    apply_binding(state, binding, &trigger, 0, max_kind, &mut outcomes);
                }
            }

            // Failure or success is judged once, when the prescription's
            // sets are all in
            if complete {
                let failed = history.iter().any(|s| s.reps_performed < s.target_reps);
                for binding in &bindings {
                    if binding.rule.trigger_type() != TriggerType::OnFailure {
                        continue;
                    }
                    if failed {
                        let count = state.failures.record_failure(
                            event.user_id,
                            &set.lift_id,
                            &binding.id,
                            event.occurred_at,
                        );
                        let mut failure_trigger = trigger.clone();
                        failure_trigger.trigger = TriggerType::OnFailure;
                        apply_binding(state, binding, &failure_trigger, count, max_kind, &mut outcomes);
                    } else {
                        state.failures.record_success(&set.lift_id, &binding.id);
                    }
                }
            }

            Ok(())
        })?;

        Ok(outcomes)
    }

    fn handle_period(
        &self,
        event: &StateEvent,
        trigger_type: TriggerType,
        lifts: Vec<String>,
        force: bool,
    ) -> Result<Vec<AppliedProgression>> {
        let mut outcomes = Vec::new();

        AthleteState::update(&self.state_path, |state| {
            for lift_id in &lifts {
                for binding in self.program.progressions_for(lift_id) {
                    if binding.rule.trigger_type() != trigger_type {
                        continue;
                    }

                    let max_kind = self.program_target_kind(lift_id);
                    let mut trigger =
                        TriggerEvent::new(trigger_type, event.user_id, lift_id.clone());
                    trigger.event_id = event.event_id;
                    trigger.current_max = state
                        .current_max(event.user_id, lift_id, max_kind)
                        .map(|m| m.value);
                    trigger.occurred_at = event.occurred_at;
                    trigger.force = force;

                    apply_binding(state, binding, &trigger, 0, max_kind, &mut outcomes);
                }
            }
            Ok(())
        })?;

        Ok(outcomes)
    }

    /// Lifts trained on the day the event describes
    fn lifts_for_day(&self, event: &StateEvent) -> Vec<String> {
        let day = event
            .payload
            .day_index
            .and_then(|idx| self.program.day(idx));
        match day {
            Some(day) => unique_lifts(day.prescriptions.iter().map(|p| p.lift_id.clone())),
            None => Vec::new(),
        }
    }

    /// Every lift the program trains
    fn all_lifts(&self) -> Vec<String> {
        unique_lifts(
            self.program
                .days
                .iter()
                .flat_map(|d| d.prescriptions.iter().map(|p| p.lift_id.clone())),
        )
    }

    /// The max kind progressions for this lift land on, derived from the
    /// lift's first prescription in the program
    fn program_target_kind(&self, lift_id: &str) -> MaxKind {
        self.program
            .days
            .iter()
            .flat_map(|d| d.prescriptions.iter())
            .find(|p| p.lift_id == lift_id)
            .map(|p| target_max_kind(&p.strategy))
            .unwrap_or(MaxKind::TrainingMax)
    }
}

fn unique_lifts(iter: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    iter.filter(|l| seen.insert(l.clone())).collect()
}

/// A fixed scheme is complete once its prescribed sets are logged; a
/// variable one once a termination condition fires.
fn prescription_complete(scheme: &SetScheme, history: &[LoggedSet]) -> bool {
    if let Some(count) = scheme.work_set_count() {
        return history.len() as u32 >= count;
    }
    let ctx = TerminationContext::from_history(history);
    evaluate_termination(&scheme.termination_conditions(), &ctx).is_some()
}

/// Sets logged with an RPE feed the athlete's estimated 1RM
fn record_estimated_max(state: &mut AthleteState, set: &LoggedSet) {
    let rpe_value = match set.rpe {
        Some(r) => r,
        None => return,
    };
    match rpe::estimate_one_rm(set.weight, set.reps_performed, rpe_value) {
        Ok(e1rm) => {
            state.record_max(crate::types::LiftMax {
                user_id: set.user_id,
                lift_id: set.lift_id.clone(),
                kind: MaxKind::E1Rm,
                value: e1rm,
                effective_date: set.created_at,
                source: MaxSource::Estimated,
            });
        }
        Err(e) => {
            tracing::debug!(
                "Set {} not usable for an estimated max: {}",
                set.id,
                e
            );
        }
    }
}

/// Apply one rule, honoring the idempotency ledger and persisting what
/// it asks for. Errors are logged and swallowed so one rule can never
/// block another.
fn apply_binding(
    state: &mut AthleteState,
    binding: &ProgressionBinding,
    trigger: &TriggerEvent,
    consecutive_failures: u32,
    max_kind: MaxKind,
    outcomes: &mut Vec<AppliedProgression>,
) {
    if !trigger.force && state.was_applied(&binding.id, trigger.event_id) {
        tracing::debug!(
            "Progression '{}' already applied for event {}; skipping",
            binding.id,
            trigger.event_id
        );
        outcomes.push(AppliedProgression {
            progression_id: binding.id.clone(),
            lift_id: binding.lift_id.clone(),
            result: ProgressionResult {
                applied: false,
                delta: 0.0,
                new_stage: None,
                new_scheme: None,
                reset_failures: false,
                reason: format!("already applied for event {}", trigger.event_id),
            },
        });
        return;
    }

    let result = match binding.rule.apply(trigger, consecutive_failures) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("Progression '{}' failed to apply: {}", binding.id, e);
            return;
        }
    };

    if result.applied {
        state.mark_applied(&binding.id, trigger.event_id);

        if result.delta != 0.0 {
            match state.apply_max_delta(
                trigger.user_id,
                &binding.lift_id,
                max_kind,
                result.delta,
                trigger.occurred_at,
            ) {
                Ok(new_value) => {
                    tracing::info!(
                        "Progression '{}': {} ({}) now {}",
                        binding.id,
                        binding.lift_id,
                        result.reason,
                        new_value
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Progression '{}' delta not applied: {}",
                        binding.id,
                        e
                    );
                }
            }
        }

        if let (Some(stage), Some(scheme)) = (result.new_stage, result.new_scheme.clone()) {
            if let Some(prescription_id) = &trigger.prescription_id {
                tracing::info!(
                    "Progression '{}': prescription '{}' moved to stage {}",
                    binding.id,
                    prescription_id,
                    stage
                );
                state
                    .stage_overrides
                    .insert(prescription_id.clone(), StageOverride { stage, scheme });
            }
        }

        if result.reset_failures {
            state.failures.reset(&binding.lift_id, &binding.id);
        }
    } else {
        tracing::debug!("Progression '{}' not applied: {}", binding.id, result.reason);
    }

    outcomes.push(AppliedProgression {
        progression_id: binding.id.clone(),
        lift_id: binding.lift_id.clone(),
        result,
    });
}
