//! Enrollment and workout-session state machine.
//!
//! The only place state-change events are produced. Every transition
//! validates against the current state and returns the events for the
//! caller to publish; invalid transitions come back as structured errors
//! carrying the state that blocked them. Handler failures downstream
//! never roll back a transition that already happened.
//!
//! Callers are expected to serialize mutations per enrollment (one
//! request per user at a time); the machine itself takes no locks.

use crate::catalog::ProgramDefinition;
use crate::events::{EventPayload, EventType, StateEvent};
use crate::types::{
    EnrollmentStatus, LoggedSet, PeriodStatus, ScheduleType, SessionStatus, UserProgramState,
    WorkoutSession,
};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Human-readable snapshot of where the enrollment is, for errors
fn state_label(state: &UserProgramState) -> String {
    format!(
        "enrollment={} cycle={:?} week={:?} week_number={} day={}",
        state.enrollment_status,
        state.cycle_status,
        state.week_status,
        state.current_week,
        state.current_day_index
    )
}

fn payload(state: &UserProgramState, session_id: Option<Uuid>) -> EventPayload {
    EventPayload {
        session_id,
        week: Some(state.current_week),
        cycle_iteration: Some(state.current_cycle_iteration),
        day_index: Some(state.current_day_index),
        set: None,
    }
}

fn event(
    event_type: EventType,
    state: &UserProgramState,
    session_id: Option<Uuid>,
) -> StateEvent {
    StateEvent::new(
        event_type,
        state.user_id,
        state.program_id.clone(),
        payload(state, session_id),
    )
}

/// Days until the configured meet, when the schedule counts down to one
pub fn days_to_meet(state: &UserProgramState, today: NaiveDate) -> Option<i64> {
    match (state.schedule, state.meet_date) {
        (ScheduleType::MeetPrep, Some(meet)) => Some((meet - today).num_days()),
        _ => None,
    }
}

/// Enroll a user in a program, creating their program state at week 1,
/// cycle iteration 1.
pub fn enroll(
    user_id: Uuid,
    program: &ProgramDefinition,
    meet_date: Option<NaiveDate>,
) -> Result<(UserProgramState, Vec<StateEvent>)> {
    if program.schedule == ScheduleType::MeetPrep && meet_date.is_none() {
        return Err(Error::Validation(format!(
            "program '{}' schedules toward a meet; a meet date is required",
            program.id
        )));
    }

    let state = UserProgramState {
        user_id,
        program_id: program.id.clone(),
        enrollment_status: EnrollmentStatus::Active,
        cycle_status: PeriodStatus::Pending,
        week_status: PeriodStatus::Pending,
        current_week: 1,
        current_cycle_iteration: 1,
        current_day_index: 1,
        meet_date,
        schedule: program.schedule,
        active_session_id: None,
    };

    tracing::info!("Enrolled user {} in program '{}'", user_id, program.id);
    let events = vec![event(EventType::Enrolled, &state, None)];
    Ok((state, events))
}

/// Start the next workout of the program.
///
/// Rejected while a session is already in progress, or when the
/// enrollment is between cycles or quit.
pub fn start_workout(
    state: &mut UserProgramState,
    now: DateTime<Utc>,
) -> Result<(WorkoutSession, Vec<StateEvent>)> {
    match state.enrollment_status {
        EnrollmentStatus::Active => {}
        EnrollmentStatus::BetweenCycles => {
            return Err(Error::invalid_transition(
                "start workout",
                state_label(state),
                "cycle complete; start the next cycle first",
            ))
        }
        EnrollmentStatus::Quit => {
            return Err(Error::invalid_transition(
                "start workout",
                state_label(state),
                "enrollment has been quit",
            ))
        }
    }

    if let Some(existing) = state.active_session_id {
        return Err(Error::invalid_transition(
            "start workout",
            state_label(state),
            format!("session {} is already in progress", existing),
        ));
    }

    let mut events = Vec::new();

    // First workout of a pending period starts it
    if state.cycle_status == PeriodStatus::Pending {
        state.cycle_status = PeriodStatus::InProgress;
        events.push(event(EventType::CycleStarted, state, None));
    }
    if state.week_status == PeriodStatus::Pending {
        state.week_status = PeriodStatus::InProgress;
        events.push(event(EventType::WeekStarted, state, None));
    }

    let session = WorkoutSession {
        id: Uuid::new_v4(),
        week_number: state.current_week,
        day_index: state.current_day_index,
        status: SessionStatus::InProgress,
        started_at: now,
        finished_at: None,
    };
    state.active_session_id = Some(session.id);

    tracing::info!(
        "Started workout {} (week {}, day {})",
        session.id,
        session.week_number,
        session.day_index
    );
    events.push(event(EventType::WorkoutStarted, state, Some(session.id)));

    Ok((session, events))
}

/// Validate a set against the session it claims, producing the SetLogged
/// event. Appending the set itself is the persistence layer's job.
pub fn log_set(
    state: &UserProgramState,
    session: &WorkoutSession,
    set: &LoggedSet,
) -> Result<StateEvent> {
    if session.status != SessionStatus::InProgress {
        return Err(Error::invalid_transition(
            "log set",
            state_label(state),
            format!("session {} is {:?}", session.id, session.status),
        ));
    }
    if state.active_session_id != Some(session.id) {
        return Err(Error::invalid_transition(
            "log set",
            state_label(state),
            format!("session {} is not this enrollment's active session", session.id),
        ));
    }
    if set.session_id != session.id {
        return Err(Error::Validation(format!(
            "set belongs to session {}, not {}",
            set.session_id, session.id
        )));
    }

    let mut payload = payload(state, Some(session.id));
    payload.set = Some(set.clone());
    Ok(StateEvent::new(
        EventType::SetLogged,
        state.user_id,
        state.program_id.clone(),
        payload,
    ))
}

/// Complete the active session and advance the day, cascading week and
/// cycle completion when their last constituent period finishes.
pub fn finish_workout(
    state: &mut UserProgramState,
    session: &mut WorkoutSession,
    program: &ProgramDefinition,
    now: DateTime<Utc>,
) -> Result<Vec<StateEvent>> {
    require_active_session(state, session, "finish workout")?;

    session.status = SessionStatus::Completed;
    session.finished_at = Some(now);
    state.active_session_id = None;

    let mut events = vec![event(EventType::WorkoutCompleted, state, Some(session.id))];

    if state.current_day_index < program.days_per_week() {
        state.current_day_index += 1;
        tracing::info!(
            "Workout {} complete; advanced to day {}",
            session.id,
            state.current_day_index
        );
        return Ok(events);
    }

    // Last day of the week
    state.week_status = PeriodStatus::Completed;
    events.push(event(EventType::WeekCompleted, state, Some(session.id)));

    if state.current_week < program.weeks_per_cycle {
        state.current_week += 1;
        state.current_day_index = 1;
        state.week_status = PeriodStatus::Pending;
        tracing::info!("Week complete; advanced to week {}", state.current_week);
        return Ok(events);
    }

    // Last week of the cycle
    state.cycle_status = PeriodStatus::Completed;
    state.enrollment_status = EnrollmentStatus::BetweenCycles;
    events.push(event(EventType::CycleCompleted, state, Some(session.id)));
    events.push(event(EventType::CycleBoundaryReached, state, Some(session.id)));

    tracing::info!(
        "Cycle {} complete; enrollment now between cycles",
        state.current_cycle_iteration
    );
    Ok(events)
}

/// Abandon the active session. The program day does not advance.
pub fn abandon_workout(
    state: &mut UserProgramState,
    session: &mut WorkoutSession,
    now: DateTime<Utc>,
) -> Result<Vec<StateEvent>> {
    require_active_session(state, session, "abandon workout")?;

    session.status = SessionStatus::Abandoned;
    session.finished_at = Some(now);
    state.active_session_id = None;

    tracing::info!("Workout {} abandoned", session.id);
    Ok(vec![event(
        EventType::WorkoutAbandoned,
        state,
        Some(session.id),
    )])
}

/// Begin the next cycle iteration after the previous one completed
pub fn start_next_cycle(state: &mut UserProgramState) -> Result<Vec<StateEvent>> {
    if state.enrollment_status != EnrollmentStatus::BetweenCycles {
        return Err(Error::invalid_transition(
            "start next cycle",
            state_label(state),
            "enrollment is not between cycles",
        ));
    }

    state.enrollment_status = EnrollmentStatus::Active;
    state.current_cycle_iteration += 1;
    state.current_week = 1;
    state.current_day_index = 1;
    state.cycle_status = PeriodStatus::Pending;
    state.week_status = PeriodStatus::Pending;

    tracing::info!(
        "Starting cycle iteration {} of '{}'",
        state.current_cycle_iteration,
        state.program_id
    );
    Ok(Vec::new())
}

/// Leave the program. Terminal; any in-progress session is abandoned.
pub fn unenroll(state: &mut UserProgramState) -> Result<Vec<StateEvent>> {
    if state.enrollment_status == EnrollmentStatus::Quit {
        return Err(Error::invalid_transition(
            "unenroll",
            state_label(state),
            "enrollment already quit",
        ));
    }

    state.enrollment_status = EnrollmentStatus::Quit;
    state.active_session_id = None;

    tracing::info!("User {} quit program '{}'", state.user_id, state.program_id);
    Ok(vec![event(EventType::Quit, state, None)])
}

fn require_active_session(
    state: &UserProgramState,
    session: &WorkoutSession,
    action: &str,
) -> Result<()> {
    if session.status != SessionStatus::InProgress {
        return Err(Error::invalid_transition(
            action,
            state_label(state),
            format!("session {} is {:?}", session.id, session.status),
        ));
    }
    if state.active_session_id != Some(session.id) {
        return Err(Error::invalid_transition(
            action,
            state_label(state),
            format!("session {} is not this enrollment's active session", session.id),
        ));
    }
    Ok(())
}
