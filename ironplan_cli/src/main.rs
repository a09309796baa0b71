use chrono::Utc;
use clap::{Parser, Subcommand};
use ironplan_core::*;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ironplan")]
#[command(about = "Strength program prescription and progression engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available programs
    Programs,

    /// Enroll in a program
    Enroll {
        /// Program id (see `programs`)
        program: String,

        /// Meet date (YYYY-MM-DD), required for meet-prep programs
        #[arg(long)]
        meet_date: Option<chrono::NaiveDate>,
    },

    /// Show enrollment state, maxes, and failure counters
    Status,

    /// Record a max for a lift
    Max {
        lift: String,
        value: f64,

        /// Max kind: training_max, one_rm, or e1rm
        #[arg(long, default_value = "training_max")]
        kind: String,
    },

    /// Start the next workout and show the day's prescriptions
    Start,

    /// Log the next set of a prescription
    Log {
        /// Prescription id (shown by `start`)
        prescription: String,

        /// Reps performed
        #[arg(long)]
        reps: u32,

        /// Weight used, when it differs from the prescribed weight
        #[arg(long)]
        weight: Option<f64>,

        /// Reported RPE
        #[arg(long)]
        rpe: Option<f64>,
    },

    /// Complete the current workout
    Finish,

    /// Abandon the current workout
    Abandon,

    /// Start the next cycle after the previous one completed
    NextCycle,

    /// Quit the program
    Quit,

    /// Roll up the set log to CSV
    Rollup {
        /// Clean up processed log files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

/// File layout under the data directory
struct Paths {
    state: PathBuf,
    setlog: PathBuf,
    setlog_dir: PathBuf,
    csv: PathBuf,
}

impl Paths {
    fn new(data_dir: &PathBuf) -> Self {
        let setlog_dir = data_dir.join("log");
        Self {
            state: setlog_dir.join("athlete.json"),
            setlog: setlog_dir.join("sets.jsonl"),
            setlog_dir,
            csv: data_dir.join("sets.csv"),
        }
    }
}

fn main() -> Result<()> {
    ironplan_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let paths = Paths::new(&data_dir);
    std::fs::create_dir_all(&paths.setlog_dir)?;

    let catalog = get_default_catalog();
    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::Catalog("Invalid catalog".into()));
    }

    match cli.command {
        Commands::Programs => cmd_programs(catalog),
        Commands::Enroll { program, meet_date } => {
            cmd_enroll(catalog, &paths, &program, meet_date)
        }
        Commands::Status => cmd_status(catalog, &paths),
        Commands::Max { lift, value, kind } => cmd_max(catalog, &paths, &lift, value, &kind),
        Commands::Start => cmd_start(catalog, &paths, &config),
        Commands::Log {
            prescription,
            reps,
            weight,
            rpe,
        } => cmd_log(catalog, &paths, &config, &prescription, reps, weight, rpe),
        Commands::Finish => cmd_finish(catalog, &paths),
        Commands::Abandon => cmd_abandon(catalog, &paths),
        Commands::NextCycle => cmd_next_cycle(&paths),
        Commands::Quit => cmd_quit(catalog, &paths),
        Commands::Rollup { cleanup } => cmd_rollup(&paths, cleanup),
    }
}

fn make_bus(catalog: &Catalog, paths: &Paths, program_id: &str) -> Option<EventBus> {
    let program = catalog.programs.get(program_id)?.clone();
    let bus = EventBus::new();
    let dispatcher = Arc::new(ProgressionDispatcher::new(
        program,
        &paths.state,
        &paths.setlog,
    ));
    dispatcher.register(&bus);
    Some(bus)
}

fn load_enrollment(paths: &Paths) -> Result<(AthleteState, UserProgramState)> {
    let state = AthleteState::load(&paths.state)?;
    let enrollment = state
        .enrollment
        .clone()
        .ok_or_else(|| Error::NotFound("no active enrollment; run `enroll` first".into()))?;
    Ok((state, enrollment))
}

fn cmd_programs(catalog: &Catalog) -> Result<()> {
    let mut programs: Vec<_> = catalog.programs.values().collect();
    programs.sort_by(|a, b| a.id.cmp(&b.id));

    println!("\nAvailable programs:\n");
    for program in programs {
        println!(
            "  {:<14} {} ({} weeks x {} days)",
            program.id,
            program.name,
            program.weeks_per_cycle,
            program.days_per_week()
        );
    }
    println!();
    Ok(())
}

fn cmd_enroll(
    catalog: &Catalog,
    paths: &Paths,
    program_id: &str,
    meet_date: Option<chrono::NaiveDate>,
) -> Result<()> {
    let program = catalog
        .programs
        .get(program_id)
        .ok_or_else(|| Error::NotFound(format!("unknown program '{}'", program_id)))?;

    let mut state = AthleteState::load(&paths.state)?;
    if let Some(existing) = &state.enrollment {
        if existing.enrollment_status != EnrollmentStatus::Quit {
            return Err(Error::invalid_transition(
                "enroll",
                format!("enrollment={}", existing.enrollment_status),
                format!("already enrolled in '{}'", existing.program_id),
            ));
        }
    }

    let user_id = state
        .enrollment
        .as_ref()
        .map(|e| e.user_id)
        .unwrap_or_else(uuid::Uuid::new_v4);
    let (enrollment, events) = session::enroll(user_id, program, meet_date)?;
    state.enrollment = Some(enrollment);
    state.save(&paths.state)?;

    if let Some(bus) = make_bus(catalog, paths, program_id) {
        bus.publish_batch(&events);
    }

    println!("✓ Enrolled in {} ({})", program.name, program.id);
    println!("  Week 1, cycle 1. Record your maxes, then `start`.");
    Ok(())
}

fn cmd_status(catalog: &Catalog, paths: &Paths) -> Result<()> {
    let state = AthleteState::load(&paths.state)?;

    match &state.enrollment {
        None => println!("\nNot enrolled. Run `ironplan programs` to see options."),
        Some(e) => {
            let program_name = catalog
                .programs
                .get(&e.program_id)
                .map(|p| p.name.as_str())
                .unwrap_or(e.program_id.as_str());
            println!("\n{}", program_name);
            println!(
                "  {} | cycle {} | week {} | day {}",
                e.enrollment_status, e.current_cycle_iteration, e.current_week, e.current_day_index
            );
            if let Some(session_id) = e.active_session_id {
                println!("  Workout in progress: {}", session_id);
            }
            if let Some(meet) = e.meet_date {
                println!("  Meet date: {}", meet);
            }
        }
    }

    if !state.maxes.is_empty() {
        println!("\nCurrent maxes:");
        let user_id = state.enrollment.as_ref().map(|e| e.user_id);
        let mut lifts: Vec<&str> = state.maxes.iter().map(|m| m.lift_id.as_str()).collect();
        lifts.sort_unstable();
        lifts.dedup();
        for lift in lifts {
            for kind in [MaxKind::TrainingMax, MaxKind::OneRm, MaxKind::E1Rm] {
                if let Some(user) = user_id {
                    if let Some(max) = state.current_max(user, lift, kind) {
                        println!("  {:<10} {:<13} {:.1}", lift, kind.to_string(), max.value);
                    }
                }
            }
        }
    }

    let mut streaks: Vec<_> = state
        .failures
        .counters()
        .filter(|c| c.consecutive_failures > 0)
        .collect();
    if !streaks.is_empty() {
        streaks.sort_by(|a, b| (&a.lift_id, &a.progression_id).cmp(&(&b.lift_id, &b.progression_id)));
        println!("\nFailure streaks:");
        for counter in streaks {
            println!(
                "  {:<10} {} consecutive ({})",
                counter.lift_id, counter.consecutive_failures, counter.progression_id
            );
        }
    }

    println!();
    Ok(())
}

fn cmd_max(catalog: &Catalog, paths: &Paths, lift: &str, value: f64, kind: &str) -> Result<()> {
    if !catalog.lifts.contains_key(lift) {
        return Err(Error::NotFound(format!("unknown lift '{}'", lift)));
    }
    if value <= 0.0 {
        return Err(Error::Validation(format!(
            "max must be positive, got {}",
            value
        )));
    }
    let kind = parse_max_kind(kind)?;

    AthleteState::update(&paths.state, |state| {
        let user_id = state
            .enrollment
            .as_ref()
            .map(|e| e.user_id)
            .ok_or_else(|| Error::NotFound("enroll before recording maxes".into()))?;
        state.record_max(LiftMax {
            user_id,
            lift_id: lift.to_string(),
            kind,
            value,
            effective_date: Utc::now(),
            source: MaxSource::Manual,
        });
        Ok(())
    })?;

    println!("✓ Recorded {} {} = {}", lift, kind, value);
    Ok(())
}

fn parse_max_kind(s: &str) -> Result<MaxKind> {
    match s.to_lowercase().as_str() {
        "training_max" | "tm" => Ok(MaxKind::TrainingMax),
        "one_rm" | "1rm" => Ok(MaxKind::OneRm),
        "e1rm" => Ok(MaxKind::E1Rm),
        other => Err(Error::Validation(format!("unknown max kind '{}'", other))),
    }
}

fn cmd_start(catalog: &Catalog, paths: &Paths, config: &Config) -> Result<()> {
    let (mut state, mut enrollment) = load_enrollment(paths)?;
    let program = catalog
        .programs
        .get(&enrollment.program_id)
        .ok_or_else(|| Error::NotFound(format!("unknown program '{}'", enrollment.program_id)))?;

    let (workout, events) = session::start_workout(&mut enrollment, Utc::now())?;
    state.sessions.insert(workout.id, workout.clone());
    state.enrollment = Some(enrollment.clone());
    state.save(&paths.state)?;

    if let Some(bus) = make_bus(catalog, paths, &program.id) {
        bus.publish_batch(&events);
    }

    let day = program
        .day(workout.day_index)
        .ok_or_else(|| Error::NotFound(format!("program has no day {}", workout.day_index)))?;

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  WEEK {} · {}", workout.week_number, day.name.to_uppercase());
    println!("╰─────────────────────────────────────────╯");

    // Stage overrides from past sessions shape today's schemes
    let state = AthleteState::load(&paths.state)?;
    let session_sets = SessionSets::default();
    for prescription in &day.prescriptions {
        let effective = effective_prescription(&state, prescription);
        display_prescription(catalog, &state, &enrollment, &effective, &session_sets, config);
    }

    println!("Log sets with `ironplan log <prescription> --reps N`.\n");
    Ok(())
}

/// Apply any stage override to a prescription before resolving it
fn effective_prescription(state: &AthleteState, prescription: &Prescription) -> Prescription {
    match state.stage_overrides.get(&prescription.id) {
        Some(o) => prescription.with_stage(o.stage, o.scheme.clone()),
        None => prescription.clone(),
    }
}

fn load_context<'a>(
    state: &'a AthleteState,
    enrollment: &'a UserProgramState,
    prescription: &'a Prescription,
    session_sets: &'a SessionSets,
    config: &Config,
) -> LoadContext<'a> {
    LoadContext {
        user_id: enrollment.user_id,
        lift_id: &prescription.lift_id,
        maxes: state,
        session: Some(session_sets),
        session_id: enrollment.active_session_id,
        days_to_meet: session::days_to_meet(enrollment, Utc::now().date_naive()),
        rounding: config.rounding.rounding(),
    }
}

fn display_prescription(
    catalog: &Catalog,
    state: &AthleteState,
    enrollment: &UserProgramState,
    prescription: &Prescription,
    session_sets: &SessionSets,
    config: &Config,
) {
    let lift_name = catalog
        .lifts
        .get(&prescription.lift_id)
        .map(|l| l.name.as_str())
        .unwrap_or(prescription.lift_id.as_str());

    println!("\n  [{}] {}", prescription.id, lift_name);

    let ctx = load_context(state, enrollment, prescription, session_sets, config);
    match prescription.resolve(&ctx) {
        Ok(resolved) => {
            for set in &resolved.sets {
                let weight = if set.weight == 0.0 {
                    "find your weight".to_string()
                } else {
                    format!("{} lb", set.weight)
                };
                let reps = if set.is_amrap {
                    format!("{}+ reps", set.target_reps)
                } else {
                    format!("{} reps", set.target_reps)
                };
                let marker = if set.is_provisional { " (provisional)" } else { "" };
                println!("    → Set {}: {} x {}{}", set.set_number, weight, reps, marker);
            }
            if resolved.is_variable {
                println!("    → continues until the scheme's stop condition");
            }
            if let Some(rest) = resolved.rest_seconds {
                println!("    Rest: {}s", rest);
            }
            if let Some(notes) = &resolved.notes {
                println!("    Note: {}", notes);
            }
        }
        Err(Error::Dependency(msg)) => {
            println!("    → resolves mid-session: {}", msg);
        }
        Err(Error::NotFound(msg)) => {
            println!("    ! cannot resolve: {}", msg);
        }
        Err(e) => {
            println!("    ! {}", e);
        }
    }
}

fn cmd_log(
    catalog: &Catalog,
    paths: &Paths,
    config: &Config,
    prescription_id: &str,
    reps: u32,
    weight_override: Option<f64>,
    rpe: Option<f64>,
) -> Result<()> {
    let (state, enrollment) = load_enrollment(paths)?;
    let session_id = enrollment.active_session_id.ok_or_else(|| {
        Error::invalid_transition(
            "log set",
            format!("enrollment={}", enrollment.enrollment_status),
            "no workout in progress; run `start` first",
        )
    })?;
    let workout = state
        .sessions
        .get(&session_id)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("session {} not found", session_id)))?;

    let program = catalog
        .programs
        .get(&enrollment.program_id)
        .ok_or_else(|| Error::NotFound(format!("unknown program '{}'", enrollment.program_id)))?;
    let prescription = program
        .find_prescription(prescription_id)
        .ok_or_else(|| Error::NotFound(format!("unknown prescription '{}'", prescription_id)))?;
    let effective = effective_prescription(&state, prescription);

    let all_sets = setlog::read_sets(&paths.setlog)?;
    let session_sets = SessionSets::for_session(&all_sets, session_id);
    let history = session_sets.for_prescription(prescription_id);
    let set_number = history.len() as u32 + 1;

    let ctx = load_context(&state, &enrollment, &effective, &session_sets, config);

    // What does this set look like per the scheme?
    let generated = if effective.scheme.is_variable_count() {
        match effective.next_set(&ctx, &history)? {
            NextSet::Continue(set) => set,
            NextSet::Done(reason) => {
                println!("Prescription '{}' is already complete ({:?}).", prescription_id, reason);
                return Ok(());
            }
        }
    } else {
        let resolved = effective.resolve(&ctx)?;
        match resolved.sets.get(set_number as usize - 1) {
            Some(set) => set.clone(),
            None => {
                println!(
                    "All {} sets of '{}' are already logged.",
                    resolved.sets.len(),
                    prescription_id
                );
                return Ok(());
            }
        }
    };

    let prescribed = (generated.weight > 0.0).then_some(generated.weight);
    let weight = weight_override.or(prescribed).ok_or_else(|| {
        Error::Validation(format!(
            "prescription '{}' has no prescribed weight; pass --weight",
            prescription_id
        ))
    })?;

    let set = LoggedSet {
        id: uuid::Uuid::new_v4(),
        user_id: enrollment.user_id,
        session_id,
        prescription_id: prescription_id.to_string(),
        lift_id: effective.lift_id.clone(),
        set_number,
        weight,
        target_reps: generated.target_reps,
        reps_performed: reps,
        is_amrap: generated.is_amrap,
        rpe,
        created_at: Utc::now(),
    };

    let event = session::log_set(&enrollment, &workout, &set)?;

    let mut sink = JsonlSink::new(&paths.setlog);
    sink.append(&set)?;

    if let Some(bus) = make_bus(catalog, paths, &program.id) {
        bus.publish(&event);
    }

    println!(
        "✓ Set {}: {} x {} @ {} lb",
        set_number, effective.lift_id, reps, weight
    );

    // Guidance for variable schemes: what comes next
    if effective.scheme.is_variable_count() {
        let all_sets = setlog::read_sets(&paths.setlog)?;
        let session_sets = SessionSets::for_session(&all_sets, session_id);
        let history = session_sets.for_prescription(prescription_id);
        let state = AthleteState::load(&paths.state)?;
        let ctx = load_context(&state, &enrollment, &effective, &session_sets, config);
        match effective.next_set(&ctx, &history)? {
            NextSet::Continue(next) => {
                let weight = if next.weight == 0.0 {
                    "same weight".to_string()
                } else {
                    format!("{} lb", next.weight)
                };
                println!("  Next: set {} at {} x {} reps", next.set_number, weight, next.target_reps);
            }
            NextSet::Done(reason) => {
                println!("  Prescription complete: {:?}", reason);
            }
        }
    }

    Ok(())
}

fn cmd_finish(catalog: &Catalog, paths: &Paths) -> Result<()> {
    let (mut state, mut enrollment) = load_enrollment(paths)?;
    let program = catalog
        .programs
        .get(&enrollment.program_id)
        .ok_or_else(|| Error::NotFound(format!("unknown program '{}'", enrollment.program_id)))?;

    let session_id = enrollment.active_session_id.ok_or_else(|| {
        Error::invalid_transition(
            "finish workout",
            format!("enrollment={}", enrollment.enrollment_status),
            "no workout in progress",
        )
    })?;
    let mut workout = state
        .sessions
        .get(&session_id)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("session {} not found", session_id)))?;

    let events = session::finish_workout(&mut enrollment, &mut workout, program, Utc::now())?;
    state.sessions.insert(workout.id, workout);
    state.enrollment = Some(enrollment.clone());
    state.save(&paths.state)?;

    if let Some(bus) = make_bus(catalog, paths, &program.id) {
        bus.publish_batch(&events);
    }

    println!("✓ Workout complete!");
    if enrollment.enrollment_status == EnrollmentStatus::BetweenCycles {
        println!("  Cycle {} finished. Run `next-cycle` when ready.", enrollment.current_cycle_iteration);
    } else {
        println!(
            "  Next up: week {}, day {}.",
            enrollment.current_week, enrollment.current_day_index
        );
    }
    Ok(())
}

fn cmd_abandon(catalog: &Catalog, paths: &Paths) -> Result<()> {
    let (mut state, mut enrollment) = load_enrollment(paths)?;
    let session_id = enrollment.active_session_id.ok_or_else(|| {
        Error::invalid_transition(
            "abandon workout",
            format!("enrollment={}", enrollment.enrollment_status),
            "no workout in progress",
        )
    })?;
    let mut workout = state
        .sessions
        .get(&session_id)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("session {} not found", session_id)))?;

    let events = session::abandon_workout(&mut enrollment, &mut workout, Utc::now())?;
    state.sessions.insert(workout.id, workout);
    state.enrollment = Some(enrollment.clone());
    state.save(&paths.state)?;

    if let Some(bus) = make_bus(catalog, paths, &enrollment.program_id) {
        bus.publish_batch(&events);
    }

    println!("✓ Workout abandoned. The day will repeat next time.");
    Ok(())
}

fn cmd_next_cycle(paths: &Paths) -> Result<()> {
    let (mut state, mut enrollment) = load_enrollment(paths)?;
    session::start_next_cycle(&mut enrollment)?;
    let iteration = enrollment.current_cycle_iteration;
    state.enrollment = Some(enrollment);
    state.save(&paths.state)?;

    println!("✓ Cycle {} begins. `start` when ready.", iteration);
    Ok(())
}

fn cmd_quit(catalog: &Catalog, paths: &Paths) -> Result<()> {
    let (mut state, mut enrollment) = load_enrollment(paths)?;
    let events = session::unenroll(&mut enrollment)?;
    let program_id = enrollment.program_id.clone();
    state.enrollment = Some(enrollment);
    state.save(&paths.state)?;

    if let Some(bus) = make_bus(catalog, paths, &program_id) {
        bus.publish_batch(&events);
    }

    println!("✓ Unenrolled. Your history is kept.");
    Ok(())
}

fn cmd_rollup(paths: &Paths, cleanup: bool) -> Result<()> {
    if !paths.setlog.exists() {
        println!("No set log found - nothing to roll up.");
        return Ok(());
    }

    let count = csv_rollup::log_to_csv_and_archive(&paths.setlog, &paths.csv)?;

    println!("✓ Rolled up {} sets to CSV", count);
    println!("  CSV: {}", paths.csv.display());

    if cleanup {
        let cleaned = csv_rollup::cleanup_processed_logs(&paths.setlog_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed log files", cleaned);
        }
    }

    Ok(())
}
