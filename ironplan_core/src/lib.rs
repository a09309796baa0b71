#![forbid(unsafe_code)]

//! Core domain model and business logic for the Ironplan strength
//! programming system.
//!
//! This crate provides:
//! - Domain types (lifts, maxes, sets, sessions, program state)
//! - Load strategies and set schemes (prescription resolution)
//! - Progression rules and failure tracking
//! - The enrollment/workout-session state machine
//! - An in-memory event bus and the progression dispatcher
//! - Persistence (set log, CSV archive, athlete state)

pub mod types;
pub mod error;
pub mod rounding;
pub mod rpe;
pub mod load;
pub mod scheme;
pub mod prescription;
pub mod failure;
pub mod progression;
pub mod events;
pub mod session;
pub mod dispatch;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod store;
pub mod setlog;
pub mod csv_rollup;
pub mod history;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog, Catalog, ProgramDefinition};
pub use config::Config;
pub use dispatch::ProgressionDispatcher;
pub use events::{EventBus, EventPayload, EventType, StateEvent};
pub use failure::FailureLedger;
pub use history::{load_recent_sets, SessionSets};
pub use load::{LoadContext, LoadStrategy, MaxLookup, SessionLookup};
pub use prescription::{Prescription, ResolvedPrescription};
pub use progression::{Progression, ProgressionResult, TriggerEvent, TriggerType};
pub use rounding::{round_weight, Rounding, RoundingDirection};
pub use scheme::{NextSet, SetScheme, TerminationCondition, TerminationReason};
pub use setlog::{JsonlSink, SetSink};
pub use store::AthleteState;
