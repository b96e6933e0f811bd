#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the CMH deadlock simulator
//!
//! This crate provides the vocabulary shared by every other crate: process
//! and resource identifiers, the process state machine, the immutable probe
//! message, and the reports produced at the end of a run.

pub mod ids;
pub mod probe;
pub mod reports;
pub mod state;

// Re-export commonly used types
pub use ids::{ProcessId, ResourceId};
pub use probe::ProbeMessage;
pub use reports::{DeadlockRecord, ExitReason, ReclaimedResource, SimulationReport, UnitReport};
pub use state::ProcessState;
