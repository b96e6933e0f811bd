#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Process units for the CMH deadlock simulator
//!
//! A [`ProcessUnit`] is one concurrent actor. It repeatedly asks its
//! [`WorkloadPolicy`] which resources to take, acquires them one at a time
//! while keeping what it already holds, holds them for a while and releases
//! them. A request that times out turns the unit into a detection initiator.
//! Probes are drained from the unit's own inbox whenever it waits, and a
//! confirmed cycle is resolved according to its [`ResolutionPolicy`].

pub mod policy;
pub mod resolution;
pub mod unit;

pub use policy::{RandomPolicy, ScriptedPolicy, ScriptedRound, UnitView, WorkloadPolicy};
pub use resolution::{InitiatorTerminates, Resolution, ResolutionPolicy};
pub use unit::{ProcessUnit, UnitDeps};
