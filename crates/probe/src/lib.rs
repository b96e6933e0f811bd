#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Chandy-Misra-Haas probe machinery for the AND request model
//!
//! The wait-for graph is never materialised. An edge `P -> Q` exists while
//! `P` has a pending request on a resource that `Q` holds, and probes follow
//! those edges by asking the resource pool for the current holder at every
//! hop. A probe that arrives back at a still-waiting initiator confirms a
//! cycle.
//!
//! - [`ProbeRouter`] delivers probes into per-process inboxes
//! - [`DetectionGate`] limits how many detection runs are in flight
//! - [`ProbeEngine`] builds, forwards and confirms probes

pub mod engine;
pub mod gate;
pub mod router;

pub use engine::{ForwardMemo, Initiation, ProbeEngine, ProbeVerdict};
pub use gate::{DetectionGate, GateClaim};
pub use router::{ProbeInbox, ProbeRouter};
