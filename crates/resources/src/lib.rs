#![deny(clippy::pedantic, unsafe_code)]

//! Resource pool for the CMH deadlock simulator
//!
//! This crate owns every single-instance resource of a run. Each resource
//! sits behind its own lock; acquisition either succeeds at once, or parks
//! the caller in a FIFO waiter queue until the holder hands the resource on
//! or the caller's timeout elapses.

pub mod pool;

pub use pool::{AcquireOutcome, ResourcePool, ResourceSnapshot};
