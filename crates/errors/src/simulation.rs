//! Simulation lifecycle error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SimulationError {
    #[error("unit P{process} failed: {message}")]
    UnitFailed { process: u32, message: String },

    #[error("unit task panicked: {message}")]
    UnitPanicked { message: String },

    #[error("coordinator is missing {component}")]
    MissingComponent { component: String },
}
