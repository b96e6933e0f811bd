use serde::{Deserialize, Serialize};

use crate::EventSource;

// Declare all domain modules
pub mod detection;
pub mod general;
pub mod process;
pub mod simulation;

// Re-export all domain events
pub use detection::*;
pub use general::*;
pub use process::*;
pub use simulation::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, debug)
    General(GeneralEvent),

    /// Per-unit request / hold / release lifecycle
    Process(ProcessEvent),

    /// Probe propagation and cycle confirmation
    Detection(DetectionEvent),

    /// Run-level lifecycle (startup, respawn, cleanup, completion)
    Simulation(SimulationEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::General,
            Self::Process(_) => EventSource::Process,
            Self::Detection(_) => EventSource::Detection,
            Self::Simulation(_) => EventSource::Simulation,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            // Error-level events
            Self::General(GeneralEvent::Error { .. }) => Level::ERROR,

            // Warning-level events
            Self::General(GeneralEvent::Warning { .. })
            | Self::Detection(DetectionEvent::DeadlockDetected { .. })
            | Self::Process(ProcessEvent::SelfTerminated { .. })
            | Self::Simulation(SimulationEvent::ResourceReclaimed { .. }) => Level::WARN,

            // Debug-level events (probe chatter, internal state)
            Self::Detection(
                DetectionEvent::ProbeReceived { .. }
                | DetectionEvent::ProbeDropped { .. }
                | DetectionEvent::DetectionSkipped { .. },
            ) => Level::DEBUG,

            // Default to INFO for most events
            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "cmh::events::general",
            Self::Process(_) => "cmh::events::process",
            Self::Detection(_) => "cmh::events::detection",
            Self::Simulation(_) => "cmh::events::simulation",
        }
    }

    /// Process the event is about, when there is a single one
    #[must_use]
    pub fn process(&self) -> Option<cmh_types::ProcessId> {
        match self {
            Self::Process(
                ProcessEvent::Started { process, .. }
                | ProcessEvent::RequestIssued { process, .. }
                | ProcessEvent::RequestGranted { process, .. }
                | ProcessEvent::RequestTimedOut { process, .. }
                | ProcessEvent::ResourceReleased { process, .. }
                | ProcessEvent::SelfTerminated { process, .. }
                | ProcessEvent::Stopped { process, .. },
            )
            | Self::Detection(DetectionEvent::DetectionSkipped { process, .. })
            | Self::Simulation(SimulationEvent::UnitRespawned { process, .. }) => Some(*process),
            Self::Detection(
                DetectionEvent::ProbeSent { probe, .. }
                | DetectionEvent::ProbeReceived { probe }
                | DetectionEvent::ProbeDropped { probe, .. },
            ) => Some(probe.receiver()),
            Self::Detection(DetectionEvent::DeadlockDetected { initiator, .. }) => {
                Some(*initiator)
            }
            _ => None,
        }
    }
}
