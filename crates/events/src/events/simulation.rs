use cmh_types::{ProcessId, ResourceId, SimulationReport};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Run-level events emitted by the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SimulationEvent {
    /// Resources and units were created
    Started {
        resources: Vec<ResourceId>,
        processes: Vec<ProcessId>,
        run_duration: Duration,
    },

    /// A self-terminated unit was replaced by a fresh one with the same id
    UnitRespawned { process: ProcessId, generation: u32 },

    /// External shutdown was requested
    ShutdownRequested,

    /// Shutdown cleanup found a resource still held and cleared it
    ResourceReclaimed {
        resource: ResourceId,
        holder: ProcessId,
    },

    /// Every unit has been joined
    Completed { report: SimulationReport },
}
