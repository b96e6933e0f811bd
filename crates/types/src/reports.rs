//! Report type definitions for a simulation run

use crate::{ProcessId, ResourceId};
use serde::{Deserialize, Serialize};

/// Why a process unit stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// The shared run deadline passed
    RunComplete,
    /// Coordinated shutdown was requested
    Shutdown,
    /// The unit confirmed a cycle it initiated and removed itself
    SelfTerminated,
}

/// Per-unit counters returned when a unit exits
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReport {
    pub process: ProcessId,
    /// Which incarnation of this id produced the report (0 for the original)
    pub generation: u32,
    pub exit: ExitReason,
    pub rounds_completed: u64,
    pub grants: u64,
    pub timeouts: u64,
    pub probes_initiated: u64,
    pub probes_forwarded: u64,
    /// Set when this unit resolved a cycle by self-terminating
    pub deadlock: Option<DeadlockRecord>,
}

impl UnitReport {
    #[must_use]
    pub fn new(process: ProcessId, generation: u32) -> Self {
        Self {
            process,
            generation,
            exit: ExitReason::RunComplete,
            rounds_completed: 0,
            grants: 0,
            timeouts: 0,
            probes_initiated: 0,
            probes_forwarded: 0,
            deadlock: None,
        }
    }
}

/// One resolved deadlock
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlockRecord {
    /// Process whose probe came back
    pub detected_by: ProcessId,
    /// Process that self-terminated to break the cycle
    pub terminated: ProcessId,
    /// Resources released by the self-termination, ascending
    pub released: Vec<ResourceId>,
}

/// A holder cleared by shutdown cleanup rather than by its owner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimedResource {
    pub resource: ResourceId,
    pub holder: ProcessId,
}

/// Aggregate outcome of a whole run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimulationReport {
    pub units: Vec<UnitReport>,
    pub deadlocks: Vec<DeadlockRecord>,
    pub reclaimed: Vec<ReclaimedResource>,
    pub respawns: u64,
}

impl SimulationReport {
    /// Number of units that ended by self-termination
    #[must_use]
    pub fn self_terminations(&self) -> usize {
        self.units
            .iter()
            .filter(|unit| unit.exit == ExitReason::SelfTerminated)
            .count()
    }

    #[must_use]
    pub fn total_timeouts(&self) -> u64 {
        self.units.iter().map(|unit| unit.timeouts).sum()
    }

    #[must_use]
    pub fn total_probes_initiated(&self) -> u64 {
        self.units.iter().map(|unit| unit.probes_initiated).sum()
    }

    /// Reports of every incarnation of `process`, oldest first
    pub fn units_for(&self, process: ProcessId) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(move |unit| unit.process == process)
    }
}
