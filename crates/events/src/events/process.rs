use cmh_types::{ExitReason, ProcessId, ResourceId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Events describing one unit's request / hold / release cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProcessEvent {
    /// Unit began running
    Started {
        process: ProcessId,
        generation: u32,
    },

    /// Unit asked the pool for a resource
    RequestIssued {
        process: ProcessId,
        resource: ResourceId,
        timeout: Duration,
    },

    /// Resource was granted, either immediately or through a waiter hand-off
    RequestGranted {
        process: ProcessId,
        resource: ResourceId,
        waited: Duration,
    },

    /// The request timeout elapsed before the resource was granted
    RequestTimedOut {
        process: ProcessId,
        resource: ResourceId,
        holder: Option<ProcessId>,
    },

    /// Unit released a resource it held
    ResourceReleased {
        process: ProcessId,
        resource: ResourceId,
        next_holder: Option<ProcessId>,
    },

    /// Unit removed itself to break a confirmed cycle
    SelfTerminated {
        process: ProcessId,
        released: Vec<ResourceId>,
        abandoned: Option<ResourceId>,
    },

    /// Unit left its loop; follows `SelfTerminated` when that was the cause
    Stopped {
        process: ProcessId,
        reason: ExitReason,
    },
}
