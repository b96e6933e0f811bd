use cmh_types::{ProbeMessage, ProcessId, ResourceId};
use serde::{Deserialize, Serialize};

/// Why a received probe went no further
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Receiver is not waiting on anything: the edge has since resolved
    ReceiverNotWaiting,
    /// The resource the receiver awaits has no holder any more
    NoHolder,
    /// Receiver is unknown or its inbox is closed
    Unroutable,
    /// Delivered to a unit other than the one named as receiver
    Misrouted,
    /// Receiver already passed this initiator's probe on during its current wait
    AlreadyForwarded,
}

/// Why a timed-out unit did not start a detection run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another unit currently owns the detection gate
    GateBusy { owner: ProcessId },
    /// The unit's previous run expired unconfirmed; another unit goes next
    Yielded,
    /// The awaited resource was released before the probe could be built
    ResourceFree,
}

/// Chandy-Misra-Haas probe traffic and its outcomes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DetectionEvent {
    /// Probe put on a wait-for edge (initiation or forward)
    ProbeSent {
        probe: ProbeMessage,
        awaited: ResourceId,
    },

    /// Probe taken from the receiver's inbox
    ProbeReceived { probe: ProbeMessage },

    /// Probe discarded without forwarding
    ProbeDropped {
        probe: ProbeMessage,
        reason: DropReason,
    },

    /// Timed-out unit did not initiate
    DetectionSkipped {
        process: ProcessId,
        awaited: ResourceId,
        reason: SkipReason,
    },

    /// Probe came back to its initiator
    DeadlockDetected {
        initiator: ProcessId,
        awaited: ResourceId,
        last_sender: ProcessId,
    },
}
