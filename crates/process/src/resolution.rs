//! What a unit does once its own probe comes back

use cmh_types::{ProcessId, ResourceId};

/// Outcome of a confirmed cycle for the confirming unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Release everything, abandon the pending request and stop
    SelfTerminate,
    /// Keep waiting; another member of the cycle has to break it
    Continue,
}

/// Chooses how a confirmed cycle is broken
///
/// Only the initiator ever sees a confirmation, so the policy decides for
/// that one unit.
pub trait ResolutionPolicy: Send + Sync {
    fn resolve(&self, initiator: ProcessId, awaited: ResourceId) -> Resolution;
}

/// The initiator removes itself from the cycle
#[derive(Debug, Clone, Copy, Default)]
pub struct InitiatorTerminates;

impl ResolutionPolicy for InitiatorTerminates {
    fn resolve(&self, _initiator: ProcessId, _awaited: ResourceId) -> Resolution {
        Resolution::SelfTerminate
    }
}
