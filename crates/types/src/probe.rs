//! Probe messages exchanged along wait-for edges

use crate::ProcessId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable `(initiator, sender, receiver)` triple
///
/// A probe always travels from a waiting `sender` to the current holder of
/// the resource that sender awaits. Fields are private so a probe cannot be
/// altered in flight; forwarding builds a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProbeMessage {
    initiator: ProcessId,
    sender: ProcessId,
    receiver: ProcessId,
}

impl ProbeMessage {
    /// Probe opening a detection run: the initiator is also the sender
    #[must_use]
    pub const fn initiate(initiator: ProcessId, receiver: ProcessId) -> Self {
        Self {
            initiator,
            sender: initiator,
            receiver,
        }
    }

    #[must_use]
    pub const fn new(initiator: ProcessId, sender: ProcessId, receiver: ProcessId) -> Self {
        Self {
            initiator,
            sender,
            receiver,
        }
    }

    /// Probe carrying the same initiator one edge further
    #[must_use]
    pub const fn forward(&self, sender: ProcessId, receiver: ProcessId) -> Self {
        Self {
            initiator: self.initiator,
            sender,
            receiver,
        }
    }

    #[must_use]
    pub const fn initiator(&self) -> ProcessId {
        self.initiator
    }

    #[must_use]
    pub const fn sender(&self) -> ProcessId {
        self.sender
    }

    #[must_use]
    pub const fn receiver(&self) -> ProcessId {
        self.receiver
    }

    /// True for the first hop of a detection run
    #[must_use]
    pub fn is_initiation(&self) -> bool {
        self.initiator == self.sender
    }
}

impl fmt::Display for ProbeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "probe(initiator={}, sender={}, receiver={})",
            self.initiator, self.sender, self.receiver
        )
    }
}
