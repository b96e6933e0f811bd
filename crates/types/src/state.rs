//! Process state machine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a simulated process
///
/// `Idle → Requesting → (Holding | Blocked)`, `Holding → Idle`,
/// `Blocked → Detecting → Requesting | Terminated`. A process may also go
/// `Holding → Requesting` when it asks for another resource while keeping
/// what it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    #[default]
    Idle,
    Requesting,
    Holding,
    Blocked,
    Detecting,
    Terminated,
}

impl ProcessState {
    /// States in which a pending request must be set
    #[must_use]
    pub fn has_pending_request(self) -> bool {
        matches!(self, Self::Requesting | Self::Blocked | Self::Detecting)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// Whether the state machine allows moving from `self` to `next`
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use ProcessState::{Blocked, Detecting, Holding, Idle, Requesting, Terminated};

        match (self, next) {
            (Terminated, _) => false,
            (_, Terminated)
            | (Idle | Holding | Detecting, Requesting)
            | (Requesting, Holding | Blocked)
            | (Holding, Idle)
            | (Blocked, Detecting | Requesting) => true,
            // Run end or shutdown abandons whatever was in flight.
            (Requesting | Blocked | Detecting, Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Holding => "holding",
            Self::Blocked => "blocked",
            Self::Detecting => "detecting",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}
