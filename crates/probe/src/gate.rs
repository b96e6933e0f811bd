//! System-wide detection lease
//!
//! Only one detection run is in flight at a time when the gate is
//! exclusive. Without it, every member of a cycle that times out would
//! initiate, every probe would come back and the whole cycle would
//! self-terminate instead of a single process.

use cmh_types::ProcessId;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Result of trying to start a detection run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateClaim {
    Granted,
    Busy { owner: ProcessId },
    /// The caller's own run expired unconfirmed; others get the next turn
    Yielded,
}

#[derive(Debug, Clone, Copy)]
struct Lease {
    owner: ProcessId,
    expires: Instant,
}

/// Lease-based single-initiator gate
///
/// Each grant starts one detection run with a fixed lease that is never
/// renewed. Once a run expires without being concluded, its owner sits out
/// one further lease period so that any other blocked unit can claim the
/// gate first.
#[derive(Debug)]
pub struct DetectionGate {
    exclusive: bool,
    lease: Duration,
    current: Mutex<Option<Lease>>,
}

impl DetectionGate {
    #[must_use]
    pub fn new(exclusive: bool, lease: Duration) -> Self {
        Self {
            exclusive,
            lease,
            current: Mutex::new(None),
        }
    }

    /// Gate that lets every unit initiate
    #[must_use]
    pub fn open() -> Self {
        Self::new(false, Duration::ZERO)
    }

    /// Start a detection run for `process`
    pub fn try_claim(&self, process: ProcessId) -> GateClaim {
        if !self.exclusive {
            return GateClaim::Granted;
        }
        let now = Instant::now();
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        match *current {
            Some(lease) if lease.expires > now => GateClaim::Busy { owner: lease.owner },
            Some(lease) if lease.owner == process && lease.expires + self.lease > now => {
                GateClaim::Yielded
            }
            _ => {
                *current = Some(Lease {
                    owner: process,
                    expires: now + self.lease,
                });
                GateClaim::Granted
            }
        }
    }

    /// Give the gate up if `process` owns it
    ///
    /// Returns whether anything was released.
    pub fn release(&self, process: ProcessId) -> bool {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.is_some_and(|lease| lease.owner == process) {
            *current = None;
            true
        } else {
            false
        }
    }

    /// Owner of an unexpired lease
    #[must_use]
    pub fn owner(&self) -> Option<ProcessId> {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        current
            .filter(|lease| lease.expires > Instant::now())
            .map(|lease| lease.owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P1: ProcessId = ProcessId::new(1);
    const P2: ProcessId = ProcessId::new(2);

    #[tokio::test(start_paused = true)]
    async fn test_exclusive_gate_admits_one_owner() {
        let gate = DetectionGate::new(true, Duration::from_secs(10));
        assert_eq!(gate.try_claim(P1), GateClaim::Granted);
        assert_eq!(gate.try_claim(P2), GateClaim::Busy { owner: P1 });
        // a running lease is never renewed
        assert_eq!(gate.try_claim(P1), GateClaim::Busy { owner: P1 });

        assert!(!gate.release(P2));
        assert!(gate.release(P1));
        assert_eq!(gate.owner(), None);
        assert_eq!(gate.try_claim(P2), GateClaim::Granted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lease_is_taken_over() {
        let gate = DetectionGate::new(true, Duration::from_secs(10));
        assert_eq!(gate.try_claim(P1), GateClaim::Granted);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(gate.owner(), None);
        assert_eq!(gate.try_claim(P2), GateClaim::Granted);
        assert_eq!(gate.owner(), Some(P2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfirmed_owner_yields_next_turn() {
        let gate = DetectionGate::new(true, Duration::from_millis(100));
        assert_eq!(gate.try_claim(P1), GateClaim::Granted);

        // P1 times out again without its run being concluded
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(gate.try_claim(P1), GateClaim::Yielded);
        assert_eq!(gate.try_claim(P2), GateClaim::Granted);
        assert_eq!(gate.try_claim(P1), GateClaim::Busy { owner: P2 });

        // P2 also goes unconfirmed; P1 gets its turn back
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(gate.try_claim(P2), GateClaim::Yielded);
        assert_eq!(gate.try_claim(P1), GateClaim::Granted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lone_owner_reclaims_after_yield_window() {
        let gate = DetectionGate::new(true, Duration::from_millis(100));
        assert_eq!(gate.try_claim(P1), GateClaim::Granted);
        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(gate.try_claim(P1), GateClaim::Yielded);
        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(gate.try_claim(P1), GateClaim::Granted);
    }

    #[test]
    fn test_open_gate_never_blocks() {
        let gate = DetectionGate::open();
        assert_eq!(gate.try_claim(P1), GateClaim::Granted);
        assert_eq!(gate.try_claim(P2), GateClaim::Granted);
        assert_eq!(gate.owner(), None);
    }
}
