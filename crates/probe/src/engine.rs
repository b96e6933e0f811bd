//! Probe construction, forwarding and cycle confirmation

use crate::gate::{DetectionGate, GateClaim};
use crate::router::ProbeRouter;
use cmh_errors::Error;
use cmh_events::{DetectionEvent, DropReason, EventEmitter, EventSender, SkipReason};
use cmh_resources::ResourcePool;
use cmh_types::{ProbeMessage, ProcessId, ResourceId};
use std::collections::HashSet;
use std::sync::Arc;

/// What happened when a timed-out unit tried to start detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiation {
    /// First probe is on its way to the holder of the awaited resource
    Sent(ProbeMessage),
    /// No probe was built
    Skipped(SkipReason),
    /// A probe was built but could not be delivered
    Dropped(DropReason),
}

/// Decision taken on a probe a unit received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeVerdict {
    /// The probe came back to its still-waiting initiator
    Confirmed,
    /// The probe moved one edge further along the wait-for graph
    Forwarded(ProbeMessage),
    Dropped(DropReason),
}

/// Initiators whose probes a unit already passed on during its current wait
///
/// The owning unit clears it whenever its pending request changes or times
/// out, so a probe circling a cycle its initiator is not part of is
/// forwarded at most once per member and wait.
#[derive(Debug, Default)]
pub struct ForwardMemo {
    initiators: HashSet<ProcessId>,
}

impl ForwardMemo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.initiators.clear();
    }

    #[must_use]
    pub fn contains(&self, initiator: ProcessId) -> bool {
        self.initiators.contains(&initiator)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.initiators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.initiators.is_empty()
    }
}

/// Shared probe engine used by every process unit of a run
pub struct ProbeEngine {
    pool: Arc<ResourcePool>,
    router: Arc<ProbeRouter>,
    gate: DetectionGate,
    event_sender: Option<EventSender>,
}

impl EventEmitter for ProbeEngine {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl ProbeEngine {
    #[must_use]
    pub fn new(pool: Arc<ResourcePool>, router: Arc<ProbeRouter>, gate: DetectionGate) -> Self {
        Self {
            pool,
            router,
            gate,
            event_sender: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, event_sender: EventSender) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    #[must_use]
    pub fn router(&self) -> &Arc<ProbeRouter> {
        &self.router
    }

    #[must_use]
    pub fn gate(&self) -> &DetectionGate {
        &self.gate
    }

    /// Start a detection run for `initiator`, which timed out on `awaited`
    ///
    /// # Errors
    ///
    /// Returns an error only if `awaited` is not a resource of the pool.
    pub fn initiate(&self, initiator: ProcessId, awaited: ResourceId) -> Result<Initiation, Error> {
        let Some(holder) = self.pool.holder(awaited)? else {
            return Ok(self.skip(initiator, awaited, SkipReason::ResourceFree));
        };

        match self.gate.try_claim(initiator) {
            GateClaim::Granted => {}
            GateClaim::Busy { owner } => {
                return Ok(self.skip(initiator, awaited, SkipReason::GateBusy { owner }));
            }
            GateClaim::Yielded => return Ok(self.skip(initiator, awaited, SkipReason::Yielded)),
        }

        let probe = ProbeMessage::initiate(initiator, holder);
        Ok(match self.send(probe, awaited) {
            Some(reason) => Initiation::Dropped(reason),
            None => Initiation::Sent(probe),
        })
    }

    /// Apply the probe rules for `me`, whose pending request is `awaited`
    ///
    /// Confirmation requires that `me` is the initiator and still waiting
    /// on a resource someone else holds; a probe outliving its initiator's
    /// request is stale. A waiting non-initiator forwards to whoever holds
    /// the resource it awaits, once per initiator as recorded in `memo`.
    /// Everything else is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error only if `awaited` is not a resource of the pool.
    pub fn receive(
        &self,
        me: ProcessId,
        awaited: Option<ResourceId>,
        probe: ProbeMessage,
        memo: &mut ForwardMemo,
    ) -> Result<ProbeVerdict, Error> {
        self.emit_detection(DetectionEvent::ProbeReceived { probe });

        if probe.receiver() != me {
            return Ok(self.drop_probe(probe, DropReason::Misrouted));
        }
        let Some(awaited) = awaited else {
            return Ok(self.drop_probe(probe, DropReason::ReceiverNotWaiting));
        };

        match self.pool.holder(awaited)? {
            None => Ok(self.drop_probe(probe, DropReason::NoHolder)),
            // Granted, but the unit has not observed it yet.
            Some(holder) if holder == me => {
                Ok(self.drop_probe(probe, DropReason::ReceiverNotWaiting))
            }
            Some(_) if probe.initiator() == me => {
                self.emit_detection(DetectionEvent::DeadlockDetected {
                    initiator: me,
                    awaited,
                    last_sender: probe.sender(),
                });
                Ok(ProbeVerdict::Confirmed)
            }
            Some(_) if memo.contains(probe.initiator()) => {
                Ok(self.drop_probe(probe, DropReason::AlreadyForwarded))
            }
            Some(holder) => {
                let forwarded = probe.forward(me, holder);
                Ok(match self.send(forwarded, awaited) {
                    Some(reason) => ProbeVerdict::Dropped(reason),
                    None => {
                        memo.initiators.insert(probe.initiator());
                        ProbeVerdict::Forwarded(forwarded)
                    }
                })
            }
        }
    }

    /// Detection run of `process` is over; free the gate if it owns it
    pub fn conclude(&self, process: ProcessId) {
        if self.gate.release(process) {
            tracing::trace!(%process, "detection gate released");
        }
    }

    fn send(&self, probe: ProbeMessage, awaited: ResourceId) -> Option<DropReason> {
        self.emit_detection(DetectionEvent::ProbeSent { probe, awaited });
        match self.router.deliver(probe) {
            Ok(()) => None,
            Err(err) => {
                tracing::trace!(%probe, error = %err, "probe undeliverable");
                self.drop_probe(probe, DropReason::Unroutable);
                Some(DropReason::Unroutable)
            }
        }
    }

    fn drop_probe(&self, probe: ProbeMessage, reason: DropReason) -> ProbeVerdict {
        self.emit_detection(DetectionEvent::ProbeDropped { probe, reason });
        ProbeVerdict::Dropped(reason)
    }

    fn skip(&self, process: ProcessId, awaited: ResourceId, reason: SkipReason) -> Initiation {
        self.emit_detection(DetectionEvent::DetectionSkipped {
            process,
            awaited,
            reason,
        });
        Initiation::Skipped(reason)
    }
}
