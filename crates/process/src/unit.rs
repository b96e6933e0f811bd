//! The process unit actor

use crate::policy::{UnitView, WorkloadPolicy};
use crate::resolution::{Resolution, ResolutionPolicy};
use cmh_errors::Error;
use cmh_events::{EventEmitter, EventSender, ProcessEvent};
use cmh_probe::{ForwardMemo, Initiation, ProbeEngine, ProbeInbox, ProbeVerdict};
use cmh_resources::{AcquireOutcome, ResourcePool};
use cmh_types::{
    DeadlockRecord, ExitReason, ProbeMessage, ProcessId, ProcessState, ResourceId, UnitReport,
};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Shared collaborators handed to every unit of a run
#[derive(Clone)]
pub struct UnitDeps {
    pub pool: Arc<ResourcePool>,
    pub engine: Arc<ProbeEngine>,
    pub resolution: Arc<dyn ResolutionPolicy>,
    pub event_sender: Option<EventSender>,
}

/// Why a wait ended before the awaited future did
enum Interrupt {
    Stop(ExitReason),
    SelfTerminate,
}

/// Either the awaited value or the reason the unit has to stop waiting
type Waited<T> = Result<T, Interrupt>;

/// One simulated process
///
/// The unit owns its state outright; other units only ever see it through
/// the resource pool (as a holder or waiter) and through probes put into its
/// inbox.
pub struct ProcessUnit {
    id: ProcessId,
    state: ProcessState,
    held: BTreeSet<ResourceId>,
    pending: Option<ResourceId>,
    /// Initiators already forwarded during the current wait
    forwarded: ForwardMemo,
    round: u64,
    policy: Box<dyn WorkloadPolicy>,
    inbox: ProbeInbox,
    deps: UnitDeps,
    request_timeout: Duration,
    deadline: Instant,
    shutdown: CancellationToken,
    report: UnitReport,
}

impl EventEmitter for ProcessUnit {
    fn event_sender(&self) -> Option<&EventSender> {
        self.deps.event_sender.as_ref()
    }
}

impl ProcessUnit {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ProcessId,
        generation: u32,
        policy: Box<dyn WorkloadPolicy>,
        inbox: ProbeInbox,
        deps: UnitDeps,
        request_timeout: Duration,
        deadline: Instant,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            state: ProcessState::Idle,
            held: BTreeSet::new(),
            pending: None,
            forwarded: ForwardMemo::new(),
            round: 0,
            policy,
            inbox,
            deps,
            request_timeout,
            deadline,
            shutdown,
            report: UnitReport::new(id, generation),
        }
    }

    #[must_use]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Drive the unit until the run deadline, a shutdown or self-termination
    ///
    /// # Errors
    ///
    /// Returns an error when the pool rejects one of the unit's operations,
    /// most importantly a release of a resource the unit does not hold. The
    /// unit stops immediately in that case and leaves its resources for the
    /// coordinator to reclaim.
    pub async fn run(mut self) -> Result<UnitReport, Error> {
        self.emit_process(ProcessEvent::Started {
            process: self.id,
            generation: self.report.generation,
        });

        let result = self.cycle().await;
        self.deps.engine.conclude(self.id);

        let exit = result?;
        self.report.exit = exit;
        self.emit_process(ProcessEvent::Stopped {
            process: self.id,
            reason: exit,
        });
        Ok(self.report)
    }

    async fn cycle(&mut self) -> Result<ExitReason, Error> {
        loop {
            if self.policy.exhausted() {
                let Err(interrupt) = self.wait_for(std::future::pending::<()>()).await? else {
                    continue;
                };
                return self.interrupted(interrupt);
            }

            self.round += 1;
            let view = view_of(self.id, &self.held, &self.deps.pool, self.round);
            self.policy.begin_round(&view);

            if let Err(interrupt) = self.request_phase().await? {
                return self.interrupted(interrupt);
            }

            if !self.held.is_empty() {
                let hold = self.policy.hold_duration();
                if let Err(interrupt) = self.pause(hold).await? {
                    return self.interrupted(interrupt);
                }
            }
            self.release_all()?;
            self.transition(ProcessState::Idle);
            self.report.rounds_completed += 1;

            let idle = self.policy.idle_pause();
            if let Err(interrupt) = self.pause(idle).await? {
                return self.interrupted(interrupt);
            }
        }
    }

    /// Acquire every resource the policy names for this round
    async fn request_phase(&mut self) -> Result<Waited<()>, Error> {
        let mut first = true;
        loop {
            let view = view_of(self.id, &self.held, &self.deps.pool, self.round);
            let Some(resource) = self.policy.next_request(&view) else {
                return Ok(Ok(()));
            };
            if self.held.contains(&resource) {
                self.emit_warning_with_context(
                    format!("{} asked to re-acquire {resource}", self.id),
                    "workload policy",
                );
                return Ok(Ok(()));
            }

            if !first {
                let gap = self.policy.request_gap();
                if let Err(interrupt) = self.pause(gap).await? {
                    return Ok(Err(interrupt));
                }
            }
            first = false;

            if let Err(interrupt) = self.request(resource).await? {
                return Ok(Err(interrupt));
            }
        }
    }

    /// Wait for `resource`, probing for a cycle after every timeout
    async fn request(&mut self, resource: ResourceId) -> Result<Waited<()>, Error> {
        self.set_pending(Some(resource));
        self.transition(ProcessState::Requesting);

        loop {
            self.emit_process(ProcessEvent::RequestIssued {
                process: self.id,
                resource,
                timeout: self.request_timeout,
            });

            let started = Instant::now();
            let pool = Arc::clone(&self.deps.pool);
            let (process, timeout) = (self.id, self.request_timeout);
            let acquire = async move { pool.acquire(resource, process, timeout).await };

            let outcome = match self.wait_for(acquire).await? {
                Ok(outcome) => outcome?,
                Err(interrupt) => return Ok(Err(interrupt)),
            };

            match outcome {
                AcquireOutcome::Granted => {
                    self.set_pending(None);
                    self.held.insert(resource);
                    self.transition(ProcessState::Holding);
                    self.report.grants += 1;
                    self.deps.engine.conclude(self.id);
                    self.emit_process(ProcessEvent::RequestGranted {
                        process: self.id,
                        resource,
                        waited: started.elapsed(),
                    });
                    return Ok(Ok(()));
                }
                AcquireOutcome::TimedOut => {
                    self.report.timeouts += 1;
                    // The retry is a fresh wait
                    self.forwarded.clear();
                    let holder = self.deps.pool.holder(resource)?;
                    self.emit_process(ProcessEvent::RequestTimedOut {
                        process: self.id,
                        resource,
                        holder,
                    });
                    self.transition(ProcessState::Blocked);
                    self.detect(resource)?;
                    self.transition(ProcessState::Requesting);
                }
            }
        }
    }

    fn detect(&mut self, resource: ResourceId) -> Result<(), Error> {
        self.transition(ProcessState::Detecting);
        if let Initiation::Sent(_) = self.deps.engine.initiate(self.id, resource)? {
            self.report.probes_initiated += 1;
        }
        Ok(())
    }

    async fn pause(&mut self, duration: Duration) -> Result<Waited<()>, Error> {
        if duration.is_zero() {
            return Ok(Ok(()));
        }
        self.wait_for(tokio::time::sleep(duration)).await
    }

    /// Await `future` while servicing probes, the run deadline and shutdown
    ///
    /// Dropping `future` on interruption must be safe; the pool's acquire
    /// withdraws its waiter when dropped.
    async fn wait_for<F: Future>(&mut self, future: F) -> Result<Waited<F::Output>, Error> {
        tokio::pin!(future);
        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => return Ok(Err(Interrupt::Stop(ExitReason::Shutdown))),
                () = tokio::time::sleep_until(self.deadline) => {
                    return Ok(Err(Interrupt::Stop(ExitReason::RunComplete)));
                }
                Some(probe) = self.inbox.recv() => {
                    if self.handle_probe(probe)? {
                        return Ok(Err(Interrupt::SelfTerminate));
                    }
                }
                output = &mut future => return Ok(Ok(output)),
            }
        }
    }

    /// Returns true when the unit has to self-terminate
    fn handle_probe(&mut self, probe: ProbeMessage) -> Result<bool, Error> {
        let verdict = self
            .deps
            .engine
            .receive(self.id, self.pending, probe, &mut self.forwarded)?;
        match verdict {
            ProbeVerdict::Confirmed => {
                let Some(awaited) = self.pending else {
                    return Ok(false);
                };
                match self.deps.resolution.resolve(self.id, awaited) {
                    Resolution::SelfTerminate => Ok(true),
                    Resolution::Continue => {
                        self.deps.engine.conclude(self.id);
                        Ok(false)
                    }
                }
            }
            ProbeVerdict::Forwarded(_) => {
                self.report.probes_forwarded += 1;
                Ok(false)
            }
            ProbeVerdict::Dropped(_) => Ok(false),
        }
    }

    fn interrupted(&mut self, interrupt: Interrupt) -> Result<ExitReason, Error> {
        match interrupt {
            Interrupt::Stop(reason) => {
                self.set_pending(None);
                self.release_all()?;
                self.transition(ProcessState::Idle);
                Ok(reason)
            }
            Interrupt::SelfTerminate => self.self_terminate(),
        }
    }

    /// Break the cycle by releasing everything and giving up the request
    fn self_terminate(&mut self) -> Result<ExitReason, Error> {
        let abandoned = self.pending;
        self.set_pending(None);
        let released = self.release_all()?;
        self.transition(ProcessState::Terminated);
        self.deps.engine.conclude(self.id);

        self.report.deadlock = Some(DeadlockRecord {
            detected_by: self.id,
            terminated: self.id,
            released: released.clone(),
        });
        self.emit_process(ProcessEvent::SelfTerminated {
            process: self.id,
            released,
            abandoned,
        });
        Ok(ExitReason::SelfTerminated)
    }

    fn set_pending(&mut self, pending: Option<ResourceId>) {
        self.pending = pending;
        self.forwarded.clear();
    }

    /// Release every held resource in ascending id order
    fn release_all(&mut self) -> Result<Vec<ResourceId>, Error> {
        let mut released = Vec::with_capacity(self.held.len());
        while let Some(resource) = self.held.pop_first() {
            let next_holder = self.deps.pool.release(resource, self.id)?;
            self.emit_process(ProcessEvent::ResourceReleased {
                process: self.id,
                resource,
                next_holder,
            });
            released.push(resource);
        }
        Ok(released)
    }

    fn transition(&mut self, next: ProcessState) {
        if self.state == next {
            return;
        }
        debug_assert!(
            self.state.can_transition_to(next),
            "{}: {} -> {next}",
            self.id,
            self.state
        );
        tracing::trace!(process = %self.id, from = %self.state, to = %next, "state change");
        self.state = next;
    }
}

fn view_of<'a>(
    process: ProcessId,
    held: &'a BTreeSet<ResourceId>,
    pool: &ResourcePool,
    round: u64,
) -> UnitView<'a> {
    UnitView {
        process,
        held,
        resources: pool.len(),
        round,
    }
}
