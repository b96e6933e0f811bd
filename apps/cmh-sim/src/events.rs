//! Event handling and stdout reporting

use crate::logging::log_event_with_tracing;
use cmh_events::{AppEvent, DetectionEvent, EventMessage, ProcessEvent, SimulationEvent};
use cmh_types::SimulationReport;
use std::fmt::Display;

/// Turns events into tracing records and operator-facing report lines
pub struct EventHandler {
    /// Also print every process and probe event
    verbose: bool,
}

impl EventHandler {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, message: EventMessage) {
        log_event_with_tracing(&message);

        match &message.event {
            AppEvent::Simulation(SimulationEvent::Started {
                resources,
                processes,
                run_duration,
            }) => {
                println!(
                    "created {} resources: {}",
                    resources.len(),
                    join(resources)
                );
                println!(
                    "created {} processes: {}",
                    processes.len(),
                    join(processes)
                );
                println!("running for {}s", run_duration.as_secs());
            }
            AppEvent::Detection(DetectionEvent::ProbeSent { probe, awaited })
                if probe.is_initiation() =>
            {
                println!(
                    "process {} initiating deadlock detection (waiting on {awaited})",
                    probe.initiator()
                );
            }
            AppEvent::Detection(DetectionEvent::DeadlockDetected { initiator, .. }) => {
                println!("Deadlock detected by process {initiator}");
            }
            AppEvent::Process(ProcessEvent::SelfTerminated {
                process, released, ..
            }) => {
                println!(
                    "process {process} self-terminating to break the deadlock (released: {})",
                    join(released)
                );
            }
            AppEvent::Simulation(SimulationEvent::UnitRespawned {
                process,
                generation,
            }) => {
                println!("process {process} respawned (generation {generation})");
            }
            AppEvent::Simulation(SimulationEvent::ShutdownRequested) => {
                println!("shutdown requested, stopping processes");
            }
            AppEvent::Simulation(SimulationEvent::ResourceReclaimed { resource, holder }) => {
                println!("reclaimed {resource} from {holder}");
            }
            AppEvent::Simulation(SimulationEvent::Completed { report }) => {
                print_summary(report);
            }
            AppEvent::Process(_) | AppEvent::Detection(_) if self.verbose => {
                println!(
                    "[{}] {}",
                    message.meta.timestamp.format("%H:%M:%S%.3f"),
                    describe(&message.event)
                );
            }
            _ => {}
        }
    }
}

fn print_summary(report: &SimulationReport) {
    println!(
        "simulation finished: {} deadlocks resolved, {} request timeouts, {} detection runs, {} respawns",
        report.deadlocks.len(),
        report.total_timeouts(),
        report.total_probes_initiated(),
        report.respawns
    );
}

fn join<T: Display>(items: &[T]) -> String {
    let joined: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("[{}]", joined.join(", "))
}

fn describe(event: &AppEvent) -> String {
    match event {
        AppEvent::Process(event) => match event {
            ProcessEvent::Started { process, .. } => format!("{process} started"),
            ProcessEvent::RequestIssued {
                process, resource, ..
            } => format!("{process} requests {resource}"),
            ProcessEvent::RequestGranted {
                process, resource, ..
            } => format!("{process} acquired {resource}"),
            ProcessEvent::RequestTimedOut {
                process, resource, ..
            } => format!("{process} timed out waiting for {resource}"),
            ProcessEvent::ResourceReleased {
                process, resource, ..
            } => format!("{process} released {resource}"),
            ProcessEvent::SelfTerminated { process, .. } => format!("{process} self-terminated"),
            ProcessEvent::Stopped { process, reason } => format!("{process} stopped ({reason:?})"),
        },
        AppEvent::Detection(event) => match event {
            DetectionEvent::ProbeSent { probe, .. } => format!("sent {probe}"),
            DetectionEvent::ProbeReceived { probe } => format!("received {probe}"),
            DetectionEvent::ProbeDropped { probe, reason } => {
                format!("dropped {probe} ({reason:?})")
            }
            DetectionEvent::DetectionSkipped {
                process, reason, ..
            } => format!("{process} skipped detection ({reason:?})"),
            DetectionEvent::DeadlockDetected { initiator, .. } => {
                format!("{initiator} confirmed a cycle")
            }
        },
        other => format!("{other:?}"),
    }
}
