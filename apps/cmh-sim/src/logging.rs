//! Structured logging integration for events
//!
//! Every event drained from the bus becomes one tracing record with the
//! event's ids as structured fields. Levels follow `AppEvent::log_level`.

use cmh_events::{
    AppEvent, DetectionEvent, EventMessage, GeneralEvent, ProcessEvent, SimulationEvent,
};
use tracing::{debug, error, info, warn};

/// Log an `EventMessage` using the tracing infrastructure with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let meta = &message.meta;
    match &message.event {
        AppEvent::General(general) => match general {
            GeneralEvent::Warning { message, context } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    context = ?context,
                    "{message}"
                );
            }
            GeneralEvent::Error { message, details } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    details = ?details,
                    "{message}"
                );
            }
        },

        AppEvent::Process(process_event) => match process_event {
            ProcessEvent::Started {
                process,
                generation,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    process = %process,
                    generation = generation,
                    "Process started"
                );
            }
            ProcessEvent::RequestIssued {
                process,
                resource,
                timeout,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    process = %process,
                    resource = %resource,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "Resource requested"
                );
            }
            ProcessEvent::RequestGranted {
                process,
                resource,
                waited,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    process = %process,
                    resource = %resource,
                    waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                    "Resource granted"
                );
            }
            ProcessEvent::RequestTimedOut {
                process,
                resource,
                holder,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    process = %process,
                    resource = %resource,
                    holder = ?holder,
                    "Resource request timed out"
                );
            }
            ProcessEvent::ResourceReleased {
                process,
                resource,
                next_holder,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    process = %process,
                    resource = %resource,
                    next_holder = ?next_holder,
                    "Resource released"
                );
            }
            ProcessEvent::SelfTerminated {
                process,
                released,
                abandoned,
            } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    process = %process,
                    released = ?released,
                    abandoned = ?abandoned,
                    "Process self-terminated"
                );
            }
            ProcessEvent::Stopped { process, reason } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    process = %process,
                    reason = ?reason,
                    "Process stopped"
                );
            }
        },

        AppEvent::Detection(detection_event) => match detection_event {
            DetectionEvent::ProbeSent { probe, awaited } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    initiator = %probe.initiator(),
                    sender = %probe.sender(),
                    receiver = %probe.receiver(),
                    awaited = %awaited,
                    initiation = probe.is_initiation(),
                    "Probe sent"
                );
            }
            DetectionEvent::ProbeReceived { probe } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    initiator = %probe.initiator(),
                    sender = %probe.sender(),
                    receiver = %probe.receiver(),
                    "Probe received"
                );
            }
            DetectionEvent::ProbeDropped { probe, reason } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    initiator = %probe.initiator(),
                    receiver = %probe.receiver(),
                    reason = ?reason,
                    "Probe dropped"
                );
            }
            DetectionEvent::DetectionSkipped {
                process,
                awaited,
                reason,
            } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    process = %process,
                    awaited = %awaited,
                    reason = ?reason,
                    "Detection skipped"
                );
            }
            DetectionEvent::DeadlockDetected {
                initiator,
                awaited,
                last_sender,
            } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    initiator = %initiator,
                    awaited = %awaited,
                    last_sender = %last_sender,
                    "Deadlock detected"
                );
            }
        },

        AppEvent::Simulation(simulation_event) => match simulation_event {
            SimulationEvent::Started {
                resources,
                processes,
                run_duration,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    resources = resources.len(),
                    processes = processes.len(),
                    run_duration_secs = run_duration.as_secs(),
                    "Simulation started"
                );
            }
            SimulationEvent::UnitRespawned {
                process,
                generation,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    process = %process,
                    generation = generation,
                    "Process respawned"
                );
            }
            SimulationEvent::ShutdownRequested => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    "Shutdown requested"
                );
            }
            SimulationEvent::ResourceReclaimed { resource, holder } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    resource = %resource,
                    holder = %holder,
                    "Resource reclaimed during cleanup"
                );
            }
            SimulationEvent::Completed { report } => {
                let summary = serde_json::to_string(report).unwrap_or_default();
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    deadlocks = report.deadlocks.len(),
                    respawns = report.respawns,
                    report = %summary,
                    "Simulation completed"
                );
            }
        },
    }
}
