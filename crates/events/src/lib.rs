#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for the CMH deadlock simulator
//!
//! Every observable occurrence in a run (a request, a grant, a probe hop, a
//! confirmed cycle) is emitted as a structured event on an unbounded channel.
//! Nothing below the CLI prints or logs directly; the binary drains the
//! channel and turns events into tracing records and stdout reports.
//!
//! ## Architecture
//!
//! - **Domain-driven events**: grouped as General, Process, Detection, Simulation
//! - **Unified `EventEmitter` trait**: one emission API for senders and structs holding one
//! - **Metadata envelope**: every event travels with an id, timestamp, level and source

pub mod meta;
pub use meta::{EventLevel, EventMeta, EventSource};

pub mod events;
pub use events::{
    AppEvent, DetectionEvent, DropReason, GeneralEvent, ProcessEvent, SimulationEvent, SkipReason,
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// An event together with its metadata envelope
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventMessage {
    pub meta: EventMeta,
    pub event: AppEvent,
}

impl EventMessage {
    /// Wrap an event, deriving level and source from the event itself
    #[must_use]
    pub fn new(event: AppEvent) -> Self {
        let mut meta = EventMeta::new(event.log_level(), event.event_source());
        if let AppEvent::Detection(detection) = &event {
            if let Some(initiator) = detection_initiator(detection) {
                meta = meta.with_correlation_id(format!("detect:{initiator}"));
            }
        }
        Self { meta, event }
    }
}

fn detection_initiator(event: &DetectionEvent) -> Option<cmh_types::ProcessId> {
    match event {
        DetectionEvent::ProbeSent { probe, .. }
        | DetectionEvent::ProbeReceived { probe }
        | DetectionEvent::ProbeDropped { probe, .. } => Some(probe.initiator()),
        DetectionEvent::DeadlockDetected { initiator, .. } => Some(*initiator),
        DetectionEvent::DetectionSkipped { .. } => None,
    }
}

/// Type alias for the event sender
pub type EventSender = UnboundedSender<EventMessage>;

/// Type alias for the event receiver
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<EventMessage>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events throughout the simulator
///
/// This trait provides a single, consistent API for emitting events regardless of
/// whether you have a raw `EventSender` or a struct that contains one.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event through this emitter
    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            // Ignore send errors - if receiver is dropped, we just continue
            let _ = sender.send(EventMessage::new(event));
        }
    }

    /// Emit a process lifecycle event
    fn emit_process(&self, event: ProcessEvent) {
        self.emit(AppEvent::Process(event));
    }

    /// Emit a probe / detection event
    fn emit_detection(&self, event: DetectionEvent) {
        self.emit(AppEvent::Detection(event));
    }

    /// Emit a run-level event
    fn emit_simulation(&self, event: SimulationEvent) {
        self.emit(AppEvent::Simulation(event));
    }

    /// Emit a warning event with context
    fn emit_warning_with_context(&self, message: impl Into<String>, context: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning_with_context(
            message, context,
        )));
    }

    /// Emit an error event
    fn emit_error(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error(message)));
    }

    /// Emit an error event with details
    fn emit_error_with_details(&self, message: impl Into<String>, details: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error_with_details(
            message, details,
        )));
    }
}

/// Implementation of `EventEmitter` for the raw `EventSender`
/// This allows `EventSender` to be used directly where `EventEmitter` is expected
impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}
