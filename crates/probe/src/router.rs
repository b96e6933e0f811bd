//! Per-process probe inboxes

use cmh_errors::ProbeError;
use cmh_types::{ProbeMessage, ProcessId};
use dashmap::DashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Receiving end of a unit's probe inbox
pub type ProbeInbox = UnboundedReceiver<ProbeMessage>;

/// Routes probes to the inbox of their receiver
#[derive(Debug, Default)]
pub struct ProbeRouter {
    inboxes: DashMap<ProcessId, UnboundedSender<ProbeMessage>>,
}

impl ProbeRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh inbox for `process`
    ///
    /// Any previous inbox for the same id is replaced; probes still queued
    /// there are lost with it.
    pub fn register(&self, process: ProcessId) -> ProbeInbox {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inboxes.insert(process, tx);
        rx
    }

    pub fn deregister(&self, process: ProcessId) {
        self.inboxes.remove(&process);
    }

    #[must_use]
    pub fn is_registered(&self, process: ProcessId) -> bool {
        self.inboxes.contains_key(&process)
    }

    /// Put `probe` into its receiver's inbox
    ///
    /// # Errors
    ///
    /// Returns `UnknownProcess` when no inbox is registered for the receiver
    /// and `InboxClosed` when the receiving unit has already gone.
    pub fn deliver(&self, probe: ProbeMessage) -> Result<(), ProbeError> {
        let receiver = probe.receiver();
        let inbox = self
            .inboxes
            .get(&receiver)
            .ok_or(ProbeError::UnknownProcess {
                process: receiver.get(),
            })?;
        inbox.send(probe).map_err(|_| ProbeError::InboxClosed {
            process: receiver.get(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deliver_to_registered_inbox() {
        let router = ProbeRouter::new();
        let mut inbox = router.register(ProcessId::new(2));

        let probe = ProbeMessage::initiate(ProcessId::new(1), ProcessId::new(2));
        router.deliver(probe).unwrap();
        assert_eq!(inbox.try_recv().unwrap(), probe);
    }

    #[test]
    fn test_unknown_and_closed_receivers() {
        let router = ProbeRouter::new();
        let probe = ProbeMessage::initiate(ProcessId::new(1), ProcessId::new(3));
        assert_eq!(
            router.deliver(probe),
            Err(ProbeError::UnknownProcess { process: 3 })
        );

        drop(router.register(ProcessId::new(3)));
        assert_eq!(
            router.deliver(probe),
            Err(ProbeError::InboxClosed { process: 3 })
        );

        router.deregister(ProcessId::new(3));
        assert!(!router.is_registered(ProcessId::new(3)));
    }
}
