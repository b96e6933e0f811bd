//! Integration tests for events

#[cfg(test)]
mod tests {
    use cmh_events::*;
    use cmh_types::{ProbeMessage, ProcessId, ResourceId};

    #[tokio::test]
    async fn test_event_sender_emit() {
        let (tx, mut rx) = channel();

        tx.emit_error("test error");
        tx.emit_warning_with_context("re-acquire", "workload policy");

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first.event,
            AppEvent::General(GeneralEvent::Error { .. })
        ));
        assert_eq!(first.meta.level, EventLevel::Error);

        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second.event,
            AppEvent::General(GeneralEvent::Warning { context: Some(_), .. })
        ));
        assert_eq!(second.meta.level, EventLevel::Warn);
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        // Should not panic when receiver is dropped
        tx.emit_error("ignored");
    }

    #[tokio::test]
    async fn test_detection_events_are_correlated_by_initiator() {
        let (tx, mut rx) = channel();
        let probe = ProbeMessage::initiate(ProcessId::new(2), ProcessId::new(5));
        tx.emit_detection(DetectionEvent::ProbeSent {
            probe,
            awaited: ResourceId::new(1),
        });

        let message = rx.recv().await.unwrap();
        assert_eq!(message.meta.correlation_id.as_deref(), Some("detect:P2"));
        assert_eq!(message.meta.source, EventSource::Detection);
        assert_eq!(message.event.process(), Some(ProcessId::new(5)));
    }

    #[test]
    fn test_deadlock_detected_is_warn_level() {
        let event = AppEvent::Detection(DetectionEvent::DeadlockDetected {
            initiator: ProcessId::new(1),
            awaited: ResourceId::new(2),
            last_sender: ProcessId::new(2),
        });
        assert_eq!(event.log_level(), tracing::Level::WARN);
        assert_eq!(event.log_target(), "cmh::events::detection");
    }

    #[test]
    fn test_event_serialization() {
        let event = AppEvent::Process(ProcessEvent::RequestIssued {
            process: ProcessId::new(1),
            resource: ResourceId::new(3),
            timeout: std::time::Duration::from_secs(5),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["domain"], "process");
        assert_eq!(json["event"]["type"], "RequestIssued");
        assert_eq!(json["event"]["resource"], 3);
    }
}
