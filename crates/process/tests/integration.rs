//! Integration tests for a single process unit

#[cfg(test)]
mod tests {
    use cmh_events::{AppEvent, ProcessEvent};
    use cmh_probe::{DetectionGate, ProbeEngine, ProbeRouter};
    use cmh_process::*;
    use cmh_resources::ResourcePool;
    use cmh_types::{ExitReason, ProbeMessage, ProcessId, ResourceId};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    const TIMEOUT: Duration = Duration::from_secs(1);

    struct Harness {
        pool: Arc<ResourcePool>,
        router: Arc<ProbeRouter>,
        deps: UnitDeps,
        events: cmh_events::EventReceiver,
    }

    fn harness(resources: usize) -> Harness {
        let pool = Arc::new(ResourcePool::new(resources));
        let router = Arc::new(ProbeRouter::new());
        let (tx, events) = cmh_events::channel();
        let engine = ProbeEngine::new(
            pool.clone(),
            router.clone(),
            DetectionGate::new(true, Duration::from_secs(10)),
        )
        .with_event_sender(tx.clone());
        let deps = UnitDeps {
            pool: pool.clone(),
            engine: Arc::new(engine),
            resolution: Arc::new(InitiatorTerminates),
            event_sender: Some(tx),
        };
        Harness {
            pool,
            router,
            deps,
            events,
        }
    }

    fn unit(
        harness: &Harness,
        id: u32,
        policy: ScriptedPolicy,
        run_for: Duration,
        shutdown: CancellationToken,
    ) -> ProcessUnit {
        let process = ProcessId::new(id);
        ProcessUnit::new(
            process,
            0,
            Box::new(policy),
            harness.router.register(process),
            harness.deps.clone(),
            TIMEOUT,
            Instant::now() + run_for,
            shutdown,
        )
    }

    fn script(resources: &[u32], hold_ms: u64) -> ScriptedPolicy {
        ScriptedPolicy::new(vec![ScriptedRound::new(
            resources.iter().copied().map(ResourceId::new),
            Duration::from_millis(hold_ms),
        )])
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncontended_round_completes() {
        let mut harness = harness(2);
        let unit = unit(
            &harness,
            1,
            script(&[1, 2], 200),
            Duration::from_secs(5),
            CancellationToken::new(),
        );

        let report = unit.run().await.unwrap();
        assert_eq!(report.exit, ExitReason::RunComplete);
        assert_eq!(report.grants, 2);
        assert_eq!(report.rounds_completed, 1);
        assert_eq!(report.timeouts, 0);
        assert!(harness.pool.snapshot().iter().all(|r| r.holder.is_none()));

        // Released in ascending order
        let mut released = Vec::new();
        while let Ok(message) = harness.events.try_recv() {
            if let AppEvent::Process(ProcessEvent::ResourceReleased { resource, .. }) =
                message.event
            {
                released.push(resource);
            }
        }
        assert_eq!(released, vec![ResourceId::new(1), ResourceId::new(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returning_probe_triggers_self_termination() {
        let harness = harness(2);
        let p1 = ProcessId::new(1);
        let p2 = ProcessId::new(2);
        // P2 is simulated by the test: it holds R2 and its inbox is ours
        let mut p2_inbox = harness.router.register(p2);
        assert!(harness.pool.try_acquire(ResourceId::new(2), p2).unwrap());

        let unit = unit(
            &harness,
            1,
            script(&[1, 2], 200),
            Duration::from_secs(30),
            CancellationToken::new(),
        );
        let handle = tokio::spawn(unit.run());

        // P1 holds R1, times out on R2 and probes P2
        let probe = p2_inbox.recv().await.unwrap();
        assert_eq!(probe, ProbeMessage::initiate(p1, p2));

        // P2 waits on R1, held by P1: the probe goes back to its initiator
        harness.router.deliver(probe.forward(p2, p1)).unwrap();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.exit, ExitReason::SelfTerminated);
        assert_eq!(report.timeouts, 1);
        assert_eq!(report.probes_initiated, 1);
        let record = report.deadlock.unwrap();
        assert_eq!(record.terminated, p1);
        assert_eq!(record.released, vec![ResourceId::new(1)]);

        assert_eq!(harness.pool.holder(ResourceId::new(1)).unwrap(), None);
        assert!(harness.pool.waiters(ResourceId::new(2)).unwrap().is_empty());
        assert_eq!(harness.pool.holder(ResourceId::new(2)).unwrap(), Some(p2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_mid_wait_releases_everything() {
        let harness = harness(2);
        let outsider = ProcessId::new(9);
        assert!(harness
            .pool
            .try_acquire(ResourceId::new(2), outsider)
            .unwrap());

        let shutdown = CancellationToken::new();
        let unit = unit(
            &harness,
            1,
            script(&[1, 2], 200),
            Duration::from_secs(30),
            shutdown.clone(),
        );
        let handle = tokio::spawn(unit.run());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(
            harness.pool.waiters(ResourceId::new(2)).unwrap(),
            vec![ProcessId::new(1)]
        );
        shutdown.cancel();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.exit, ExitReason::Shutdown);
        assert_eq!(harness.pool.holder(ResourceId::new(1)).unwrap(), None);
        assert!(harness.pool.waiters(ResourceId::new(2)).unwrap().is_empty());
        assert_eq!(
            harness.pool.holder(ResourceId::new(2)).unwrap(),
            Some(outsider)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_while_waiting_is_forwarded() {
        let harness = harness(1);
        let p1 = ProcessId::new(1);
        let p2 = ProcessId::new(2);
        let p3 = ProcessId::new(3);
        let mut p2_inbox = harness.router.register(p2);
        assert!(harness.pool.try_acquire(ResourceId::new(1), p2).unwrap());

        let shutdown = CancellationToken::new();
        let unit = unit(
            &harness,
            1,
            script(&[1], 100),
            Duration::from_secs(30),
            shutdown.clone(),
        );
        let handle = tokio::spawn(unit.run());
        tokio::time::sleep(Duration::from_millis(100)).await;

        // P3's probe reaches P1, which waits on R1 held by P2
        harness
            .router
            .deliver(ProbeMessage::initiate(p3, p1))
            .unwrap();
        let forwarded = p2_inbox.recv().await.unwrap();
        assert_eq!(forwarded, ProbeMessage::new(p3, p1, p2));

        // The same initiator coming around again is not passed on
        harness
            .router
            .deliver(ProbeMessage::new(p3, p2, p1))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(p2_inbox.try_recv().is_err());

        // After a timeout the unit probes on its own and waits afresh
        tokio::time::sleep(TIMEOUT).await;
        assert_eq!(p2_inbox.try_recv().unwrap(), ProbeMessage::initiate(p1, p2));
        harness
            .router
            .deliver(ProbeMessage::new(p3, p2, p1))
            .unwrap();
        let forwarded = p2_inbox.recv().await.unwrap();
        assert_eq!(forwarded, ProbeMessage::new(p3, p1, p2));

        shutdown.cancel();
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.probes_forwarded, 2);
    }
}
