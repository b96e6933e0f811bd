//! End-to-end runs over staged and random workloads

use cmh_config::Config;
use cmh_coordinator::{Coordinator, PolicyFactory};
use cmh_events::{AppEvent, DetectionEvent, EventMessage, EventReceiver};
use cmh_process::{ScriptedPolicy, ScriptedRound, WorkloadPolicy};
use cmh_types::{ExitReason, ProcessId, ResourceId, SimulationReport};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const HOLD: Duration = Duration::from_millis(500);

fn config(processes: usize, resources: usize, run_secs: u64) -> Config {
    let mut config = Config::default();
    config.simulation.num_processes = processes;
    config.simulation.num_resources = resources;
    config.simulation.run_duration_secs = run_secs;
    config.timing.request_timeout_ms = 1000;
    config
}

/// One single-round script per process: (resources, gap before each further request)
fn scripts(plan: &[(u32, &[u32], u64)]) -> PolicyFactory {
    let plan: HashMap<ProcessId, (Vec<ResourceId>, Duration)> = plan
        .iter()
        .map(|(process, resources, gap_ms)| {
            (
                ProcessId::new(*process),
                (
                    resources.iter().copied().map(ResourceId::new).collect(),
                    Duration::from_millis(*gap_ms),
                ),
            )
        })
        .collect();
    Arc::new(move |process: ProcessId| -> Box<dyn WorkloadPolicy> {
        let (resources, gap) = plan.get(&process).cloned().unwrap_or_default();
        Box::new(ScriptedPolicy::new(vec![ScriptedRound::new(resources, HOLD)]).with_gap(gap))
    })
}

async fn run(
    coordinator: Coordinator,
    mut events: EventReceiver,
) -> (SimulationReport, Vec<EventMessage>) {
    let report = coordinator.run().await.unwrap();
    let mut collected = Vec::new();
    while let Ok(message) = events.try_recv() {
        collected.push(message);
    }
    (report, collected)
}

fn count_detections(events: &[EventMessage]) -> Vec<ProcessId> {
    events
        .iter()
        .filter_map(|message| match &message.event {
            AppEvent::Detection(DetectionEvent::DeadlockDetected { initiator, .. }) => {
                Some(*initiator)
            }
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn two_by_two_cycle_resolves_with_one_self_termination() {
    let (tx, rx) = cmh_events::channel();
    let coordinator = Coordinator::builder()
        .with_config(config(2, 2, 10))
        .with_policy_factory(scripts(&[(1, &[1, 2], 100), (2, &[2, 1], 100)]))
        .with_event_sender(tx)
        .build()
        .unwrap();

    let (report, events) = run(coordinator, rx).await;

    assert_eq!(report.self_terminations(), 1);
    assert_eq!(report.deadlocks.len(), 1);
    let record = &report.deadlocks[0];
    assert_eq!(record.detected_by, record.terminated);
    assert_eq!(count_detections(&events), vec![record.detected_by]);

    let survivor = if record.terminated == ProcessId::new(1) {
        ProcessId::new(2)
    } else {
        ProcessId::new(1)
    };
    let survivor = report.units_for(survivor).next().unwrap();
    assert_eq!(survivor.exit, ExitReason::RunComplete);
    assert_eq!(survivor.grants, 2);
    assert_eq!(survivor.rounds_completed, 1);
    assert!(report.reclaimed.is_empty());
}

#[tokio::test(start_paused = true)]
async fn single_process_single_resource_never_probes() {
    let (tx, rx) = cmh_events::channel();
    let factory: PolicyFactory = Arc::new(|_: ProcessId| -> Box<dyn WorkloadPolicy> {
        Box::new(
            ScriptedPolicy::new(vec![ScriptedRound::new([ResourceId::new(1)], HOLD)])
                .with_idle_pause(Duration::from_millis(100))
                .repeating(),
        )
    });
    let coordinator = Coordinator::builder()
        .with_config(config(1, 1, 5))
        .with_policy_factory(factory)
        .with_event_sender(tx)
        .build()
        .unwrap();

    let (report, events) = run(coordinator, rx).await;

    let unit = &report.units[0];
    assert_eq!(unit.exit, ExitReason::RunComplete);
    assert_eq!(unit.timeouts, 0);
    assert_eq!(unit.probes_initiated, 0);
    assert!(unit.rounds_completed >= 5);
    assert!(!events
        .iter()
        .any(|message| matches!(message.event, AppEvent::Detection(_))));
}

#[tokio::test(start_paused = true)]
async fn three_cycle_is_broken_by_first_to_time_out() {
    let (tx, rx) = cmh_events::channel();
    let coordinator = Coordinator::builder()
        .with_config(config(3, 3, 10))
        .with_policy_factory(scripts(&[
            (1, &[1, 2], 100),
            (2, &[2, 3], 200),
            (3, &[3, 1], 300),
        ]))
        .with_event_sender(tx)
        .build()
        .unwrap();

    let (report, events) = run(coordinator, rx).await;

    let p1 = ProcessId::new(1);
    assert_eq!(report.self_terminations(), 1);
    assert_eq!(count_detections(&events), vec![p1]);
    assert_eq!(report.deadlocks[0].terminated, p1);
    assert_eq!(report.deadlocks[0].released, vec![ResourceId::new(1)]);

    for survivor in [ProcessId::new(2), ProcessId::new(3)] {
        let unit = report.units_for(survivor).next().unwrap();
        assert_eq!(unit.exit, ExitReason::RunComplete);
        assert_eq!(unit.rounds_completed, 1);
        assert_eq!(unit.grants, 2);
    }
}

#[tokio::test(start_paused = true)]
async fn self_terminated_unit_is_respawned() {
    let mut config = config(2, 2, 10);
    config.simulation.respawn_terminated = true;
    let coordinator = Coordinator::builder()
        .with_config(config)
        .with_policy_factory(scripts(&[(1, &[1, 2], 100), (2, &[2, 1], 100)]))
        .build()
        .unwrap();

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.respawns, 1);
    let terminated = report.deadlocks[0].terminated;
    let incarnations: Vec<_> = report.units_for(terminated).collect();
    assert_eq!(incarnations.len(), 2);
    let fresh = incarnations
        .iter()
        .find(|unit| unit.generation == 1)
        .unwrap();
    assert_eq!(fresh.exit, ExitReason::RunComplete);
    assert_eq!(fresh.rounds_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_every_unit_and_frees_resources() {
    let mut config = config(5, 3, 60);
    config.simulation.seed = Some(11);
    let coordinator = Coordinator::builder()
        .with_config(config)
        .build()
        .unwrap();
    let shutdown = coordinator.shutdown_handle();
    let pool = Arc::clone(coordinator.pool());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        shutdown.cancel();
    });

    let report = coordinator.run().await.unwrap();
    assert!(report
        .units
        .iter()
        .filter(|unit| unit.exit != ExitReason::SelfTerminated)
        .all(|unit| unit.exit == ExitReason::Shutdown));
    assert!(report.reclaimed.is_empty());
    assert!(pool
        .snapshot()
        .iter()
        .all(|resource| resource.holder.is_none() && resource.waiters.is_empty()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn random_contention_keeps_pool_consistent() {
    let mut config = config(6, 3, 2);
    config.timing.request_timeout_ms = 50;
    config.timing.max_hold_ms = 30;
    config.timing.idle_pause_ms = 10;
    config.simulation.respawn_terminated = true;
    let coordinator = Coordinator::builder()
        .with_config(config)
        .build()
        .unwrap();
    let pool = Arc::clone(coordinator.pool());

    let report = coordinator.run().await.unwrap();

    assert!(report.units.iter().any(|unit| unit.grants > 0));
    assert_eq!(report.deadlocks.len(), report.self_terminations());
    assert!(pool.snapshot().iter().all(|resource| resource.holder.is_none()));
}

#[tokio::test(start_paused = true)]
async fn waiter_outside_cycle_does_not_starve_detection() {
    // P2 and P3 wait on each other; P1 waits on P2 without being on the cycle
    let (tx, rx) = cmh_events::channel();
    let coordinator = Coordinator::builder()
        .with_config(config(3, 3, 10))
        .with_policy_factory(scripts(&[
            (1, &[3, 1], 100),
            (2, &[1, 2], 100),
            (3, &[2, 1], 100),
        ]))
        .with_event_sender(tx)
        .build()
        .unwrap();

    let (report, events) = run(coordinator, rx).await;

    assert_eq!(report.self_terminations(), 1);
    assert_eq!(report.deadlocks.len(), 1);
    let terminated = report.deadlocks[0].terminated;
    assert_ne!(terminated, ProcessId::new(1));
    assert_eq!(count_detections(&events), vec![terminated]);

    let outsider = report.units_for(ProcessId::new(1)).next().unwrap();
    assert_eq!(outsider.exit, ExitReason::RunComplete);
    assert_eq!(outsider.rounds_completed, 1);
    assert_eq!(outsider.grants, 2);

    // Each cycle member passes a given run's message on at most once
    for unit in &report.units {
        assert!(unit.probes_forwarded <= 4, "{unit:?}");
    }
    assert!(events.len() < 500, "{} events", events.len());
}
