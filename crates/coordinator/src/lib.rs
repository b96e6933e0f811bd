#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Run orchestration for the CMH deadlock simulator
//!
//! The [`Coordinator`] creates the resource pool, the probe machinery and one
//! [`ProcessUnit`] per process, runs the units as independent tasks until the
//! shared run deadline or a shutdown, and returns the aggregated
//! [`SimulationReport`].

use cmh_config::Config;
use cmh_errors::{Error, SimulationError};
use cmh_events::{EventEmitter, EventSender, SimulationEvent};
use cmh_probe::{DetectionGate, ProbeEngine, ProbeRouter};
use cmh_process::{
    InitiatorTerminates, ProcessUnit, RandomPolicy, ResolutionPolicy, UnitDeps, WorkloadPolicy,
};
use cmh_resources::ResourcePool;
use cmh_types::{ExitReason, ProcessId, SimulationReport, UnitReport};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Builds the workload policy of a unit, called again for every respawn
pub type PolicyFactory = Arc<dyn Fn(ProcessId) -> Box<dyn WorkloadPolicy> + Send + Sync>;

type UnitOutcome = (ProcessId, Result<UnitReport, Error>);

/// Owner of a run's resources, units and lifecycle
pub struct Coordinator {
    config: Config,
    pool: Arc<ResourcePool>,
    router: Arc<ProbeRouter>,
    engine: Arc<ProbeEngine>,
    policies: PolicyFactory,
    resolution: Arc<dyn ResolutionPolicy>,
    tx: Option<EventSender>,
    shutdown: CancellationToken,
}

impl EventEmitter for Coordinator {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl Coordinator {
    #[must_use]
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// Token that stops the run when cancelled
    #[must_use]
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<ResourcePool> {
        &self.pool
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every unit to completion and collect the report
    ///
    /// Respawns self-terminated units when configured to. Once every unit
    /// has been joined, any resource still held is reclaimed.
    ///
    /// # Errors
    ///
    /// Returns the first unit failure (for example a release by a
    /// non-holder) after all other units have been stopped and joined.
    pub async fn run(self) -> Result<SimulationReport, Error> {
        let resources: Vec<_> = self.pool.ids().collect();
        let processes: Vec<_> = ProcessId::range(self.config.simulation.num_processes).collect();
        let run_duration = self.config.simulation.run_duration();
        self.emit_simulation(SimulationEvent::Started {
            resources,
            processes: processes.clone(),
            run_duration,
        });

        let deadline = Instant::now() + run_duration;
        let deps = UnitDeps {
            pool: Arc::clone(&self.pool),
            engine: Arc::clone(&self.engine),
            resolution: Arc::clone(&self.resolution),
            event_sender: self.tx.clone(),
        };

        let mut units = JoinSet::new();
        let mut generations: HashMap<ProcessId, u32> = HashMap::new();
        for &process in &processes {
            generations.insert(process, 0);
            self.spawn_unit(&mut units, process, 0, deadline, &deps);
        }

        let mut report = SimulationReport::default();
        let mut failure: Option<Error> = None;
        let mut shutdown_seen = false;

        loop {
            let joined = tokio::select! {
                () = self.shutdown.cancelled(), if !shutdown_seen => {
                    shutdown_seen = true;
                    if failure.is_none() {
                        self.emit_simulation(SimulationEvent::ShutdownRequested);
                    }
                    continue;
                }
                joined = units.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok((process, Ok(unit_report))) => {
                    self.router.deregister(process);
                    let respawn = self.config.simulation.respawn_terminated
                        && unit_report.exit == ExitReason::SelfTerminated
                        && failure.is_none()
                        && !self.shutdown.is_cancelled()
                        && Instant::now() < deadline;
                    if let Some(record) = &unit_report.deadlock {
                        report.deadlocks.push(record.clone());
                    }
                    report.units.push(unit_report);

                    if respawn {
                        let generation = generations.entry(process).or_insert(0);
                        *generation += 1;
                        let generation = *generation;
                        self.spawn_unit(&mut units, process, generation, deadline, &deps);
                        report.respawns += 1;
                        self.emit_simulation(SimulationEvent::UnitRespawned {
                            process,
                            generation,
                        });
                    }
                }
                Ok((process, Err(err))) => {
                    self.router.deregister(process);
                    self.emit_error_with_details(format!("unit {process} failed"), err.to_string());
                    failure.get_or_insert(err);
                    self.shutdown.cancel();
                }
                Err(join_err) => {
                    let err: Error = SimulationError::UnitPanicked {
                        message: join_err.to_string(),
                    }
                    .into();
                    self.emit_error(err.to_string());
                    failure.get_or_insert(err);
                    self.shutdown.cancel();
                }
            }
        }

        report.reclaimed = self.pool.reclaim_all();
        for reclaimed in &report.reclaimed {
            self.emit_simulation(SimulationEvent::ResourceReclaimed {
                resource: reclaimed.resource,
                holder: reclaimed.holder,
            });
        }

        if let Some(err) = failure {
            return Err(err);
        }

        self.emit_simulation(SimulationEvent::Completed {
            report: report.clone(),
        });
        Ok(report)
    }

    fn spawn_unit(
        &self,
        units: &mut JoinSet<UnitOutcome>,
        process: ProcessId,
        generation: u32,
        deadline: Instant,
        deps: &UnitDeps,
    ) {
        let inbox = self.router.register(process);
        let unit = ProcessUnit::new(
            process,
            generation,
            (self.policies)(process),
            inbox,
            deps.clone(),
            self.config.timing.request_timeout(),
            deadline,
            self.shutdown.child_token(),
        );
        tracing::debug!(%process, generation, "spawning unit");
        units.spawn(async move { (process, unit.run().await) });
    }
}

/// Builder for a [`Coordinator`]
pub struct CoordinatorBuilder {
    config: Option<Config>,
    policies: Option<PolicyFactory>,
    resolution: Option<Arc<dyn ResolutionPolicy>>,
    tx: Option<EventSender>,
    shutdown: Option<CancellationToken>,
}

impl CoordinatorBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: None,
            policies: None,
            resolution: None,
            tx: None,
            shutdown: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the random workload derived from the configuration
    #[must_use]
    pub fn with_policy_factory(mut self, policies: PolicyFactory) -> Self {
        self.policies = Some(policies);
        self
    }

    #[must_use]
    pub fn with_resolution(mut self, resolution: Arc<dyn ResolutionPolicy>) -> Self {
        self.resolution = Some(resolution);
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Use an externally owned shutdown token
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Validate the configuration and wire up the run
    ///
    /// # Errors
    ///
    /// Returns `MissingComponent` without a configuration and
    /// `InvalidConfiguration` when the configuration does not validate.
    pub fn build(self) -> Result<Coordinator, Error> {
        let config = self
            .config
            .ok_or_else(|| SimulationError::MissingComponent {
                component: "config".to_string(),
            })?;
        config.validate()?;

        let pool = Arc::new(ResourcePool::new(config.simulation.num_resources));
        let router = Arc::new(ProbeRouter::new());
        let gate = DetectionGate::new(config.detection.exclusive, config.detection_lease());
        let mut engine = ProbeEngine::new(Arc::clone(&pool), Arc::clone(&router), gate);
        if let Some(tx) = &self.tx {
            engine = engine.with_event_sender(tx.clone());
        }

        let policies = self.policies.unwrap_or_else(|| random_policies(&config));
        let resolution = self
            .resolution
            .unwrap_or_else(|| Arc::new(InitiatorTerminates));

        Ok(Coordinator {
            config,
            pool,
            router,
            engine: Arc::new(engine),
            policies,
            resolution,
            tx: self.tx,
            shutdown: self.shutdown.unwrap_or_default(),
        })
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Random workload as configured, one independent stream per process
fn random_policies(config: &Config) -> PolicyFactory {
    let max_hold = config.timing.max_hold();
    let idle_pause = config.timing.idle_pause();
    let seed = config.simulation.seed;
    Arc::new(move |process: ProcessId| -> Box<dyn WorkloadPolicy> {
        match seed {
            Some(seed) => Box::new(RandomPolicy::seeded(
                seed.wrapping_add(u64::from(process.get())),
                max_hold,
                idle_pause,
            )),
            None => Box::new(RandomPolicy::new(max_hold, idle_pause)),
        }
    })
}
