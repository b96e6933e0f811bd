//! Workload policies: which resources a unit asks for and for how long
//! it keeps them

use cmh_types::{ProcessId, ResourceId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

/// What a policy may look at when choosing
#[derive(Debug, Clone, Copy)]
pub struct UnitView<'a> {
    pub process: ProcessId,
    pub held: &'a BTreeSet<ResourceId>,
    /// Size of the resource pool
    pub resources: usize,
    /// 1-based number of the round in progress
    pub round: u64,
}

/// Drives the request/hold/release rounds of one unit
///
/// A round starts with [`begin_round`](WorkloadPolicy::begin_round), then the
/// unit keeps calling [`next_request`](WorkloadPolicy::next_request) and
/// acquiring what it names until it returns `None`. Resources are acquired
/// one after another while earlier ones stay held.
pub trait WorkloadPolicy: Send {
    fn begin_round(&mut self, view: &UnitView<'_>);

    /// Next resource to acquire this round; `None` ends the request phase
    fn next_request(&mut self, view: &UnitView<'_>) -> Option<ResourceId>;

    /// How long to hold everything once the request phase is over
    fn hold_duration(&mut self) -> Duration;

    /// Pause between two rounds
    fn idle_pause(&mut self) -> Duration;

    /// Pause between two successive requests of the same round
    fn request_gap(&self) -> Duration {
        Duration::ZERO
    }

    /// No further rounds will be started
    fn exhausted(&self) -> bool {
        false
    }
}

/// Random consecutive runs of resources with a random hold
///
/// Each round asks for `k` consecutive resource ids (1 <= k <= pool size)
/// starting at a random index and wrapping around the end of the pool.
pub struct RandomPolicy {
    rng: StdRng,
    max_hold: Duration,
    idle_pause: Duration,
    queue: VecDeque<ResourceId>,
}

impl RandomPolicy {
    #[must_use]
    pub fn new(max_hold: Duration, idle_pause: Duration) -> Self {
        Self::with_rng(StdRng::from_os_rng(), max_hold, idle_pause)
    }

    /// Reproducible policy for a fixed seed
    #[must_use]
    pub fn seeded(seed: u64, max_hold: Duration, idle_pause: Duration) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), max_hold, idle_pause)
    }

    fn with_rng(rng: StdRng, max_hold: Duration, idle_pause: Duration) -> Self {
        Self {
            rng,
            max_hold,
            idle_pause,
            queue: VecDeque::new(),
        }
    }
}

impl WorkloadPolicy for RandomPolicy {
    fn begin_round(&mut self, view: &UnitView<'_>) {
        self.queue.clear();
        let pool = view.resources;
        if pool == 0 {
            return;
        }
        let count = self.rng.random_range(1..=pool);
        let start = self.rng.random_range(0..pool);
        self.queue
            .extend((0..count).map(|offset| ResourceId::from_index((start + offset) % pool)));
    }

    fn next_request(&mut self, view: &UnitView<'_>) -> Option<ResourceId> {
        while let Some(resource) = self.queue.pop_front() {
            if !view.held.contains(&resource) {
                return Some(resource);
            }
        }
        None
    }

    fn hold_duration(&mut self) -> Duration {
        let max_ms = u64::try_from(self.max_hold.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.rng.random_range(1..=max_ms))
    }

    fn idle_pause(&mut self) -> Duration {
        self.idle_pause
    }
}

/// One round of a [`ScriptedPolicy`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedRound {
    /// Requested in this order
    pub resources: Vec<ResourceId>,
    pub hold: Duration,
}

impl ScriptedRound {
    #[must_use]
    pub fn new(resources: impl IntoIterator<Item = ResourceId>, hold: Duration) -> Self {
        Self {
            resources: resources.into_iter().collect(),
            hold,
        }
    }
}

/// Deterministic rounds, used to stage specific wait-for graphs
#[derive(Debug, Clone)]
pub struct ScriptedPolicy {
    rounds: Vec<ScriptedRound>,
    next_round: usize,
    current: Option<usize>,
    cursor: usize,
    gap: Duration,
    idle_pause: Duration,
    repeat: bool,
}

impl ScriptedPolicy {
    #[must_use]
    pub fn new(rounds: Vec<ScriptedRound>) -> Self {
        Self {
            rounds,
            next_round: 0,
            current: None,
            cursor: 0,
            gap: Duration::ZERO,
            idle_pause: Duration::ZERO,
            repeat: false,
        }
    }

    #[must_use]
    pub fn with_gap(mut self, gap: Duration) -> Self {
        self.gap = gap;
        self
    }

    #[must_use]
    pub fn with_idle_pause(mut self, idle_pause: Duration) -> Self {
        self.idle_pause = idle_pause;
        self
    }

    /// Start over from the first round once the script runs out
    #[must_use]
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    fn current_round(&self) -> Option<&ScriptedRound> {
        self.current.and_then(|index| self.rounds.get(index))
    }
}

impl WorkloadPolicy for ScriptedPolicy {
    fn begin_round(&mut self, _view: &UnitView<'_>) {
        if self.next_round >= self.rounds.len() {
            if self.repeat && !self.rounds.is_empty() {
                self.next_round = 0;
            } else {
                self.current = None;
                return;
            }
        }
        self.current = Some(self.next_round);
        self.next_round += 1;
        self.cursor = 0;
    }

    fn next_request(&mut self, view: &UnitView<'_>) -> Option<ResourceId> {
        let resources = &self.rounds.get(self.current?)?.resources;
        while let Some(&resource) = resources.get(self.cursor) {
            self.cursor += 1;
            if !view.held.contains(&resource) {
                return Some(resource);
            }
        }
        None
    }

    fn hold_duration(&mut self) -> Duration {
        self.current_round()
            .map_or(Duration::ZERO, |round| round.hold)
    }

    fn idle_pause(&mut self) -> Duration {
        self.idle_pause
    }

    fn request_gap(&self) -> Duration {
        self.gap
    }

    fn exhausted(&self) -> bool {
        !self.repeat && self.next_round >= self.rounds.len()
    }
}
