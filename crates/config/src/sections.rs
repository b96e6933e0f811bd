//! Configuration sections

use crate::constants::{
    DEFAULT_DETECTION_LEASE_MS, DEFAULT_IDLE_PAUSE_MS, DEFAULT_MAX_HOLD_MS,
    DEFAULT_NUM_PROCESSES, DEFAULT_NUM_RESOURCES, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_RUN_DURATION_SECS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Population and lifetime of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_num_processes")]
    pub num_processes: usize,
    #[serde(default = "default_num_resources")]
    pub num_resources: usize,
    #[serde(default = "default_run_duration_secs")]
    pub run_duration_secs: u64,
    #[serde(default)]
    pub respawn_terminated: bool,
    /// Seed for the random workload; `None` draws from entropy
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_processes: DEFAULT_NUM_PROCESSES,
            num_resources: DEFAULT_NUM_RESOURCES,
            run_duration_secs: DEFAULT_RUN_DURATION_SECS,
            respawn_terminated: false,
            seed: None,
        }
    }
}

impl SimulationConfig {
    #[must_use]
    pub fn run_duration(&self) -> Duration {
        Duration::from_secs(self.run_duration_secs)
    }
}

/// Request, hold and pause timings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_hold_ms")]
    pub max_hold_ms: u64,
    #[serde(default = "default_idle_pause_ms")]
    pub idle_pause_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_hold_ms: DEFAULT_MAX_HOLD_MS,
            idle_pause_ms: DEFAULT_IDLE_PAUSE_MS,
        }
    }
}

impl TimingConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn max_hold(&self) -> Duration {
        Duration::from_millis(self.max_hold_ms)
    }

    #[must_use]
    pub fn idle_pause(&self) -> Duration {
        Duration::from_millis(self.idle_pause_ms)
    }
}

/// Detection gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Allow only one detection run at a time across the whole system
    #[serde(default = "default_exclusive")]
    pub exclusive: bool,
    /// Upper bound on one detection run, never longer than a request timeout
    #[serde(default = "default_lease_ms")]
    pub lease_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            exclusive: true,
            lease_ms: DEFAULT_DETECTION_LEASE_MS,
        }
    }
}

impl DetectionConfig {
    #[must_use]
    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }
}

// Default value functions for serde
fn default_num_processes() -> usize {
    DEFAULT_NUM_PROCESSES
}

fn default_num_resources() -> usize {
    DEFAULT_NUM_RESOURCES
}

fn default_run_duration_secs() -> u64 {
    DEFAULT_RUN_DURATION_SECS
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_max_hold_ms() -> u64 {
    DEFAULT_MAX_HOLD_MS
}

fn default_idle_pause_ms() -> u64 {
    DEFAULT_IDLE_PAUSE_MS
}

fn default_exclusive() -> bool {
    true
}

fn default_lease_ms() -> u64 {
    DEFAULT_DETECTION_LEASE_MS
}
