//! Default values for every tunable of a run
//!
//! These mirror the timings the simulator has always used: a process runs
//! for a minute, gives up on a request after five seconds, holds what it
//! got for up to ten, and rests five seconds between rounds.

pub const DEFAULT_NUM_PROCESSES: usize = 5;
pub const DEFAULT_NUM_RESOURCES: usize = 3;

pub const DEFAULT_RUN_DURATION_SECS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_HOLD_MS: u64 = 10_000;
pub const DEFAULT_IDLE_PAUSE_MS: u64 = 5_000;

/// Two request timeouts: long enough for a probe to cross any cycle
pub const DEFAULT_DETECTION_LEASE_MS: u64 = 10_000;

pub const CONFIG_DIR_NAME: &str = "cmh";
pub const CONFIG_FILE_NAME: &str = "config.toml";
