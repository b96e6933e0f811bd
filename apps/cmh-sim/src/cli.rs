//! Command line interface definition

use clap::Parser;
use std::path::PathBuf;

/// Simulate processes contending for resources and resolve their deadlocks
/// with Chandy-Misra-Haas probes
#[derive(Debug, Parser)]
#[command(name = "simulate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Chandy-Misra-Haas deadlock detection simulator")]
#[command(long_about = None)]
pub struct Cli {
    /// Number of processes to simulate [default: 5]
    #[arg(short = 'n', long = "num_processes", value_name = "N")]
    pub num_processes: Option<usize>,

    /// Number of single-instance resources [default: 3]
    #[arg(short = 'm', long = "num_resources", value_name = "M")]
    pub num_resources: Option<usize>,

    /// Use alternate config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Length of the run in seconds
    #[arg(long, value_name = "SECS")]
    pub duration: Option<u64>,

    /// How long a request waits before detection starts
    #[arg(long, value_name = "MS")]
    pub request_timeout_ms: Option<u64>,

    /// Seed for the random workload
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Replace self-terminated processes with fresh ones
    #[arg(long)]
    pub respawn: bool,

    /// Write JSON logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging and per-event output
    #[arg(long)]
    pub debug: bool,
}
