//! simulate - Chandy-Misra-Haas deadlock detection simulator
//!
//! This is the CLI application: it resolves the configuration, runs the
//! coordinator and reports what happened while the run progresses.

mod cli;
mod error;
mod events;
mod logging;

use crate::cli::Cli;
use crate::error::CliError;
use crate::events::EventHandler;
use clap::Parser;
use cmh_config::Config;
use cmh_coordinator::Coordinator;
use cmh_events::EventReceiver;
use cmh_types::SimulationReport;
use std::path::Path;
use std::process;
use tokio::select;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_file.as_deref(), cli.debug) {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    if let Err(e) = run(cli).await {
        error!("Simulation failed: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting simulate v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration with proper precedence:
    // 1. Start with file config (or defaults)
    let mut config = Config::load_or_default(cli.config.as_deref()).await?;

    // 2. Merge environment variables
    config.merge_env()?;

    // 3. Apply CLI flags (highest precedence)
    apply_cli_config(&mut config, &cli);

    // Nothing starts unless the configuration is usable
    config.validate()?;

    let (event_sender, event_receiver) = cmh_events::channel();
    let coordinator = Coordinator::builder()
        .with_config(config)
        .with_event_sender(event_sender)
        .build()?;

    let shutdown = coordinator.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    let mut event_handler = EventHandler::new(cli.debug);
    let report = run_with_events(coordinator, event_receiver, &mut event_handler).await?;

    info!(
        deadlocks = report.deadlocks.len(),
        self_terminations = report.self_terminations(),
        "Simulation completed successfully"
    );
    Ok(())
}

/// Run the coordinator with concurrent event handling
async fn run_with_events(
    coordinator: Coordinator,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<SimulationReport, CliError> {
    let mut run_future = Box::pin(coordinator.run());

    loop {
        select! {
            // Run completed
            result = &mut run_future => {
                // Drain any remaining events
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result.map_err(CliError::from);
            }

            // Event received
            event = event_receiver.recv() => {
                match event {
                    Some(event) => event_handler.handle_event(event),
                    None => { /* Channel closed: keep waiting for the run to finish */ }
                }
            }
        }
    }
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, cli: &Cli) {
    if let Some(num_processes) = cli.num_processes {
        config.simulation.num_processes = num_processes;
    }
    if let Some(num_resources) = cli.num_resources {
        config.simulation.num_resources = num_resources;
    }
    if let Some(duration) = cli.duration {
        config.simulation.run_duration_secs = duration;
    }
    if let Some(timeout) = cli.request_timeout_ms {
        config.timing.request_timeout_ms = timeout;
    }
    if let Some(seed) = cli.seed {
        config.simulation.seed = Some(seed);
    }
    if cli.respawn {
        config.simulation.respawn_terminated = true;
    }
}

/// Initialize tracing/logging
///
/// With a log file every record goes there as JSON; otherwise records go to
/// stderr so they never mix with the report on stdout.
fn init_tracing(log_file: Option<&Path>, debug_enabled: bool) -> Result<(), CliError> {
    let default_filter = if debug_enabled { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    if let Some(path) = log_file {
        let file = std::fs::File::create(path)?;
        tracing_subscriber::fmt()
            .json()
            .with_writer(file)
            .with_env_filter(filter)
            .init();
    } else if debug_enabled || std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .compact()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        // Quiet by default: the stdout report is the primary output
        tracing_subscriber::fmt()
            .compact()
            .with_writer(std::io::stderr)
            .with_env_filter("warn")
            .init();
    }
    Ok(())
}
