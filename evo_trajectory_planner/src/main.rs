//! # EVO Trajectory Planner
//!
//! Stand-alone planner runner. Loads a planner configuration and a motion
//! program, performs RT setup, and drives the planner cycle against the
//! simulated machine until the program completes.

use clap::Parser;
use evo_common::config::LogLevel;
use evo_trajectory_planner::config::{load_config, load_program};
use evo_trajectory_planner::cycle::{CycleRunner, rt_setup};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// EVO Trajectory Planner: segment execution engine
#[derive(Parser, Debug)]
#[command(name = "evo_trajectory_planner")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Trajectory planner cycle runner with a simulated machine")]
struct Args {
    /// Planner configuration TOML.
    #[arg(short, long, default_value = "config/planner.toml")]
    config: PathBuf,

    /// Motion program TOML.
    #[arg(short, long)]
    program: PathBuf,

    /// Stop after this many cycles (overrides `simulation.max_cycles`).
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Pace cycles to wall-clock time instead of running back to back.
    #[arg(long)]
    realtime: bool,

    /// CPU core to pin the RT thread to (default: 1).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (default: 80).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    report: bool,
}

fn main() {
    let args = Args::parse();

    // Config is read before tracing starts so its log level applies.
    let config = load_config(&args.config);
    let level = match (&config, args.verbose) {
        (_, true) => Level::DEBUG,
        (Ok(c), false) => level_of(c.shared.log_level),
        (Err(_), false) => Level::INFO,
    };
    setup_tracing(level, args.json);

    info!("EVO Trajectory Planner v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match config {
        Ok(c) => c,
        Err(e) => {
            error!("FATAL: {}: {e}", args.config.display());
            process::exit(1);
        }
    };

    if let Err(e) = run(&args, config) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("EVO Trajectory Planner shutdown complete");
}

fn run(
    args: &Args,
    config: evo_common::trajectory::config::TrajectoryConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Config OK: cycle_time={}µs, queue_size={}",
        config.planner.cycle_time_us, config.planner.queue_size
    );

    let program = load_program(&args.program)?;
    info!(
        "Program '{}' loaded: {} steps",
        program.name,
        program.steps.len()
    );

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        "RT setup complete (cpu_core={}, priority={})",
        args.cpu_core, args.rt_priority
    );

    let mut runner = CycleRunner::new(&config, program)?.with_realtime(args.realtime);
    if let Some(max_cycles) = args.max_cycles {
        runner = runner.with_max_cycles(max_cycles);
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let report = runner.run(&running)?;
    info!(
        "Run {}: {} cycles, final position ({:.4}, {:.4}, {:.4})",
        if report.completed { "complete" } else { "stopped" },
        report.cycles,
        report.final_position.xyz.x,
        report.final_position.xyz.y,
        report.final_position.xyz.z,
    );

    if args.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn level_of(level: LogLevel) -> Level {
    match level {
        LogLevel::Trace => Level::TRACE,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Info => Level::INFO,
        LogLevel::Warn => Level::WARN,
        LogLevel::Error => Level::ERROR,
    }
}

/// Setup tracing subscriber.
fn setup_tracing(level: Level, json: bool) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
