//! Shipped configuration and programs, run end to end.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use evo_common::trajectory::pose::Pose;
use evo_common::trajectory::state::TermCond;
use evo_trajectory_planner::config::{load_config, load_program};
use evo_trajectory_planner::cycle::{CycleRunner, RunReport};

fn config_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../config")
}

fn run_program(name: &str) -> RunReport {
    let dir = config_dir();
    let config = load_config(&dir.join("planner.toml")).unwrap();
    let program = load_program(&dir.join("programs").join(format!("{name}.toml"))).unwrap();
    assert_eq!(program.name, name);

    let running = AtomicBool::new(true);
    let mut runner = CycleRunner::new(&config, program).unwrap();
    runner.run(&running).unwrap()
}

#[test]
fn shipped_config_loads() {
    let config = load_config(&config_dir().join("planner.toml")).unwrap();
    assert_eq!(config.planner.cycle_time_us, 1000);
    assert_eq!(config.planner.term_cond, TermCond::Blend);
    assert!(config.planner.queue_size >= 2);
    assert_eq!(config.simulation.initial_position, Pose::ZERO);
}

#[test]
fn square_program_blends_and_returns_home() {
    let report = run_program("square");
    assert!(report.completed);
    assert_eq!(report.final_position, Pose::ZERO);
    assert_eq!(report.segments_queued, 4);
    assert!(report.blending_cycles > 0);
    assert!(report.peak_velocity <= 25.0 + 1e-6);
    // Output 0 switched on at the start and off for the last side.
    assert_eq!(report.outputs.dout_writes, 2);
    assert_eq!(report.outputs.dout_mask, 0);
}

#[test]
fn rigid_tap_program_retracts_clear() {
    let report = run_program("rigid_tap");
    assert!(report.completed);
    assert_eq!(report.final_position, Pose::xyz(5.0, 5.0, 10.0));
    assert_eq!(report.segments_queued, 3);
    assert_eq!(report.spindle_reversals, 2);
    assert!(report.waiting_cycles > 0);
}

#[test]
fn threading_program_stops_spindle_before_traverse() {
    let report = run_program("threading");
    assert!(report.completed);
    assert_eq!(report.final_position, Pose::xyz(5.0, 0.0, 0.0));
    assert_eq!(report.segments_queued, 2);
    assert_eq!(report.spindle_reversals, 0);
    assert_eq!(report.aborts, 0);
}
