//! Spindle-synchronized motion in velocity and position mode.

use evo_common::trajectory::command::LineRequest;
use evo_common::trajectory::config::SimulationConfig;
use evo_common::trajectory::pose::Pose;
use evo_common::trajectory::state::{SyncMode, TermCond};
use evo_trajectory_planner::PlannerContext;
use evo_trajectory_planner::io::{CycleOutput, CyclePhase, WaitReason};
use evo_trajectory_planner::sim::SimulatedMachine;

use super::{T, run_machine_until_done};

// ── Helpers ──

fn machine(spindle_accel: f64) -> SimulatedMachine {
    SimulatedMachine::new(&SimulationConfig {
        spindle_accel,
        ..Default::default()
    })
}

fn planner(uu_per_rev: f64, velocity_mode: bool) -> PlannerContext {
    let mut tp = PlannerContext::new(8).unwrap();
    tp.set_term_cond(TermCond::Stop, 0.0).unwrap();
    tp.set_spindle_sync(uu_per_rev, velocity_mode).unwrap();
    tp
}

/// Outputs of the middle third of a 30 mm move.
fn mid_stroke(out: &[CycleOutput]) -> Vec<&CycleOutput> {
    out.iter()
        .filter(|o| o.phase == CyclePhase::Moving)
        .filter(|o| (10.0..=20.0).contains(&o.distance_to_go))
        .collect()
}

// ── Tests ──

#[test]
fn velocity_mode_feeds_per_revolution() {
    let mut m = machine(100.0);
    m.spindle_on(4.0);
    for _ in 0..100 {
        m.step(T);
    }

    let mut tp = planner(0.5, true);
    assert_eq!(tp.sync_mode(), SyncMode::Velocity);
    // Requested velocity is replaced by spindle speed times feed per rev.
    tp.add_line(&LineRequest::feed(Pose::xyz(20.0, 0.0, 0.0), 100.0, 200.0))
        .unwrap();

    let out = run_machine_until_done(&mut tp, &mut m, 20_000);
    let peak = out.iter().map(|o| o.current_vel).fold(0.0, f64::max);
    assert!((peak - 2.0).abs() < 1e-9, "peak {peak}");
    assert!(out.iter().all(|o| !matches!(o.phase, CyclePhase::Waiting(_))));
    assert_eq!(tp.position(), Pose::xyz(20.0, 0.0, 0.0));
}

#[test]
fn position_mode_waits_for_index_then_tracks_spindle() {
    let mut m = machine(200.0);
    m.spindle_on(8.0);

    let mut tp = planner(1.5, false);
    tp.add_line(&LineRequest::feed(Pose::xyz(0.0, 0.0, -30.0), 12.0, 500.0))
        .unwrap();

    let out = run_machine_until_done(&mut tp, &mut m, 10_000);

    let waited = |reason| {
        out.iter()
            .filter(|o| o.phase == CyclePhase::Waiting(reason))
            .count()
    };
    // Spindle reaches speed, then the encoder index zeroes it.
    assert!(waited(WaitReason::SpindleAtSpeed) > 0);
    assert!(waited(WaitReason::SpindleIndex) > 0);
    let first_move = out
        .iter()
        .position(|o| o.phase == CyclePhase::Moving)
        .unwrap();
    assert!(out[..first_move].iter().all(|o| o.position == Pose::ZERO));

    // 8 rev/s at 1.5 mm/rev.
    let mid = mid_stroke(&out);
    assert!(!mid.is_empty());
    for o in &mid {
        assert!((o.current_vel - 12.0).abs() < 0.5, "vel {}", o.current_vel);
        assert!(o.spindle_synced);
    }
    let mean = mid.iter().map(|o| o.current_vel).sum::<f64>() / mid.len() as f64;
    assert!((mean - 12.0).abs() < 0.05, "mean {mean}");

    assert_eq!(tp.position(), Pose::xyz(0.0, 0.0, -30.0));
}

#[test]
fn position_mode_ignores_pause() {
    let mut m = machine(200.0);
    m.spindle_on(8.0);
    let mut tp = planner(1.5, false);
    tp.add_line(&LineRequest::feed(Pose::xyz(0.0, 0.0, -30.0), 12.0, 500.0))
        .unwrap();

    let mut step = |tp: &mut PlannerContext| {
        let inputs = m.inputs();
        let o = tp.run_cycle(&inputs, &mut m);
        m.step(T);
        o
    };
    for _ in 0..1000 {
        step(&mut tp);
    }
    tp.pause();
    for _ in 0..300 {
        let o = step(&mut tp);
        assert!(o.current_vel > 11.0, "synced motion slowed to {}", o.current_vel);
    }
}

#[test]
fn sync_off_restores_programmed_feed() {
    let mut tp = planner(1.0, false);
    tp.set_spindle_sync(0.0, false).unwrap();
    assert_eq!(tp.sync_mode(), SyncMode::None);
    tp.add_line(&LineRequest::feed(Pose::xyz(1.0, 0.0, 0.0), 5.0, 100.0))
        .unwrap();
    assert_eq!(tp.peek(0).unwrap().sync_mode(), SyncMode::None);
}
