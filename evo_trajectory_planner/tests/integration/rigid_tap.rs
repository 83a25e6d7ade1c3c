//! Rigid tapping against the simulated spindle.

use evo_common::trajectory::command::{LineRequest, RigidTapRequest};
use evo_common::trajectory::config::SimulationConfig;
use evo_common::trajectory::error::TpError;
use evo_common::trajectory::pose::Pose;
use evo_common::trajectory::state::{RigidTapState, TermCond};
use evo_trajectory_planner::PlannerContext;
use evo_trajectory_planner::sim::SimulatedMachine;

use super::{T, run_machine_until_done};

// ── Helpers ──

struct TapRun {
    states: Vec<RigidTapState>,
    min_z: f64,
    max_z: f64,
    synced_while_tapping: bool,
}

fn tap(tp: &mut PlannerContext, m: &mut SimulatedMachine) -> TapRun {
    let mut run = TapRun {
        states: Vec::new(),
        min_z: f64::INFINITY,
        max_z: f64::NEG_INFINITY,
        synced_while_tapping: true,
    };
    for _ in 0..20_000 {
        let inputs = m.inputs();
        let o = tp.run_cycle(&inputs, m);
        m.step(T);
        run.min_z = run.min_z.min(o.position.xyz.z);
        run.max_z = run.max_z.max(o.position.xyz.z);
        if let Some(state) = tp.peek(0).and_then(|s| s.rigid_tap_state()) {
            if run.states.last() != Some(&state) {
                run.states.push(state);
            }
            if state == RigidTapState::Tapping && o.current_vel > 0.0 && !o.spindle_synced {
                run.synced_while_tapping = false;
            }
        }
        if o.done {
            return run;
        }
    }
    panic!("rigid tap did not finish");
}

fn spindle(accel: f64, rps: f64) -> SimulatedMachine {
    let mut m = SimulatedMachine::new(&SimulationConfig {
        spindle_accel: accel,
        ..Default::default()
    });
    m.spindle_on(rps);
    m
}

// ── Tests ──

#[test]
fn tap_visits_every_state_and_returns_to_start() {
    let mut m = spindle(200.0, 10.0);
    let mut tp = PlannerContext::new(8).unwrap();
    tp.set_spindle_sync(1.0, false).unwrap();
    tp.add_rigid_tap(&RigidTapRequest::new(Pose::xyz(0.0, 0.0, -5.0), 10.0, 500.0))
        .unwrap();
    // The tap comes back to where it started.
    assert_eq!(tp.goal(), Pose::ZERO);

    let run = tap(&mut tp, &mut m);
    assert_eq!(
        run.states,
        vec![
            RigidTapState::Tapping,
            RigidTapState::Reversing,
            RigidTapState::Retraction,
            RigidTapState::FinalReversal,
            RigidTapState::FinalPlacement,
        ]
    );
    assert!(run.synced_while_tapping);

    // Overshoot below the hole while the spindle reverses, and above the
    // start point on the way out.
    assert!(run.min_z < -5.0 && run.min_z > -5.6, "min z {}", run.min_z);
    assert!(run.max_z > 0.0 && run.max_z < 0.5, "max z {}", run.max_z);
    assert!(tp.position().is_near(&Pose::ZERO, 1e-9));

    assert_eq!(m.spindle_reversals(), 2);
    assert_eq!(m.spindle_command(), 10.0);
    assert!(!tp.spindle_locked());
}

#[test]
fn deeper_tap_scales_with_depth() {
    let mut m = spindle(200.0, 10.0);
    let mut tp = PlannerContext::new(8).unwrap();
    tp.set_spindle_sync(1.0, false).unwrap();
    tp.add_rigid_tap(&RigidTapRequest::new(Pose::xyz(0.0, 0.0, -8.0), 10.0, 500.0))
        .unwrap();
    let run = tap(&mut tp, &mut m);
    assert_eq!(run.states.len(), 5);
    assert!(run.min_z < -8.0 && run.min_z > -8.6);
    assert!(tp.position().is_near(&Pose::ZERO, 1e-9));
}

#[test]
fn motion_after_tap_continues_from_start_point() {
    let mut m = spindle(200.0, 10.0);
    let mut tp = PlannerContext::new(8).unwrap();
    tp.set_term_cond(TermCond::Stop, 0.0).unwrap();
    tp.set_pos(Pose::xyz(5.0, 5.0, 2.0)).unwrap();
    tp.set_spindle_sync(1.25, false).unwrap();
    tp.add_rigid_tap(&RigidTapRequest::new(Pose::xyz(5.0, 5.0, -2.0), 10.0, 500.0))
        .unwrap();
    tp.set_spindle_sync(0.0, false).unwrap();
    tp.add_line(&LineRequest::feed(Pose::xyz(5.0, 5.0, 10.0), 50.0, 500.0))
        .unwrap();

    run_machine_until_done(&mut tp, &mut m, 20_000);
    assert_eq!(tp.position(), Pose::xyz(5.0, 5.0, 10.0));
    assert_eq!(m.spindle_reversals(), 2);
}

#[test]
fn tap_requires_position_sync() {
    let req = RigidTapRequest::new(Pose::xyz(0.0, 0.0, -5.0), 10.0, 500.0);

    let mut tp = PlannerContext::new(8).unwrap();
    assert_eq!(tp.add_rigid_tap(&req), Err(TpError::SynchronizationRejected));

    tp.set_spindle_sync(1.0, true).unwrap();
    assert_eq!(tp.add_rigid_tap(&req), Err(TpError::SynchronizationRejected));

    tp.set_spindle_sync(1.0, false).unwrap();
    assert!(tp.add_rigid_tap(&req).is_ok());
    assert!(matches!(
        tp.add_rigid_tap(&RigidTapRequest::new(Pose::ZERO, 10.0, 500.0)),
        Err(TpError::InvalidArgument(_))
    ));
}
