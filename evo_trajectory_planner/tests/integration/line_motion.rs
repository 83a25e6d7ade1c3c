//! Single-segment motion: trapezoidal profile, exact end points, arcs and
//! velocity limits.

use evo_common::trajectory::command::{ArcRequest, LineRequest};
use evo_common::trajectory::pose::{Cartesian, Pose};
use evo_common::trajectory::state::TermCond;
use evo_trajectory_planner::PlannerContext;
use evo_trajectory_planner::io::{CycleInputs, CyclePhase, NullIo};

use super::{T, run_until_done};

// ── Helpers ──

fn planner() -> PlannerContext {
    let mut tp = PlannerContext::new(16).unwrap();
    tp.set_term_cond(TermCond::Stop, 0.0).unwrap();
    tp
}

fn peak(out: &[evo_trajectory_planner::io::CycleOutput]) -> f64 {
    out.iter().map(|o| o.current_vel).fold(0.0, f64::max)
}

// ── Tests ──

#[test]
fn line_follows_trapezoid_and_lands_exactly() {
    let mut tp = planner();
    tp.add_line(&LineRequest::feed(Pose::xyz(10.0, 0.0, 0.0), 5.0, 50.0))
        .unwrap();

    let out = run_until_done(&mut tp, &mut NullIo::default(), 5000);
    let moving: Vec<_> = out
        .iter()
        .filter(|o| o.phase == CyclePhase::Moving)
        .collect();

    // 0.1 s ramp up, 1.9 s cruise, 0.1 s ramp down.
    assert!(
        (2095..=2105).contains(&moving.len()),
        "moved for {} cycles",
        moving.len()
    );
    assert!(moving.iter().all(|o| o.exec_id == 1));

    let mut prev_vel = 0.0;
    let mut prev_dtg = f64::INFINITY;
    for o in &moving {
        assert!((o.current_vel - prev_vel).abs() <= 50.0 * T + 1e-9);
        assert!(o.current_vel <= 5.0 + 1e-12);
        assert!(o.distance_to_go <= prev_dtg);
        prev_vel = o.current_vel;
        prev_dtg = o.distance_to_go;
    }
    assert!(peak(&out) >= 5.0 - 1e-9);

    let last = out.last().unwrap();
    assert_eq!(last.phase, CyclePhase::Idle);
    assert_eq!(last.position, Pose::xyz(10.0, 0.0, 0.0));
    assert_eq!(tp.position(), tp.goal());
}

#[test]
fn arc_keeps_radius_and_reaches_end() {
    let mut tp = planner();
    tp.set_pos(Pose::xyz(10.0, 0.0, 0.0)).unwrap();
    tp.add_circle(&ArcRequest::new(
        Pose::xyz(0.0, 10.0, 0.0),
        Cartesian::ZERO,
        Cartesian::new(0.0, 0.0, 1.0),
        20.0,
        200.0,
    ))
    .unwrap();
    assert!((tp.peek(0).unwrap().target() - 5.0 * std::f64::consts::PI).abs() < 1e-9);

    let out = run_until_done(&mut tp, &mut NullIo::default(), 5000);
    for o in &out {
        let r = o.position.xyz.mag();
        assert!((r - 10.0).abs() < 1e-6, "radius {r}");
        assert!(o.position.xyz.z.abs() < 1e-12);
    }
    // Counter-clockwise about +Z passes through the first quadrant.
    assert!(out.iter().any(|o| o.position.xyz.x > 5.0 && o.position.xyz.y > 5.0));
    assert!(tp.position().is_near(&Pose::xyz(0.0, 10.0, 0.0), 1e-9));
    assert!(peak(&out) <= 20.0 + 1e-9);
}

#[test]
fn velocity_limit_caps_tool_tip_speed() {
    let mut tp = planner();
    tp.set_vlimit(3.0).unwrap();
    tp.add_line(&LineRequest::feed(Pose::xyz(5.0, 0.0, 0.0), 10.0, 100.0))
        .unwrap();
    let out = run_until_done(&mut tp, &mut NullIo::default(), 10_000);
    assert!((peak(&out) - 3.0).abs() < 1e-9);
}

#[test]
fn rotary_only_move_ignores_velocity_limit() {
    let mut tp = planner();
    tp.set_vlimit(3.0).unwrap();
    let mut end = Pose::ZERO;
    end.abc.x = 90.0;
    tp.add_line(&LineRequest::feed(end, 30.0, 300.0)).unwrap();
    let out = run_until_done(&mut tp, &mut NullIo::default(), 10_000);
    assert!((peak(&out) - 30.0).abs() < 1e-9);
    assert_eq!(tp.position().abc.x, 90.0);
}

#[test]
fn feed_scale_slows_motion() {
    let mut tp = planner();
    tp.add_line(&LineRequest::feed(Pose::xyz(2.0, 0.0, 0.0), 4.0, 100.0))
        .unwrap();
    let inputs = CycleInputs {
        net_feed_scale: 0.5,
        ..Default::default()
    };
    let mut io = NullIo::default();
    let mut top = 0.0_f64;
    for _ in 0..5000 {
        let o = tp.run_cycle(&inputs, &mut io);
        top = top.max(o.current_vel);
        if o.done {
            break;
        }
    }
    assert!(tp.is_done());
    assert!((top - 2.0).abs() < 1e-9);
}

#[test]
fn queue_full_rejects_without_side_effects() {
    let mut tp = PlannerContext::new(2).unwrap();
    for x in [1.0, 2.0] {
        tp.add_line(&LineRequest::feed(Pose::xyz(x, 0.0, 0.0), 1.0, 10.0))
            .unwrap();
    }
    let next_id = tp.next_id();
    let goal = tp.goal();
    let err = tp
        .add_line(&LineRequest::feed(Pose::xyz(3.0, 0.0, 0.0), 1.0, 10.0))
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(tp.next_id(), next_id);
    assert_eq!(tp.goal(), goal);
    assert_eq!(tp.queue_depth(), 2);
}
