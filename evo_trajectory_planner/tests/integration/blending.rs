//! Corner blending between consecutive segments.

use evo_common::trajectory::command::LineRequest;
use evo_common::trajectory::pose::Pose;
use evo_common::trajectory::state::TermCond;
use evo_trajectory_planner::PlannerContext;
use evo_trajectory_planner::io::{CycleInputs, CycleOutput, CyclePhase, NullIo};

use super::run_until_done;

// ── Helpers ──

const CORNER: Pose = Pose::xyz(10.0, 0.0, 0.0);
const END: Pose = Pose::xyz(10.0, 10.0, 0.0);

fn corner(cond: TermCond, tolerance: f64) -> (PlannerContext, Vec<CycleOutput>) {
    let mut tp = PlannerContext::new(8).unwrap();
    tp.set_term_cond(cond, tolerance).unwrap();
    tp.add_line(&LineRequest::feed(CORNER, 20.0, 200.0)).unwrap();
    tp.add_line(&LineRequest::feed(END, 20.0, 200.0)).unwrap();
    let out = run_until_done(&mut tp, &mut NullIo::default(), 10_000);
    (tp, out)
}

/// Largest distance by which the path cuts inside the corner.
fn corner_deviation(out: &[CycleOutput]) -> f64 {
    out.iter()
        .map(|o| {
            let p = o.position.xyz;
            (10.0 - p.x).min(p.y).max(0.0)
        })
        .fold(0.0, f64::max)
}

// ── Tests ──

#[test]
fn exact_stop_passes_through_corner() {
    let (tp, out) = corner(TermCond::Stop, 0.0);
    assert!(out.iter().all(|o| o.phase != CyclePhase::Blending));
    assert!(corner_deviation(&out) < 1e-9);
    // Both segments are (nearly) at rest at the corner.
    let at_corner = out
        .iter()
        .position(|o| o.exec_id == 2)
        .expect("second segment never ran");
    assert!(out[at_corner - 1].current_vel <= 200.0 * super::T + 1e-9);
    assert!(out[at_corner].current_vel <= 200.0 * super::T + 1e-9);
    assert_eq!(tp.position(), END);
}

#[test]
fn blend_keeps_speed_through_corner() {
    let (tp, out) = corner(TermCond::Blend, 0.0);

    let blending: Vec<_> = out
        .iter()
        .filter(|o| o.phase == CyclePhase::Blending)
        .collect();
    assert!(!blending.is_empty());
    assert!(blending.iter().all(|o| o.active_depth == 2));
    // Head slows by what the successor gains.
    for o in &blending {
        assert!(o.current_vel > 15.0, "blend velocity dropped to {}", o.current_vel);
        assert!(o.current_vel <= 20.0 + 1e-6);
    }
    assert!(corner_deviation(&out) > 0.1);
    assert_eq!(tp.position(), END);
    assert!(out.last().unwrap().done);
}

#[test]
fn tolerance_bounds_corner_deviation() {
    let (_, loose) = corner(TermCond::Blend, 0.0);
    let (tp, tight) = corner(TermCond::Blend, 0.01);
    assert!(tight.iter().any(|o| o.phase == CyclePhase::Blending));
    assert!(corner_deviation(&tight) < corner_deviation(&loose));
    assert_eq!(tp.position(), END);
}

#[test]
fn stepping_runs_segments_one_at_a_time() {
    let mut tp = PlannerContext::new(8).unwrap();
    tp.add_line(&LineRequest::feed(CORNER, 20.0, 200.0)).unwrap();
    tp.add_line(&LineRequest::feed(END, 20.0, 200.0)).unwrap();
    let inputs = CycleInputs {
        stepping: true,
        ..Default::default()
    };
    let mut io = NullIo::default();
    let mut phases = Vec::new();
    for _ in 0..10_000 {
        let o = tp.run_cycle(&inputs, &mut io);
        phases.push(o.phase);
        if o.done {
            break;
        }
    }
    assert!(tp.is_done());
    assert!(!phases.contains(&CyclePhase::Blending));
    assert_eq!(tp.position(), END);
}
