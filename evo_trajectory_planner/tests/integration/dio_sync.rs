//! Outputs synchronized with segment start.

use evo_common::trajectory::command::LineRequest;
use evo_common::trajectory::pose::Pose;
use evo_common::trajectory::state::TermCond;
use evo_trajectory_planner::PlannerContext;
use evo_trajectory_planner::io::CyclePhase;
use evo_trajectory_planner::sim::SimulatedMachine;

use super::T;

fn two_moves(cond: TermCond) -> PlannerContext {
    let mut tp = PlannerContext::new(8).unwrap();
    tp.set_term_cond(cond, 0.0).unwrap();
    tp.set_dout(3, true).unwrap();
    tp.add_line(&LineRequest::feed(Pose::xyz(1.0, 0.0, 0.0), 10.0, 100.0))
        .unwrap();
    tp.set_aout(1, 2.5).unwrap();
    tp.set_dout(4, true).unwrap();
    tp.add_line(&LineRequest::feed(Pose::xyz(2.0, 0.0, 0.0), 10.0, 100.0))
        .unwrap();
    tp
}

#[test]
fn outputs_fire_once_when_their_segment_starts() {
    let mut tp = two_moves(TermCond::Stop);
    let mut m = SimulatedMachine::default();
    assert!(!m.dout(3));

    let mut saw_second = false;
    for cycle in 0..10_000 {
        let inputs = m.inputs();
        let o = tp.run_cycle(&inputs, &mut m);
        m.step(T);

        if cycle == 0 {
            assert_eq!(o.exec_id, 1);
            assert!(m.dout(3));
            assert_eq!(m.outputs().dout_writes, 1);
        }
        match o.exec_id {
            1 => {
                assert_eq!(m.aout(1), 0.0);
                assert!(!m.dout(4));
            }
            2 => {
                saw_second = true;
                assert_eq!(m.aout(1), 2.5);
                assert!(m.dout(4));
            }
            _ => {}
        }
        if o.done {
            break;
        }
    }
    assert!(saw_second);
    assert!(tp.is_done());

    let out = m.outputs();
    assert_eq!(out.dout_mask, (1 << 3) | (1 << 4));
    assert_eq!(out.dout_writes, 2);
    assert_eq!(out.aout_writes, 1);
}

#[test]
fn blended_successor_fires_its_outputs_once() {
    let mut tp = two_moves(TermCond::Blend);
    let mut m = SimulatedMachine::default();
    let mut blended = false;
    for _ in 0..10_000 {
        let inputs = m.inputs();
        let o = tp.run_cycle(&inputs, &mut m);
        m.step(T);
        blended |= o.phase == CyclePhase::Blending;
        if o.done {
            break;
        }
    }
    assert!(blended);
    assert_eq!(tp.position(), Pose::xyz(2.0, 0.0, 0.0));
    let out = m.outputs();
    assert_eq!(out.dout_writes, 2);
    assert_eq!(out.aout_writes, 1);
    assert_eq!(m.aout(1), 2.5);
}

#[test]
fn outputs_without_motion_wait_for_next_segment() {
    let mut tp = PlannerContext::new(4).unwrap();
    let mut m = SimulatedMachine::default();
    tp.set_dout(7, true).unwrap();
    for _ in 0..10 {
        let inputs = m.inputs();
        tp.run_cycle(&inputs, &mut m);
    }
    assert!(!m.dout(7));
    assert!(!tp.pending_io().is_empty());

    tp.add_line(&LineRequest::feed(Pose::xyz(0.5, 0.0, 0.0), 5.0, 100.0))
        .unwrap();
    assert!(tp.pending_io().is_empty());
    let inputs = m.inputs();
    tp.run_cycle(&inputs, &mut m);
    assert!(m.dout(7));
}
