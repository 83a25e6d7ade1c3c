//! Rotary indexing: unlock before the move, lock again before retiring.

use evo_common::trajectory::command::LineRequest;
use evo_common::trajectory::config::SimulationConfig;
use evo_common::trajectory::pose::{Cartesian, Pose};
use evo_common::trajectory::state::TermCond;
use evo_trajectory_planner::PlannerContext;
use evo_trajectory_planner::io::{CycleOutput, CyclePhase, MachineIo, WaitReason};
use evo_trajectory_planner::sim::SimulatedMachine;

use super::T;

const UNLOCK_CYCLES: u32 = 5;

fn indexer_machine() -> SimulatedMachine {
    SimulatedMachine::new(&SimulationConfig {
        rotary_unlock_cycles: UNLOCK_CYCLES,
        ..Default::default()
    })
}

fn index_a(end_xyz: Cartesian, a: f64) -> LineRequest {
    LineRequest {
        index_rotary: Some(0),
        ..LineRequest::feed(
            Pose::new(end_xyz, Cartesian::new(a, 0.0, 0.0), Cartesian::ZERO),
            20.0,
            200.0,
        )
    }
}

/// One cycle's output plus whether axis A was unlocked when it ran.
struct Sample {
    out: CycleOutput,
    unlocked: bool,
}

fn run(tp: &mut PlannerContext, m: &mut SimulatedMachine) -> Vec<Sample> {
    let mut samples = Vec::new();
    for _ in 0..20_000 {
        let unlocked = m.rotary_is_unlocked(0);
        let inputs = m.inputs();
        let out = tp.run_cycle(&inputs, m);
        m.step(T);
        samples.push(Sample { out, unlocked });
        if out.done {
            return samples;
        }
    }
    panic!("planner not done");
}

/// A never changes in a cycle that started with the indexer locked.
fn assert_a_moves_only_unlocked(samples: &[Sample], start_a: f64) {
    let mut prev_a = start_a;
    for (i, s) in samples.iter().enumerate() {
        let a = s.out.position.abc.x;
        if a != prev_a {
            assert!(s.unlocked, "A moved while locked at cycle {i}");
        }
        prev_a = a;
    }
}

fn waits(samples: &[Sample], reason: WaitReason) -> Vec<usize> {
    samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.out.phase == CyclePhase::Waiting(reason))
        .map(|(i, _)| i)
        .collect()
}

#[test]
fn indexed_move_waits_for_unlock_and_lock() {
    let mut tp = PlannerContext::new(4).unwrap();
    let mut m = indexer_machine();
    tp.add_line(&index_a(Cartesian::ZERO, 90.0)).unwrap();

    let samples = run(&mut tp, &mut m);

    let unlock = waits(&samples, WaitReason::RotaryUnlock);
    assert_eq!(unlock, (0..UNLOCK_CYCLES as usize).collect::<Vec<_>>());
    for &i in &unlock {
        assert_eq!(samples[i].out.position, Pose::ZERO);
        assert_eq!(samples[i].out.exec_id, 1);
    }
    assert!(samples[UNLOCK_CYCLES as usize].unlocked);
    assert_eq!(samples[UNLOCK_CYCLES as usize].out.phase, CyclePhase::Moving);

    let lock = waits(&samples, WaitReason::RotaryLock);
    assert_eq!(lock.len(), UNLOCK_CYCLES as usize);
    let first_lock = lock[0];
    // Consecutive, after all motion, with the segment still queued.
    assert_eq!(*lock.last().unwrap(), first_lock + lock.len() - 1);
    for &i in &lock {
        assert_eq!(samples[i].out.queue_depth, 1);
        assert_eq!(samples[i].out.position.abc.x, 90.0);
    }
    assert!(
        samples[..first_lock]
            .iter()
            .all(|s| s.out.phase != CyclePhase::Waiting(WaitReason::RotaryLock))
    );

    // Retired only once the indexer reports locked.
    let last = samples.last().unwrap();
    assert_eq!(samples.len(), first_lock + lock.len() + 1);
    assert!(last.out.done);
    assert!(!last.unlocked);
    assert!(!m.rotary_is_unlocked(0));
    assert_eq!(tp.queue_depth(), 0);

    assert_a_moves_only_unlocked(&samples, 0.0);
    assert_eq!(tp.position().abc.x, 90.0);
}

#[test]
fn blend_into_indexed_move_stops_and_unlocks_first() {
    let mut tp = PlannerContext::new(4).unwrap();
    tp.set_term_cond(TermCond::Blend, 0.0).unwrap();
    let mut m = indexer_machine();
    tp.add_line(&LineRequest::feed(Pose::xyz(10.0, 0.0, 0.0), 20.0, 200.0))
        .unwrap();
    tp.add_line(&index_a(Cartesian::new(10.0, 0.0, 0.0), 90.0))
        .unwrap();

    let samples = run(&mut tp, &mut m);

    assert!(samples.iter().all(|s| s.out.phase != CyclePhase::Blending));

    let unlock = waits(&samples, WaitReason::RotaryUnlock);
    assert_eq!(unlock.len(), UNLOCK_CYCLES as usize);
    let first = unlock[0];
    // The feed move came to rest at X10 before the unlock request.
    assert_eq!(samples[first].out.position, Pose::xyz(10.0, 0.0, 0.0));
    assert_eq!(samples[first].out.exec_id, 2);
    assert!(samples[first - 1].out.current_vel <= 200.0 * T + 1e-9);
    assert!(samples[..first].iter().all(|s| s.out.position.abc.x == 0.0));

    assert_eq!(waits(&samples, WaitReason::RotaryLock).len(), UNLOCK_CYCLES as usize);
    assert_a_moves_only_unlocked(&samples, 0.0);
    assert_eq!(
        tp.position(),
        Pose::new(
            Cartesian::new(10.0, 0.0, 0.0),
            Cartesian::new(90.0, 0.0, 0.0),
            Cartesian::ZERO
        )
    );
    assert!(!m.rotary_is_unlocked(0));
}

#[test]
fn indexed_move_does_not_blend_into_its_successor() {
    let mut tp = PlannerContext::new(4).unwrap();
    tp.set_term_cond(TermCond::Blend, 0.0).unwrap();
    let mut m = indexer_machine();
    tp.add_line(&index_a(Cartesian::ZERO, 45.0)).unwrap();
    tp.add_line(&LineRequest::feed(
        Pose::new(Cartesian::new(5.0, 0.0, 0.0), Cartesian::new(45.0, 0.0, 0.0), Cartesian::ZERO),
        20.0,
        200.0,
    ))
    .unwrap();

    let samples = run(&mut tp, &mut m);

    assert!(samples.iter().all(|s| s.out.phase != CyclePhase::Blending));
    // X only starts once A is locked again.
    let lock = waits(&samples, WaitReason::RotaryLock);
    assert_eq!(lock.len(), UNLOCK_CYCLES as usize);
    let last_lock = *lock.last().unwrap();
    assert!(samples[..=last_lock].iter().all(|s| s.out.position.xyz.x == 0.0));
    assert!(!samples[last_lock + 1].unlocked);
    assert_a_moves_only_unlocked(&samples, 0.0);
    assert_eq!(tp.position().xyz.x, 5.0);
}
