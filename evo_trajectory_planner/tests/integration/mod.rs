mod blending;
mod config_load;
mod dio_sync;
mod line_motion;
mod rigid_tap;
mod rotary_index;
mod spindle_sync;

use evo_trajectory_planner::PlannerContext;
use evo_trajectory_planner::io::{CycleInputs, CycleOutput, MachineIo};
use evo_trajectory_planner::sim::SimulatedMachine;

/// Cycle period used by every scenario [s].
pub(crate) const T: f64 = 0.001;

/// Run cycles against `io` with fixed inputs until the planner reports
/// done. Returns every output, the final idle one included.
pub(crate) fn run_until_done(
    tp: &mut PlannerContext,
    io: &mut impl MachineIo,
    limit: usize,
) -> Vec<CycleOutput> {
    let inputs = CycleInputs::default();
    let mut out = Vec::new();
    for _ in 0..limit {
        let o = tp.run_cycle(&inputs, io);
        out.push(o);
        if o.done {
            return out;
        }
    }
    panic!("planner not done after {limit} cycles");
}

/// Same as [`run_until_done`] but with the simulated machine advancing one
/// period after every cycle.
pub(crate) fn run_machine_until_done(
    tp: &mut PlannerContext,
    machine: &mut SimulatedMachine,
    limit: usize,
) -> Vec<CycleOutput> {
    let mut out = Vec::new();
    for _ in 0..limit {
        let inputs = machine.inputs();
        let o = tp.run_cycle(&inputs, machine);
        machine.step(T);
        out.push(o);
        if o.done {
            return out;
        }
    }
    panic!("planner not done after {limit} cycles");
}
