//! Deterministic planner cycle: feed → plan → simulate.
//!
//! Drives a [`PlannerContext`] against a [`SimulatedMachine`] one fixed
//! period at a time, feeding a [`Program`] as queue space frees up.
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`: lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity`: pin to an isolated CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, prio)`.
//!
//! ## Cycle Loop
//! With the `rt` feature: absolute-time sleep on `CLOCK_MONOTONIC`, and an
//! overrun is fatal. Without it: cycles run back to back (or paced with
//! `std::thread::sleep` when `realtime` is set) and overruns are counted.

use std::sync::atomic::{AtomicBool, Ordering};

use evo_common::trajectory::config::TrajectoryConfig;
use evo_common::trajectory::error::TpError;
use evo_common::trajectory::pose::Pose;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::io::{CycleOutput, CyclePhase};
use crate::planner::PlannerContext;
use crate::program::{Program, ProgramFeeder, StepError};
use crate::sim::{OutputSnapshot, SimulatedMachine};

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    pub min_cycle_ns: i64,
    pub max_cycle_ns: i64,
    pub sum_cycle_ns: i64,
    /// Running sum of squares for stddev computation.
    pub sum_sq_cycle_ns: i128,
    /// Cycles that took longer than the period.
    pub overruns: u64,
    /// Maximum wake-up latency [ns].
    pub max_latency_ns: i64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            sum_sq_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns += duration_ns;
        self.sum_sq_cycle_ns += (duration_ns as i128) * (duration_ns as i128);
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }

    /// Standard deviation of the cycle time [ns].
    pub fn stddev_cycle_ns(&self) -> f64 {
        if self.cycle_count < 2 {
            return 0.0;
        }
        let n = self.cycle_count as f64;
        let mean = self.sum_cycle_ns as f64 / n;
        let var = self.sum_sq_cycle_ns as f64 / n - mean * mean;
        var.max(0.0).sqrt()
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors during RT setup or cycle execution.
#[derive(Debug, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),
    /// Planner could not be built from the configuration.
    #[error("planner error: {0}")]
    Planner(#[from] TpError),
    /// The planner rejected a program step.
    #[error(transparent)]
    Program(#[from] StepError),
    /// Cycle overran its period (`rt` feature only).
    #[error("cycle overrun: {actual_ns}ns > {budget_ns}ns budget")]
    CycleOverrun {
        /// Actual cycle duration [ns].
        actual_ns: i64,
        /// Configured cycle budget [ns].
        budget_ns: i64,
    },
}

// ─── RT Setup ───────────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch 1 MB of stack so the RT loop never faults it in.
fn prefault_stack() {
    let mut buf = [0u8; 1024 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Perform the full RT setup sequence.
///
/// Must be called before entering the cycle loop. Without the `rt` feature
/// every system call is a no-op.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Run Report ─────────────────────────────────────────────────────

/// Cycle timing summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimingSummary {
    pub avg_ns: i64,
    pub min_ns: i64,
    pub max_ns: i64,
    pub stddev_ns: f64,
    pub overruns: u64,
    pub max_latency_ns: i64,
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub program: String,
    /// Every program step was accepted and the queue drained.
    pub completed: bool,
    pub cycles: u64,
    /// Machine time covered by the run [s].
    pub machine_time_s: f64,
    pub final_position: Pose,
    pub segments_queued: u64,
    pub last_exec_id: u32,
    pub peak_velocity: f64,
    pub moving_cycles: u64,
    pub blending_cycles: u64,
    pub waiting_cycles: u64,
    pub aborts: u64,
    pub spindle_reversals: u64,
    pub outputs: OutputSnapshot,
    pub timing: TimingSummary,
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Owns the planner, the machine model and the program being fed.
pub struct CycleRunner {
    pub planner: PlannerContext,
    pub machine: SimulatedMachine,
    feeder: ProgramFeeder,
    program_name: String,
    pub stats: CycleStats,
    cycle_time_ns: i64,
    cycle_time_s: f64,
    max_cycles: u64,
    /// Pace the simulation loop to wall-clock time.
    realtime: bool,
    peak_velocity: f64,
    last_exec_id: u32,
    moving_cycles: u64,
    blending_cycles: u64,
    waiting_cycles: u64,
    aborts: u64,
}

impl CycleRunner {
    /// Build the planner and machine from a validated configuration.
    pub fn new(config: &TrajectoryConfig, program: Program) -> Result<Self, CycleError> {
        let mut planner = PlannerContext::from_config(&config.planner)?;
        planner.set_pos(config.simulation.initial_position)?;
        let machine = SimulatedMachine::new(&config.simulation);
        let program_name = program.name.clone();

        Ok(Self {
            planner,
            machine,
            feeder: ProgramFeeder::new(program),
            program_name,
            stats: CycleStats::new(),
            cycle_time_ns: i64::from(config.planner.cycle_time_us) * 1000,
            cycle_time_s: config.planner.cycle_time_s(),
            max_cycles: config.simulation.max_cycles,
            realtime: false,
            peak_velocity: 0.0,
            last_exec_id: 0,
            moving_cycles: 0,
            blending_cycles: 0,
            waiting_cycles: 0,
            aborts: 0,
        })
    }

    /// Sleep out the remainder of every period in the simulation loop.
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: u64) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Program fully handed over and the planner idle.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.feeder.is_finished() && self.planner.is_done()
    }

    /// Run cycles until the program completes, `running` is cleared or the
    /// cycle limit is hit.
    ///
    /// # Errors
    /// A rejected program step ends the run. With the `rt` feature a cycle
    /// overrun does too.
    pub fn run(&mut self, running: &AtomicBool) -> Result<RunReport, CycleError> {
        info!(
            program = %self.program_name,
            cycle_time_ns = self.cycle_time_ns,
            max_cycles = self.max_cycles,
            "cycle loop starting"
        );

        #[cfg(feature = "rt")]
        let completed = self.run_rt_loop(running)?;

        #[cfg(not(feature = "rt"))]
        let completed = self.run_sim_loop(running)?;

        if !completed {
            warn!(
                cycles = self.stats.cycle_count,
                queued = self.planner.queue_depth(),
                "run stopped before the program completed"
            );
        }
        let report = self.report(completed);
        info!(
            cycles = report.cycles,
            segments = report.segments_queued,
            machine_time_s = report.machine_time_s,
            "cycle loop finished"
        );
        Ok(report)
    }

    /// RT cycle loop using `clock_nanosleep(TIMER_ABSTIME)`.
    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self, running: &AtomicBool) -> Result<bool, CycleError> {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let mut next_wake = clock_gettime(clock)
            .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;

        while running.load(Ordering::Relaxed) && self.stats.cycle_count < self.max_cycles {
            next_wake = timespec_add_ns(next_wake, self.cycle_time_ns);

            let cycle_start = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
            let wake_latency_ns = timespec_diff_ns(&cycle_start, &next_wake).abs();

            self.cycle_once()?;

            let cycle_end = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
            let duration_ns = timespec_diff_ns(&cycle_end, &cycle_start);
            self.stats.record(duration_ns, wake_latency_ns);

            if duration_ns > self.cycle_time_ns {
                self.stats.overruns += 1;
                return Err(CycleError::CycleOverrun {
                    actual_ns: duration_ns,
                    budget_ns: self.cycle_time_ns,
                });
            }
            if self.is_finished() {
                return Ok(true);
            }

            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
        }
        Ok(false)
    }

    /// Simulation loop: back to back, or paced with `std::thread::sleep`.
    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self, running: &AtomicBool) -> Result<bool, CycleError> {
        use std::time::{Duration, Instant};

        let period = Duration::from_nanos(self.cycle_time_ns as u64);

        while running.load(Ordering::Relaxed) && self.stats.cycle_count < self.max_cycles {
            let cycle_start = Instant::now();

            self.cycle_once()?;

            let elapsed = cycle_start.elapsed();
            let duration_ns = elapsed.as_nanos() as i64;
            self.stats.record(duration_ns, 0);
            if duration_ns > self.cycle_time_ns {
                self.stats.overruns += 1;
            }
            if self.is_finished() {
                return Ok(true);
            }

            if self.realtime {
                if let Some(remaining) = period.checked_sub(elapsed) {
                    std::thread::sleep(remaining);
                }
            }
        }
        Ok(false)
    }

    /// One cycle body: feed the program, run the planner, advance the
    /// machine by one period.
    ///
    /// Does not touch [`CycleStats`]; the loops time around it.
    pub fn cycle_once(&mut self) -> Result<CycleOutput, CycleError> {
        self.feeder.feed(&mut self.planner, &mut self.machine)?;

        let inputs = self.machine.inputs();
        let out = self.planner.run_cycle(&inputs, &mut self.machine);
        self.machine.step(self.cycle_time_s);

        self.track(&out);
        Ok(out)
    }

    fn track(&mut self, out: &CycleOutput) {
        self.peak_velocity = self.peak_velocity.max(out.current_vel);
        if out.exec_id != 0 && out.exec_id != self.last_exec_id {
            debug!(id = out.exec_id, motion = ?out.motion_type, "segment executing");
            self.last_exec_id = out.exec_id;
        }
        match out.phase {
            CyclePhase::Moving => self.moving_cycles += 1,
            CyclePhase::Blending => self.blending_cycles += 1,
            CyclePhase::Waiting(_) => self.waiting_cycles += 1,
            CyclePhase::Aborted => self.aborts += 1,
            CyclePhase::Idle => {}
        }
    }

    /// Summary of the run so far.
    pub fn report(&self, completed: bool) -> RunReport {
        let min_ns = if self.stats.cycle_count == 0 {
            0
        } else {
            self.stats.min_cycle_ns
        };
        RunReport {
            program: self.program_name.clone(),
            completed,
            cycles: self.stats.cycle_count,
            machine_time_s: self.stats.cycle_count as f64 * self.cycle_time_s,
            final_position: self.planner.position(),
            segments_queued: self.feeder.segments_queued(),
            last_exec_id: self.last_exec_id,
            peak_velocity: self.peak_velocity,
            moving_cycles: self.moving_cycles,
            blending_cycles: self.blending_cycles,
            waiting_cycles: self.waiting_cycles,
            aborts: self.aborts,
            spindle_reversals: self.machine.spindle_reversals(),
            outputs: self.machine.outputs(),
            timing: TimingSummary {
                avg_ns: self.stats.avg_cycle_ns(),
                min_ns,
                max_ns: self.stats.max_cycle_ns,
                stddev_ns: self.stats.stddev_cycle_ns(),
                overruns: self.stats.overruns,
                max_latency_ns: self.stats.max_latency_ns,
            },
        }
    }
}

// ─── Time Helpers ───────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    while nanos < 0 {
        secs -= 1;
        nanos += 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

/// Difference (a - b) in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}

// ─── Tests ──────────────────────────────────────────────────────────
