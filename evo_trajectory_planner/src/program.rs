//! Motion programs for the stand-alone runner.
//!
//! A program is a TOML list of steps fed into the planner in order. Motion
//! steps retry while the queue is full; machine steps (spindle, dwell) wait
//! for queued motion to finish first, the way an interpreter synchronizes
//! on M-codes.
//!
//! ```toml
//! name = "square"
//!
//! [[step]]
//! op = "term_cond"
//! cond = "blend"
//! tolerance = 0.05
//!
//! [[step]]
//! op = "line"
//! end = { x = 10.0 }
//! vel = 20.0
//! acc = 200.0
//! ```

use evo_common::trajectory::command::{ArcRequest, LineRequest, RigidTapRequest};
use evo_common::trajectory::error::TpError;
use evo_common::trajectory::state::TermCond;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::planner::PlannerContext;
use crate::sim::SimulatedMachine;

/// One program instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ProgramStep {
    Line(LineRequest),
    Arc(ArcRequest),
    RigidTap(RigidTapRequest),
    SpindleSync {
        uu_per_rev: f64,
        #[serde(default)]
        velocity_mode: bool,
    },
    TermCond {
        cond: TermCond,
        #[serde(default)]
        tolerance: f64,
    },
    Dout {
        index: usize,
        on: bool,
    },
    Aout {
        index: usize,
        value: f64,
    },
    /// Set spindle speed [rev/s] once queued motion has finished.
    Spindle {
        rps: f64,
    },
    /// Machine feed override.
    FeedScale {
        scale: f64,
    },
    /// Hold for a number of cycles once queued motion has finished.
    Dwell {
        cycles: u64,
    },
    /// Abort whatever is queued.
    Abort,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "step")]
    pub steps: Vec<ProgramStep>,
}

/// Progress of a [`ProgramFeeder`] after one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// Waiting on queue space, motion completion or a dwell.
    Blocked,
    /// Every step has been handed over.
    Finished,
}

/// Program step that the planner rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("program step {step}: {error}")]
pub struct StepError {
    pub step: usize,
    pub error: TpError,
}

/// Hands program steps to the planner as fast as it accepts them.
#[derive(Debug, Clone)]
pub struct ProgramFeeder {
    program: Program,
    next: usize,
    dwell_left: Option<u64>,
    queued: u64,
}

impl ProgramFeeder {
    pub fn new(program: Program) -> Self {
        info!(name = %program.name, steps = program.steps.len(), "program loaded");
        Self {
            program,
            next: 0,
            dwell_left: None,
            queued: 0,
        }
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.next >= self.program.steps.len()
    }

    /// Segments accepted by the planner so far.
    #[inline]
    pub fn segments_queued(&self) -> u64 {
        self.queued
    }

    /// Feed as many steps as the planner accepts right now.
    ///
    /// Call once per cycle, before `run_cycle`.
    pub fn feed(
        &mut self,
        planner: &mut PlannerContext,
        machine: &mut SimulatedMachine,
    ) -> Result<FeedStatus, StepError> {
        while let Some(step) = self.program.steps.get(self.next) {
            let index = self.next;
            let fail = |error: TpError| StepError { step: index, error };

            let motion = match step {
                ProgramStep::Line(req) => Some(planner.add_line(req)),
                ProgramStep::Arc(req) => Some(planner.add_circle(req)),
                ProgramStep::RigidTap(req) => Some(planner.add_rigid_tap(req)),
                _ => None,
            };
            if let Some(result) = motion {
                match result {
                    Ok(_) => self.queued += 1,
                    Err(e) if e.is_transient() => return Ok(FeedStatus::Blocked),
                    Err(e) => return Err(fail(e)),
                }
                self.next += 1;
                continue;
            }

            match *step {
                ProgramStep::SpindleSync {
                    uu_per_rev,
                    velocity_mode,
                } => planner
                    .set_spindle_sync(uu_per_rev, velocity_mode)
                    .map_err(fail)?,
                ProgramStep::TermCond { cond, tolerance } => {
                    planner.set_term_cond(cond, tolerance).map_err(fail)?
                }
                ProgramStep::Dout { index: out, on } => planner.set_dout(out, on).map_err(fail)?,
                ProgramStep::Aout { index: out, value } => {
                    planner.set_aout(out, value).map_err(fail)?
                }
                ProgramStep::Spindle { rps } => {
                    if !planner.is_done() {
                        return Ok(FeedStatus::Blocked);
                    }
                    debug!(rps, "spindle");
                    if rps == 0.0 {
                        machine.spindle_off();
                    } else {
                        machine.spindle_on(rps);
                    }
                }
                ProgramStep::FeedScale { scale } => machine.set_feed_scale(scale),
                ProgramStep::Dwell { cycles } => {
                    if !planner.is_done() {
                        return Ok(FeedStatus::Blocked);
                    }
                    let left = self.dwell_left.get_or_insert(cycles);
                    if *left > 0 {
                        *left -= 1;
                        return Ok(FeedStatus::Blocked);
                    }
                    self.dwell_left = None;
                }
                ProgramStep::Abort => planner.abort(),
                ProgramStep::Line(_) | ProgramStep::Arc(_) | ProgramStep::RigidTap(_) => {}
            }
            self.next += 1;
        }
        Ok(FeedStatus::Finished)
    }
}
