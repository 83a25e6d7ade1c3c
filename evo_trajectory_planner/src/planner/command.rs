//! Command API: limits, modes, motion enqueue, flow control and synced I/O.
//!
//! Every command validates its arguments before touching planner state; a
//! rejected command changes nothing.

use evo_common::consts::{MAX_ROTARY_AXES, RIGID_TAP_OVERSHOOT_REVS};
use evo_common::trajectory::command::{ArcRequest, LineRequest, RigidTapRequest};
use evo_common::trajectory::error::TpError;
use evo_common::trajectory::pose::{CART_FUZZ, Pose};
use evo_common::trajectory::state::{MotionEnables, MotionType, SyncMode, TermCond};
use tracing::{debug, info, warn};

use crate::segment::{ArcMotion, LineMotion, RigidTap, Segment, SegmentKind};

use super::PlannerContext;

fn positive(value: f64, what: &'static str) -> Result<f64, TpError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(TpError::InvalidArgument(what))
    }
}

fn non_negative(value: f64, what: &'static str) -> Result<f64, TpError> {
    if value >= 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(TpError::InvalidArgument(what))
    }
}

/// Successor of `id`, wrapping past `u32::MAX` to 1.
#[inline]
fn next_segment_id(id: u32) -> u32 {
    id.checked_add(1).unwrap_or(1)
}

fn finite_pose(pose: &Pose) -> Result<(), TpError> {
    if pose.axes().iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(TpError::InvalidArgument("end pose must be finite"))
    }
}

/// Per-segment limits resolved from a request and the planner maxima.
struct Limits {
    req_vel: f64,
    max_vel: f64,
    max_accel: f64,
}

impl PlannerContext {
    // ─── Limits and Modes ───────────────────────────────────────────

    /// Set the cycle period [s].
    pub fn set_cycle_time(&mut self, secs: f64) -> Result<(), TpError> {
        self.state.cycle_time = positive(secs, "cycle time must be positive")?;
        Ok(())
    }

    /// Upper bound on any segment's maximum velocity.
    pub fn set_vmax(&mut self, v_max: f64) -> Result<(), TpError> {
        self.state.v_max = positive(v_max, "max velocity must be positive")?;
        Ok(())
    }

    /// Tool-tip velocity limit for segments that move linear axes.
    pub fn set_vlimit(&mut self, v_limit: f64) -> Result<(), TpError> {
        self.state.v_limit = non_negative(v_limit, "velocity limit must not be negative")?;
        Ok(())
    }

    /// Upper bound on any segment's acceleration.
    pub fn set_amax(&mut self, a_max: f64) -> Result<(), TpError> {
        self.state.a_max = positive(a_max, "max acceleration must be positive")?;
        Ok(())
    }

    /// Velocity scale applied on top of the machine feed override.
    pub fn set_vscale(&mut self, scale: f64) -> Result<(), TpError> {
        self.state.v_scale = non_negative(scale, "velocity scale must not be negative")?;
        Ok(())
    }

    /// Id given to the next enqueued segment.
    ///
    /// Id 0 means idle in the published status, so it is never handed out;
    /// asking for it starts at 1.
    pub fn set_id(&mut self, id: u32) {
        self.state.next_id = id.max(1);
    }

    /// Termination condition and path tolerance for newly queued segments.
    ///
    /// A tolerance of zero means "no corner tolerance": blends are bounded
    /// by velocity only.
    pub fn set_term_cond(&mut self, cond: TermCond, tolerance: f64) -> Result<(), TpError> {
        let tolerance = non_negative(tolerance, "tolerance must not be negative")?;
        self.state.term_cond = cond;
        self.state.tolerance = tolerance;
        Ok(())
    }

    /// Declare the machine position; the next move starts here.
    pub fn set_pos(&mut self, pos: Pose) -> Result<(), TpError> {
        finite_pose(&pos)?;
        self.state.current_pos = pos;
        self.state.goal_pos = pos;
        Ok(())
    }

    /// Couple newly queued segments to the spindle.
    ///
    /// `uu_per_rev == 0` switches synchronization off. `velocity_mode`
    /// selects feed-per-revolution instead of position lock.
    pub fn set_spindle_sync(&mut self, uu_per_rev: f64, velocity_mode: bool) -> Result<(), TpError> {
        let uu_per_rev = non_negative(uu_per_rev, "units per revolution must not be negative")?;
        if uu_per_rev == 0.0 {
            self.state.sync_mode = SyncMode::None;
            self.state.uu_per_rev = 0.0;
        } else {
            self.state.sync_mode = if velocity_mode {
                SyncMode::Velocity
            } else {
                SyncMode::Position
            };
            self.state.uu_per_rev = uu_per_rev;
        }
        debug!(mode = ?self.state.sync_mode, uu_per_rev, "spindle sync set");
        Ok(())
    }

    // ─── Motion ─────────────────────────────────────────────────────

    /// Queue a straight move from the current goal to `req.end`.
    ///
    /// Returns the new segment's id.
    pub fn add_line(&mut self, req: &LineRequest) -> Result<u32, TpError> {
        let limits = self.check_motion(req.vel, req.max_vel, req.acc)?;
        finite_pose(&req.end)?;
        if let Some(axis) = req.index_rotary {
            if axis >= MAX_ROTARY_AXES {
                return Err(TpError::InvalidArgument("rotary axis out of range"));
            }
        }

        let line = LineMotion::new(&self.state.goal_pos, &req.end);
        let mut seg = self.build(
            SegmentKind::Line(line),
            req.motion_type,
            &limits,
            req.enables,
            req.atspeed,
        );
        seg.index_rotary = req.index_rotary;
        self.push(seg, Some(req.end))
    }

    /// Queue a circular or helical move from the current goal to `req.end`.
    pub fn add_circle(&mut self, req: &ArcRequest) -> Result<u32, TpError> {
        let limits = self.check_motion(req.vel, req.max_vel, req.acc)?;
        finite_pose(&req.end)?;

        let arc = ArcMotion::new(
            &self.state.goal_pos,
            &req.end,
            req.center,
            req.normal,
            req.turn,
        )
        .ok_or(TpError::InvalidArgument("arc center or normal is degenerate"))?;
        let seg = self.build(
            SegmentKind::Arc(arc),
            req.motion_type,
            &limits,
            req.enables,
            req.atspeed,
        );
        self.push(seg, Some(req.end))
    }

    /// Queue a rigid-tap cycle from the current goal down to `req.end`.
    ///
    /// Requires position-mode spindle sync. The tap returns to its start
    /// point, so the goal does not move.
    pub fn add_rigid_tap(&mut self, req: &RigidTapRequest) -> Result<u32, TpError> {
        if self.state.sync_mode != SyncMode::Position {
            return Err(TpError::SynchronizationRejected);
        }
        let limits = self.check_motion(req.vel, req.max_vel, req.acc)?;
        finite_pose(&req.end)?;

        let tap = RigidTap::new(&self.state.goal_pos, &req.end);
        if tap.depth() < CART_FUZZ {
            return Err(TpError::InvalidArgument("rigid tap depth must be positive"));
        }
        let mut seg = self.build(
            SegmentKind::RigidTap(tap),
            MotionType::Feed,
            &limits,
            req.enables,
            true,
        );
        seg.target = tap.depth() + RIGID_TAP_OVERSHOOT_REVS * self.state.uu_per_rev;
        seg.blend_with_next = false;
        self.push(seg, None)
    }

    fn check_motion(&self, vel: f64, max_vel: Option<f64>, acc: f64) -> Result<Limits, TpError> {
        if self.state.aborting {
            return Err(TpError::Aborting);
        }
        let req_vel = positive(vel, "velocity must be positive")?;
        let max_accel = positive(acc, "acceleration must be positive")?.min(self.state.a_max);
        let max_vel = match max_vel {
            Some(v) => positive(v, "max velocity must be positive")?.min(self.state.v_max),
            None => self.state.v_max,
        };
        if self.producer.is_full() {
            warn!(capacity = self.producer.capacity(), "segment queue full");
            return Err(TpError::QueueFull {
                capacity: self.producer.capacity(),
            });
        }
        Ok(Limits {
            req_vel,
            max_vel,
            max_accel,
        })
    }

    fn build(
        &self,
        kind: SegmentKind,
        motion_type: MotionType,
        limits: &Limits,
        enables: MotionEnables,
        atspeed: bool,
    ) -> Segment {
        let s = &self.state;
        let mut seg = Segment::new(s.next_id, kind, motion_type);
        seg.req_vel = limits.req_vel;
        seg.max_vel = limits.max_vel;
        seg.max_accel = limits.max_accel;
        seg.blend_with_next = s.term_cond == TermCond::Blend;
        seg.tolerance = s.tolerance;
        seg.sync = s.sync_mode;
        seg.uu_per_rev = s.uu_per_rev;
        seg.atspeed = atspeed;
        seg.enables = enables;
        seg
    }

    fn push(&mut self, mut seg: Segment, goal: Option<Pose>) -> Result<u32, TpError> {
        seg.synced_io = self.state.pending_io.take();
        let id = seg.id;
        let target = seg.target;
        self.producer.enqueue(seg)?;

        if let Some(goal) = goal {
            self.state.goal_pos = goal;
        }
        self.state.next_id = next_segment_id(self.state.next_id);
        self.state.done = false;
        debug!(id, target, depth = self.producer.len(), "segment queued");
        Ok(id)
    }

    // ─── Flow Control ───────────────────────────────────────────────

    /// Ramp every active segment down to zero feed and hold.
    ///
    /// Position-synced motion ignores pause; it must follow the spindle.
    pub fn pause(&mut self) {
        if !self.state.paused {
            debug!("pause");
        }
        self.state.paused = true;
    }

    pub fn resume(&mut self) {
        if self.state.paused {
            debug!("resume");
        }
        self.state.paused = false;
    }

    /// Decelerate to a stop, then discard the queue.
    ///
    /// Pending synced outputs are dropped. New motion is refused until the
    /// stop has completed.
    pub fn abort(&mut self) {
        if !self.state.aborting {
            self.pause();
            self.state.aborting = true;
            info!(depth = self.producer.len(), "abort requested");
        }
        self.state.pending_io.clear();
    }

    /// Drop all queued motion and planner modes immediately.
    ///
    /// The commanded position is kept; limits set through the command API
    /// are kept as well.
    pub fn clear(&mut self) {
        let s = &mut self.state;
        self.producer.reset();
        // Both halves live here, so the flushed slots come back at once.
        self.consumer.release_flushed();
        s.goal_pos = s.current_pos;
        s.next_id = 1;
        s.exec_id = 0;
        s.motion_type = None;
        s.term_cond = TermCond::Blend;
        s.tolerance = 0.0;
        s.done = true;
        s.active_depth = 0;
        s.aborting = false;
        s.paused = false;
        s.sync_mode = SyncMode::None;
        s.uu_per_rev = 0.0;
        s.spindle = Default::default();
        s.pending_io.clear();
    }

    // ─── Synced I/O ─────────────────────────────────────────────────

    /// Switch digital output `index` when the next queued segment starts.
    pub fn set_dout(&mut self, index: usize, on: bool) -> Result<(), TpError> {
        self.state.pending_io.set_dout(index, on)
    }

    /// Set analog output `index` when the next queued segment starts.
    pub fn set_aout(&mut self, index: usize, value: f64) -> Result<(), TpError> {
        self.state.pending_io.set_aout(index, value)
    }
}
