//! The per-cycle driver.
//!
//! One call to [`PlannerContext::run_cycle`] does, in order:
//!
//! 1. retire the head segment if it has reached its target
//! 2. decide whether the head blends with its successor
//! 3. finish or continue a running abort
//! 4. resolve spindle and rotary waits, activate the head
//! 5. step the rigid-tap state machine
//! 6. compute feed overrides and spindle-synced velocities
//! 7. advance the head (and the successor while blending)
//! 8. publish position, fire synced outputs, report status

use evo_common::trajectory::pose::Pose;
use evo_common::trajectory::state::SyncMode;
use tracing::{debug, warn};

use crate::io::{CycleInputs, CycleOutput, CyclePhase, MachineIo, SpindleFeedback, WaitReason};
use crate::segment::Segment;

use super::{PlannerContext, blend, profile, rigid_tap, sync};

/// Velocities below this count as stopped when finishing an abort.
const STOPPED_EPSILON: f64 = 1.0e-8;

impl PlannerContext {
    /// Run one planning cycle.
    ///
    /// Never blocks and never allocates. Machine commands go through `io`;
    /// the returned [`CycleOutput`] is the status to publish.
    pub fn run_cycle(&mut self, inputs: &CycleInputs, io: &mut impl MachineIo) -> CycleOutput {
        if self.consumer.is_empty() {
            self.handle_empty_queue();
            return self.idle_output();
        }

        if let Some(reason) = self.retire_completed_head(io) {
            return self.waiting_output(reason);
        }
        if self.consumer.is_empty() {
            self.handle_empty_queue();
            return self.idle_output();
        }

        let with_next = self.resolve_blend_partner(inputs.stepping);

        if self.state.aborting {
            if self.abort_has_stopped(with_next) {
                self.finish_abort(io);
                return self.idle_output_with(CyclePhase::Aborted);
            }
            if let Some((tc, next)) = self.consumer.head_pair_mut() {
                tc.req_vel = 0.0;
                if let (true, Some(next)) = (with_next, next) {
                    next.req_vel = 0.0;
                }
            }
        }

        if let Some(reason) = self.check_waits(&inputs.spindle, io) {
            return self.waiting_output(reason);
        }

        self.advance(inputs, io, with_next)
    }

    // ─── Queue Bookkeeping ──────────────────────────────────────────

    fn handle_empty_queue(&mut self) {
        let s = &mut self.state;
        s.goal_pos = s.current_pos;
        s.done = true;
        s.active_depth = 0;
        s.aborting = false;
        s.exec_id = 0;
        s.motion_type = None;
        s.paused = false;
    }

    /// Drop the head once it has reached its target.
    ///
    /// A rotary-indexing move must see its indexer lock again before the
    /// next segment may start.
    fn retire_completed_head(&mut self, io: &mut impl MachineIo) -> Option<WaitReason> {
        let s = &mut self.state;
        let tc = self.consumer.peek_mut(0)?;
        if !tc.is_complete() || s.spindle.waiting_for_atspeed == Some(tc.id) {
            return None;
        }

        // Outputs of a segment too short to ever be reported.
        tc.synced_io.apply(io);

        if let Some(axis) = tc.index_rotary {
            io.set_rotary_unlock(axis, false);
            if io.rotary_is_unlocked(axis) {
                return Some(WaitReason::RotaryLock);
            }
        }

        if tc.sync.is_synced() {
            s.spindle.offset += tc.target / tc.uu_per_rev;
        } else {
            s.spindle.offset = 0.0;
        }
        self.consumer.dequeue_head();
        None
    }

    /// Whether the head blends with its successor this cycle.
    ///
    /// Blending needs a successor, continuous mode, matching sync modes and
    /// a successor that does not wait for spindle speed. A rotary index on
    /// either side stops at the boundary: the indexer has to lock or unlock
    /// while nothing moves.
    fn resolve_blend_partner(&mut self, stepping: bool) -> bool {
        let Some((tc, Some(next))) = self.consumer.head_pair_mut() else {
            return false;
        };
        if stepping || !tc.blend_with_next {
            return false;
        }
        let indexing = tc.index_rotary.is_some() || next.index_rotary.is_some();
        if tc.sync != next.sync || next.atspeed || indexing {
            tc.blend_with_next = false;
            return false;
        }
        true
    }

    // ─── Abort ──────────────────────────────────────────────────────

    fn abort_has_stopped(&self, with_next: bool) -> bool {
        let spindle = &self.state.spindle;
        if spindle.waiting_for_index.is_some() || spindle.waiting_for_atspeed.is_some() {
            return true;
        }
        let head_vel = self.consumer.peek(0).map_or(0.0, Segment::velocity);
        let next_vel = if with_next {
            self.consumer.peek(1).map_or(0.0, Segment::velocity)
        } else {
            0.0
        };
        head_vel.abs() < STOPPED_EPSILON && next_vel.abs() < STOPPED_EPSILON
    }

    fn finish_abort(&mut self, io: &mut impl MachineIo) {
        if let Some(axis) = self.consumer.peek(0).and_then(|tc| tc.index_rotary) {
            io.set_rotary_unlock(axis, false);
        }
        let dropped = self.consumer.drain();
        self.handle_empty_queue();

        let s = &mut self.state;
        s.sync_mode = SyncMode::None;
        s.uu_per_rev = 0.0;
        s.spindle.clear_waits();
        s.spindle.locked = false;
        s.pending_io.clear();
        debug!(dropped, "abort complete");
    }

    // ─── Waits and Activation ───────────────────────────────────────

    /// Resolve pending spindle waits and activate the head.
    ///
    /// Returns the reason to hold position this cycle, if any.
    fn check_waits(&mut self, fb: &SpindleFeedback, io: &mut impl MachineIo) -> Option<WaitReason> {
        let s = &mut self.state;
        let tc = self.consumer.peek_mut(0)?;

        if let Some(id) = s.spindle.waiting_for_index {
            if id != tc.id {
                warn!(waiting = id, head = tc.id, "dropping spindle index wait of another segment");
                s.spindle.waiting_for_index = None;
            }
        }
        if let Some(id) = s.spindle.waiting_for_atspeed {
            if id != tc.id {
                warn!(waiting = id, head = tc.id, "dropping at-speed wait of another segment");
                s.spindle.waiting_for_atspeed = None;
            }
        }

        if s.spindle.waiting_for_atspeed.is_some() {
            if !fb.at_speed {
                return Some(WaitReason::SpindleAtSpeed);
            }
            s.spindle.waiting_for_atspeed = None;
        }

        if s.spindle.waiting_for_index.is_some() {
            if fb.index_enable {
                return Some(WaitReason::SpindleIndex);
            }
            // Index seen: the encoder was zeroed, start chasing the spindle.
            s.spindle.waiting_for_index = None;
            s.spindle.locked = true;
            s.spindle.revs = 0.0;
            tc.sync_accel = 1;
            debug!(id = tc.id, "spindle index seen");
        }

        if !tc.active {
            let needs_speed = tc.atspeed || (tc.is_position_synced() && !s.spindle.locked);
            if needs_speed && !fb.at_speed {
                s.spindle.waiting_for_atspeed = Some(tc.id);
                return Some(WaitReason::SpindleAtSpeed);
            }

            if let Some(axis) = tc.index_rotary {
                io.set_rotary_unlock(axis, true);
                if !io.rotary_is_unlocked(axis) {
                    return Some(WaitReason::RotaryUnlock);
                }
            }

            tc.active = true;
            tc.current_vel = 0.0;
            tc.blending = false;
            if tc.blend_with_next {
                // Leave half the acceleration for the successor's ramp.
                tc.max_accel /= 2.0;
            }
            s.active_depth = 1;
            s.motion_type = Some(tc.motion_type);
            s.exec_id = tc.id;

            if tc.is_position_synced() && !s.spindle.locked {
                s.spindle.waiting_for_index = Some(tc.id);
                s.spindle.offset = 0.0;
                io.request_spindle_index();
                debug!(id = tc.id, "waiting for spindle index");
                return Some(WaitReason::SpindleIndex);
            }
        }

        None
    }

    // ─── Motion ─────────────────────────────────────────────────────

    fn advance(
        &mut self,
        inputs: &CycleInputs,
        io: &mut impl MachineIo,
        with_next: bool,
    ) -> CycleOutput {
        let queue_depth = self.consumer.len();
        let s = &mut self.state;
        let Some((tc, next)) = self.consumer.head_pair_mut() else {
            return CycleOutput::holding(s.current_pos, CyclePhase::Idle);
        };
        let mut next = if with_next { next } else { None };

        rigid_tap::advance(tc, &mut s.spindle, &inputs.spindle, io);

        if let Some(n) = next.as_deref_mut() {
            if !n.active {
                n.active = true;
                n.current_vel = 0.0;
                n.blending = false;
                if tc.blend_with_next || n.blend_with_next {
                    n.max_accel /= 2.0;
                }
            }
        }

        let feed_scale = inputs.net_feed_scale * s.v_scale;
        sync::update_feed(
            &mut s.spindle,
            tc,
            next.as_deref_mut(),
            &inputs.spindle,
            feed_scale,
            s.cycle_time,
            s.aborting,
        );

        if s.paused && !tc.is_position_synced() {
            tc.feed_override = 0.0;
            if let Some(n) = next.as_deref_mut() {
                n.feed_override = 0.0;
            }
        }

        if let Some(n) = next.as_deref() {
            tc.blend_vel = blend::blend_velocity(tc, n);
        }

        let primary_before = tc.pose();
        let primary_vel = profile::step(tc, s.cycle_time, s.v_limit);
        let primary_disp = tc.pose() - primary_before;

        let starts_blend = tc.blending || (tc.on_final_decel && primary_vel < tc.blend_vel);
        let (shown, phase, current_vel): (&Segment, CyclePhase, f64) = match next {
            Some(n) if starts_blend => {
                if !tc.blending {
                    debug!(id = tc.id, next = n.id, vel = primary_vel, "blend started");
                }
                tc.blending = true;

                // The successor ramps up by exactly what the head ramps down.
                let saved_req_vel = n.req_vel;
                n.req_vel = if n.feed_override > 0.0 {
                    ((tc.vel_at_blend_start - primary_vel) / n.feed_override).max(0.0)
                } else {
                    0.0
                };
                let secondary_before = n.pose();
                let secondary_vel = profile::step(n, s.cycle_time, s.v_limit);
                let secondary_disp = n.pose() - secondary_before;
                n.req_vel = saved_req_vel;

                s.current_pos += primary_disp + secondary_disp;
                s.active_depth = 2;

                let shown: &Segment = if tc.current_vel > n.current_vel {
                    tc.synced_io.apply(io);
                    &*tc
                } else {
                    n.synced_io.apply(io);
                    &*n
                };
                (shown, CyclePhase::Blending, primary_vel + secondary_vel)
            }
            _ => {
                tc.synced_io.apply(io);
                s.current_pos = tc.pose();
                s.active_depth = 1;
                (&*tc, CyclePhase::Moving, primary_vel)
            }
        };

        s.exec_id = shown.id;
        s.motion_type = Some(shown.motion_type);
        s.done = false;

        CycleOutput {
            position: s.current_pos,
            distance_to_go: shown.target - shown.progress,
            dtg: shown.end_pose() - s.current_pos,
            current_vel,
            requested_vel: shown.req_vel,
            motion_type: s.motion_type,
            exec_id: shown.id,
            queue_depth,
            active_depth: s.active_depth,
            enables_queued: shown.enables,
            spindle_synced: s.spindle.locked,
            phase,
            done: false,
        }
    }

    // ─── Status ─────────────────────────────────────────────────────

    fn idle_output(&self) -> CycleOutput {
        self.idle_output_with(CyclePhase::Idle)
    }

    fn idle_output_with(&self, phase: CyclePhase) -> CycleOutput {
        CycleOutput::holding(self.state.current_pos, phase)
    }

    fn waiting_output(&self, reason: WaitReason) -> CycleOutput {
        let head = self.consumer.peek(0);
        CycleOutput {
            exec_id: head.map_or(self.state.exec_id, Segment::id),
            motion_type: self.state.motion_type,
            queue_depth: self.consumer.len(),
            active_depth: self.state.active_depth,
            enables_queued: head.map(Segment::enables).unwrap_or_default(),
            spindle_synced: self.state.spindle.locked,
            distance_to_go: head.map_or(0.0, |tc| tc.target - tc.progress),
            dtg: head.map_or(Pose::ZERO, |tc| tc.end_pose() - self.state.current_pos),
            ..CycleOutput::holding(self.state.current_pos, CyclePhase::Waiting(reason))
        }
    }
}
