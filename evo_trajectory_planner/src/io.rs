//! Machine-side seam of the planner.
//!
//! Every cycle the caller snapshots machine feedback into [`CycleInputs`],
//! hands a [`MachineIo`] implementation to `run_cycle`, and receives a
//! [`CycleOutput`]. The planner never reads or writes hardware any other way.

use evo_common::consts::{MAX_ROTARY_AXES, MAX_SYNCED_AIO, MAX_SYNCED_DIO};
use evo_common::trajectory::error::TpError;
use evo_common::trajectory::pose::Pose;
use evo_common::trajectory::state::{MotionEnables, MotionType};
use serde::Serialize;

// ─── Inputs ─────────────────────────────────────────────────────────

/// Spindle encoder and drive feedback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpindleFeedback {
    /// Encoder position [rev]. Counts down while turning in reverse.
    pub revs: f64,
    /// Commanded direction: 1 forward, -1 reverse, 0 stopped.
    pub direction: i8,
    /// Measured speed [rev/s].
    pub speed_in: f64,
    /// Drive reports the commanded speed has been reached.
    pub at_speed: bool,
    /// Index arm flag; the encoder clears it on the next index pulse.
    pub index_enable: bool,
}

impl SpindleFeedback {
    /// Encoder position in the commanded direction of rotation.
    #[inline]
    pub fn signed_position(&self) -> f64 {
        if self.direction < 0 {
            -self.revs
        } else {
            self.revs
        }
    }
}

impl Default for SpindleFeedback {
    fn default() -> Self {
        Self {
            revs: 0.0,
            direction: 0,
            speed_in: 0.0,
            at_speed: true,
            index_enable: false,
        }
    }
}

/// Per-cycle snapshot of everything the planner reads from the machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleInputs {
    pub spindle: SpindleFeedback,
    /// Combined feed override, adaptive feed and feed hold scale.
    pub net_feed_scale: f64,
    /// Single-step mode; disables blending.
    pub stepping: bool,
}

impl Default for CycleInputs {
    fn default() -> Self {
        Self {
            spindle: SpindleFeedback::default(),
            net_feed_scale: 1.0,
            stepping: false,
        }
    }
}

// ─── Machine Commands ───────────────────────────────────────────────

/// Commands the planner issues to the machine during a cycle.
///
/// Implementations must not block; each call records a request that takes
/// effect by the next cycle.
pub trait MachineIo {
    /// Arm the spindle encoder to latch and zero on its next index pulse.
    fn request_spindle_index(&mut self);

    /// Invert the commanded spindle speed.
    fn reverse_spindle(&mut self);

    /// Request a rotary indexer to unlock (`true`) or lock (`false`).
    fn set_rotary_unlock(&mut self, axis: usize, unlock: bool);

    /// Whether the rotary indexer currently reports unlocked.
    fn rotary_is_unlocked(&self, axis: usize) -> bool;

    fn write_dout(&mut self, index: usize, on: bool);

    fn write_aout(&mut self, index: usize, value: f64);
}

/// Machine without spindle or outputs whose indexers switch instantly.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIo {
    unlocked: [bool; MAX_ROTARY_AXES],
}

impl MachineIo for NullIo {
    fn request_spindle_index(&mut self) {}
    fn reverse_spindle(&mut self) {}
    fn set_rotary_unlock(&mut self, axis: usize, unlock: bool) {
        if let Some(slot) = self.unlocked.get_mut(axis) {
            *slot = unlock;
        }
    }
    fn rotary_is_unlocked(&self, axis: usize) -> bool {
        self.unlocked.get(axis).copied().unwrap_or(false)
    }
    fn write_dout(&mut self, _index: usize, _on: bool) {}
    fn write_aout(&mut self, _index: usize, _value: f64) {}
}

// ─── Synced I/O ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoutChange {
    pub index: usize,
    pub on: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AoutChange {
    pub index: usize,
    pub value: f64,
}

/// Output changes that fire when a segment starts.
///
/// At most one entry per output index; a later request for the same index
/// replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncedIo {
    dout: heapless::Vec<DoutChange, MAX_SYNCED_DIO>,
    aout: heapless::Vec<AoutChange, MAX_SYNCED_AIO>,
}

impl SyncedIo {
    pub fn set_dout(&mut self, index: usize, on: bool) -> Result<(), TpError> {
        if index >= MAX_SYNCED_DIO {
            return Err(TpError::InvalidArgument("digital output index out of range"));
        }
        if let Some(change) = self.dout.iter_mut().find(|c| c.index == index) {
            change.on = on;
            return Ok(());
        }
        self.dout
            .push(DoutChange { index, on })
            .map_err(|_| TpError::InvalidArgument("too many synced digital outputs"))
    }

    pub fn set_aout(&mut self, index: usize, value: f64) -> Result<(), TpError> {
        if index >= MAX_SYNCED_AIO {
            return Err(TpError::InvalidArgument("analog output index out of range"));
        }
        if !value.is_finite() {
            return Err(TpError::InvalidArgument("analog output value must be finite"));
        }
        if let Some(change) = self.aout.iter_mut().find(|c| c.index == index) {
            change.value = value;
            return Ok(());
        }
        self.aout
            .push(AoutChange { index, value })
            .map_err(|_| TpError::InvalidArgument("too many synced analog outputs"))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dout.is_empty() && self.aout.is_empty()
    }

    pub fn douts(&self) -> &[DoutChange] {
        &self.dout
    }

    pub fn aouts(&self) -> &[AoutChange] {
        &self.aout
    }

    /// Move the pending changes out, leaving this list empty.
    #[inline]
    pub fn take(&mut self) -> Self {
        core::mem::take(self)
    }

    pub fn clear(&mut self) {
        self.dout.clear();
        self.aout.clear();
    }

    /// Write every change to the machine and forget them.
    ///
    /// Returns `false` when there was nothing to write.
    pub fn apply(&mut self, io: &mut impl MachineIo) -> bool {
        if self.is_empty() {
            return false;
        }
        for change in self.dout.iter() {
            io.write_dout(change.index, change.on);
        }
        for change in self.aout.iter() {
            io.write_aout(change.index, change.value);
        }
        self.clear();
        true
    }
}

// ─── Outputs ────────────────────────────────────────────────────────

/// Why the planner held position this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitReason {
    SpindleAtSpeed,
    SpindleIndex,
    RotaryUnlock,
    RotaryLock,
}

/// What the cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    /// Queue empty.
    Idle,
    Waiting(WaitReason),
    /// Head segment advanced alone.
    Moving,
    /// Head and next advanced together.
    Blending,
    /// Abort finished; queue cleared.
    Aborted,
}

/// Status published at the end of every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleOutput {
    /// Commanded pose.
    pub position: Pose,
    /// Remaining path length of the reported segment.
    pub distance_to_go: f64,
    /// Per-axis distance from `position` to the reported segment's end.
    pub dtg: Pose,
    /// Path velocity (sum of both segments while blending).
    pub current_vel: f64,
    pub requested_vel: f64,
    pub motion_type: Option<MotionType>,
    /// Id of the reported segment (0 when idle).
    pub exec_id: u32,
    pub queue_depth: usize,
    pub active_depth: usize,
    pub enables_queued: MotionEnables,
    pub spindle_synced: bool,
    pub phase: CyclePhase,
    pub done: bool,
}

impl CycleOutput {
    /// Output of a cycle that did not move.
    pub fn holding(position: Pose, phase: CyclePhase) -> Self {
        Self {
            position,
            distance_to_go: 0.0,
            dtg: Pose::ZERO,
            current_vel: 0.0,
            requested_vel: 0.0,
            motion_type: None,
            exec_id: 0,
            queue_depth: 0,
            active_depth: 0,
            enables_queued: MotionEnables::empty(),
            spindle_synced: false,
            phase,
            done: matches!(phase, CyclePhase::Idle | CyclePhase::Aborted),
        }
    }
}
