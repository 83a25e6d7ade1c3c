//! Spindle-synchronized feed.
//!
//! Velocity mode scales the requested path velocity with measured spindle
//! speed. Position mode closes a loop on the spindle angle: the path
//! velocity is the spindle velocity in user units plus a correction that
//! would cancel the position error at the segment's acceleration limit.

use evo_common::trajectory::state::{RigidTapState, SyncMode};
use tracing::trace;

use crate::io::SpindleFeedback;
use crate::segment::{Segment, SegmentKind};

/// Spindle bookkeeping carried across cycles and segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SpindleSync {
    /// Spindle revolutions already consumed by earlier synced segments.
    pub(crate) offset: f64,
    /// Spindle position seen last cycle [rev].
    pub(crate) revs: f64,
    /// Segment waiting for the index pulse before it may move.
    pub(crate) waiting_for_index: Option<u32>,
    /// Segment waiting for the spindle to reach speed.
    pub(crate) waiting_for_atspeed: Option<u32>,
    /// Index seen; position-synced motion follows the spindle.
    pub(crate) locked: bool,
    /// Signed encoder position from the previous rigid-tap cycle.
    pub(crate) last_signed_pos: f64,
}

impl SpindleSync {
    pub(crate) fn clear_waits(&mut self) {
        self.waiting_for_index = None;
        self.waiting_for_atspeed = None;
    }
}

/// Spindle position as seen by a position-synced segment.
///
/// After the tap reverses the encoder counts back down, so the return
/// stroke measures revolutions since the reversal.
fn synced_revs(tc: &Segment, fb: &SpindleFeedback) -> f64 {
    let pos = fb.signed_position();
    match &tc.kind {
        SegmentKind::RigidTap(tap)
            if matches!(
                tap.state,
                RigidTapState::Retraction | RigidTapState::FinalReversal
            ) =>
        {
            tap.revs_at_reversal - pos
        }
        _ => pos,
    }
}

/// Set requested velocity and feed override of the head (and its blend
/// partner) for this cycle.
///
/// `feed_scale` is the net feed override times the planner velocity scale.
/// While aborting the requested velocity is left alone so the zero set by
/// the abort path holds.
pub(crate) fn update_feed(
    spindle: &mut SpindleSync,
    tc: &mut Segment,
    next: Option<&mut Segment>,
    fb: &SpindleFeedback,
    feed_scale: f64,
    cycle_time: f64,
    aborting: bool,
) {
    let next_progress = next.as_deref().map_or(0.0, |n| n.progress);

    match tc.sync {
        SyncMode::None => {
            spindle.locked = false;
            tc.feed_override = feed_scale;
            if let Some(n) = next {
                n.feed_override = feed_scale;
            }
            return;
        }
        SyncMode::Velocity => {
            let pos_error = fb.speed_in.abs() * tc.uu_per_rev - next_progress;
            if !aborting {
                tc.feed_override = feed_scale;
                tc.req_vel = pos_error;
            }
        }
        SyncMode::Position => {
            let new_revs = synced_revs(tc, fb);
            let pos_error =
                (new_revs - spindle.offset) * tc.uu_per_rev - tc.progress - next_progress;

            if !aborting {
                if tc.sync_accel > 0 {
                    // Still catching up with the spindle from standstill.
                    let spindle_vel = new_revs / (cycle_time * f64::from(tc.sync_accel));
                    tc.sync_accel += 1;
                    let target_vel = spindle_vel * tc.uu_per_rev;
                    if tc.current_vel >= target_vel {
                        spindle.offset = new_revs - tc.progress / tc.uu_per_rev;
                        tc.sync_accel = 0;
                        tc.req_vel = target_vel;
                        trace!(id = tc.id, offset = spindle.offset, "spindle sync locked");
                    } else {
                        tc.req_vel = tc.max_vel;
                    }
                } else {
                    let spindle_vel = (new_revs - spindle.revs) / cycle_time;
                    let target_vel = spindle_vel * tc.uu_per_rev;
                    let error_vel = (pos_error.abs() * tc.max_accel)
                        .sqrt()
                        .copysign(pos_error);
                    tc.req_vel = target_vel + error_vel;
                }
            }
            spindle.revs = new_revs;
            tc.feed_override = 1.0;
        }
    }

    if tc.req_vel < 0.0 {
        tc.req_vel = 0.0;
    }

    if let Some(n) = next {
        if n.sync.is_synced() {
            n.req_vel = tc.req_vel;
            n.feed_override = 1.0;
        } else {
            n.feed_override = feed_scale;
        }
    }
}
