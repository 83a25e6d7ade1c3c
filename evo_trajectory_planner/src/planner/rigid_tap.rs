//! Rigid-tap sequencing.
//!
//! ```text
//! Tapping ──(progress ≥ depth, reverse spindle)──▶ Reversing
//! Reversing ──(encoder turns back)──▶ Retraction
//! Retraction ──(back at start, reverse spindle)──▶ FinalReversal
//! FinalReversal ──(encoder turns forward)──▶ FinalPlacement
//! ```
//!
//! Retraction follows the spindle out along a return line rebuilt from the
//! actual tool position. FinalPlacement drops synchronization and moves
//! unsynced back onto the start point.

use evo_common::consts::RIGID_TAP_OVERSHOOT_REVS;
use evo_common::trajectory::state::{RigidTapState, SyncMode};
use tracing::debug;

use crate::io::{MachineIo, SpindleFeedback};
use crate::segment::{Segment, SegmentKind};

use super::sync::SpindleSync;

/// Run one cycle of the tap state machine on `tc`. No-op for other kinds.
pub(crate) fn advance(
    tc: &mut Segment,
    spindle: &mut SpindleSync,
    fb: &SpindleFeedback,
    io: &mut impl MachineIo,
) {
    let SegmentKind::RigidTap(tap) = &mut tc.kind else {
        return;
    };
    let new_pos = fb.signed_position();

    match tap.state {
        RigidTapState::Tapping => {
            if tc.progress >= tap.reversal_target {
                io.reverse_spindle();
                spindle.last_signed_pos = new_pos;
                tap.state = RigidTapState::Reversing;
                debug!(id = tc.id, depth = tc.progress, "rigid tap reversing spindle");
            }
        }
        RigidTapState::Reversing => {
            if new_pos < spindle.last_signed_pos {
                let here = tap.pose_at(tc.progress).xyz;
                tap.revs_at_reversal = new_pos + spindle.offset;
                tap.retarget_return(here);
                tap.reversal_target = tap.aux.length();
                tc.target = tap.aux.length() + RIGID_TAP_OVERSHOOT_REVS * tc.uu_per_rev;
                tc.progress = 0.0;
                tap.state = RigidTapState::Retraction;
                debug!(
                    id = tc.id,
                    return_length = tap.reversal_target,
                    "rigid tap retracting"
                );
            }
            spindle.last_signed_pos = new_pos;
        }
        RigidTapState::Retraction => {
            if tc.progress >= tap.reversal_target {
                io.reverse_spindle();
                tap.state = RigidTapState::FinalReversal;
                debug!(id = tc.id, "rigid tap final reversal");
            }
        }
        RigidTapState::FinalReversal => {
            if new_pos > spindle.last_signed_pos {
                let here = tap.pose_at(tc.progress).xyz;
                tap.retarget_return(here);
                tc.target = tap.aux.length();
                tc.progress = 0.0;
                tc.sync = SyncMode::None;
                tc.req_vel = tc.max_vel;
                tap.state = RigidTapState::FinalPlacement;
                debug!(id = tc.id, distance = tc.target, "rigid tap final placement");
            }
            spindle.last_signed_pos = new_pos;
        }
        RigidTapState::FinalPlacement => {}
    }
}
