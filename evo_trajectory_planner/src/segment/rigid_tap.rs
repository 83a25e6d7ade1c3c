//! Rigid-tap geometry.
//!
//! A tap runs down `xyz`, overshoots while the spindle reverses, then
//! returns along `aux`, a line rebuilt from wherever the tool actually is
//! back to the hole's start point. UVW and ABC do not move.

use evo_common::trajectory::pose::{Cartesian, Pose};
use evo_common::trajectory::state::RigidTapState;

use super::geometry::LineGeom;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTap {
    pub(crate) xyz: LineGeom,
    pub(crate) aux: LineGeom,
    pub(crate) abc: Cartesian,
    pub(crate) uvw: Cartesian,
    pub(crate) state: RigidTapState,
    /// Progress at which the spindle is told to reverse.
    pub(crate) reversal_target: f64,
    /// Spindle position latched when reversal was detected [rev].
    pub(crate) revs_at_reversal: f64,
}

impl RigidTap {
    pub fn new(start: &Pose, end: &Pose) -> Self {
        let xyz = LineGeom::new(start.xyz, end.xyz);
        Self {
            xyz,
            aux: xyz,
            abc: start.abc,
            uvw: start.uvw,
            state: RigidTapState::Tapping,
            reversal_target: xyz.length(),
            revs_at_reversal: 0.0,
        }
    }

    #[inline]
    pub fn state(&self) -> RigidTapState {
        self.state
    }

    /// Depth of the hole along the tap axis.
    #[inline]
    pub fn depth(&self) -> f64 {
        self.xyz.length()
    }

    #[inline]
    pub fn reversal_target(&self) -> f64 {
        self.reversal_target
    }

    fn active_line(&self) -> &LineGeom {
        if self.state.on_return_path() {
            &self.aux
        } else {
            &self.xyz
        }
    }

    pub fn pose_at(&self, progress: f64) -> Pose {
        Pose::new(self.active_line().point(progress), self.abc, self.uvw)
    }

    /// Where the current phase is heading: the hole bottom on the way in,
    /// the start point on the way out.
    pub fn end_pose(&self) -> Pose {
        Pose::new(self.active_line().end(), self.abc, self.uvw)
    }

    pub fn start_tangent(&self) -> Cartesian {
        self.xyz.unit()
    }

    pub fn end_tangent(&self) -> Cartesian {
        self.active_line().unit()
    }

    /// Replace the return line with one from `from` back to the hole start.
    pub(crate) fn retarget_return(&mut self, from: Cartesian) {
        self.aux = LineGeom::new(from, self.xyz.start());
    }
}
