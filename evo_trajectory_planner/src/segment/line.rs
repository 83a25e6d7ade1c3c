//! Straight nine-axis move.

use evo_common::trajectory::pose::{Cartesian, Pose};

use super::geometry::LineGeom;

/// Three independent lines sharing one progress parameter.
///
/// Progress is measured along the first non-degenerate triple in the order
/// XYZ, UVW, ABC. The other triples follow proportionally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMotion {
    pub(crate) xyz: LineGeom,
    pub(crate) abc: LineGeom,
    pub(crate) uvw: LineGeom,
}

impl LineMotion {
    pub fn new(start: &Pose, end: &Pose) -> Self {
        Self {
            xyz: LineGeom::new(start.xyz, end.xyz),
            abc: LineGeom::new(start.abc, end.abc),
            uvw: LineGeom::new(start.uvw, end.uvw),
        }
    }

    /// Path length along the driving triple.
    pub fn length(&self) -> f64 {
        if !self.xyz.is_degenerate() {
            self.xyz.length()
        } else if !self.uvw.is_degenerate() {
            self.uvw.length()
        } else {
            self.abc.length()
        }
    }

    /// Only the rotary axes move.
    pub fn is_angular_only(&self) -> bool {
        self.xyz.is_degenerate() && self.uvw.is_degenerate()
    }

    /// Pose `progress` along the move. At or past `target` this is the
    /// programmed end point exactly.
    pub fn pose_at(&self, progress: f64, target: f64) -> Pose {
        if progress >= target {
            return Pose::new(self.xyz.end(), self.abc.end(), self.uvw.end());
        }
        let frac = if target > 0.0 { progress / target } else { 1.0 };
        if !self.xyz.is_degenerate() {
            Pose::new(
                self.xyz.point(progress),
                self.abc.lerp(frac),
                self.uvw.lerp(frac),
            )
        } else if !self.uvw.is_degenerate() {
            Pose::new(
                self.xyz.lerp(frac),
                self.abc.lerp(frac),
                self.uvw.point(progress),
            )
        } else {
            Pose::new(
                self.xyz.lerp(frac),
                self.abc.point(progress),
                self.uvw.lerp(frac),
            )
        }
    }

    /// XYZ direction, falling back to UVW for a pure secondary move.
    pub fn tangent(&self) -> Cartesian {
        if !self.xyz.is_degenerate() {
            self.xyz.unit()
        } else {
            self.uvw.unit()
        }
    }
}
