//! Circular or helical XYZ move with linear UVW/ABC.

use evo_common::trajectory::pose::{Cartesian, Pose};

use super::geometry::{CircleGeom, LineGeom};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcMotion {
    pub(crate) xyz: CircleGeom,
    pub(crate) abc: LineGeom,
    pub(crate) uvw: LineGeom,
}

impl ArcMotion {
    /// `None` when the circle is undefined (zero normal or radius).
    pub fn new(
        start: &Pose,
        end: &Pose,
        center: Cartesian,
        normal: Cartesian,
        turn: i32,
    ) -> Option<Self> {
        Some(Self {
            xyz: CircleGeom::new(start.xyz, end.xyz, center, normal, turn)?,
            abc: LineGeom::new(start.abc, end.abc),
            uvw: LineGeom::new(start.uvw, end.uvw),
        })
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.xyz.length()
    }

    pub fn pose_at(&self, progress: f64, target: f64) -> Pose {
        let frac = if target > 0.0 { progress / target } else { 1.0 };
        Pose::new(
            self.xyz.point(frac * self.xyz.angle()),
            self.abc.lerp(frac),
            self.uvw.lerp(frac),
        )
    }

    pub fn start_tangent(&self) -> Cartesian {
        self.xyz.tangent(0.0)
    }

    pub fn end_tangent(&self) -> Cartesian {
        self.xyz.tangent(self.xyz.angle())
    }
}
