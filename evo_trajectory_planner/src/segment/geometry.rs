//! Parametric line and circle primitives.
//!
//! Both primitives are parameterised by path length from their start so a
//! segment's `progress` maps directly onto them.

use evo_common::trajectory::pose::{CART_FUZZ, Cartesian};
use std::f64::consts::{PI, TAU};

/// Angle below which a computed sweep is treated as a full turn.
const CIRCLE_FUZZ: f64 = 1.0e-6;

// ─── Line ───────────────────────────────────────────────────────────

/// Straight line in one coordinate triple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineGeom {
    start: Cartesian,
    end: Cartesian,
    unit: Cartesian,
    length: f64,
}

impl LineGeom {
    pub fn new(start: Cartesian, end: Cartesian) -> Self {
        let delta = end - start;
        let length = delta.mag();
        let unit = delta.unit().unwrap_or(Cartesian::ZERO);
        Self {
            start,
            end,
            unit,
            length,
        }
    }

    #[inline]
    pub fn start(&self) -> Cartesian {
        self.start
    }

    #[inline]
    pub fn end(&self) -> Cartesian {
        self.end
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Zero-length lines carry no direction.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.length < CART_FUZZ
    }

    /// Unit direction (zero for a degenerate line).
    #[inline]
    pub fn unit(&self) -> Cartesian {
        self.unit
    }

    /// Point `len` along the line. Extrapolates beyond either end.
    #[inline]
    pub fn point(&self, len: f64) -> Cartesian {
        if self.is_degenerate() {
            return self.end;
        }
        self.start + self.unit * len
    }

    /// Point at `fraction` of the way from start to end.
    #[inline]
    pub fn lerp(&self, fraction: f64) -> Cartesian {
        self.start + (self.end - self.start) * fraction
    }
}

// ─── Circle ─────────────────────────────────────────────────────────

/// Circle, helix or planar spiral in the XYZ triple.
///
/// The sweep runs counter-clockwise about `normal`. `spiral` is the radius
/// change from start to end and `r_helix` the axial offset of the end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleGeom {
    center: Cartesian,
    normal: Cartesian,
    r_tan: Cartesian,
    r_perp: Cartesian,
    r_helix: Cartesian,
    radius: f64,
    angle: f64,
    spiral: f64,
}

impl CircleGeom {
    /// Build the circle through `start` about `center`.
    ///
    /// A negative `turn` flips the normal. Each extra turn adds a full
    /// revolution. Returns `None` for a zero normal or zero radius.
    pub fn new(
        start: Cartesian,
        end: Cartesian,
        center: Cartesian,
        normal: Cartesian,
        turn: i32,
    ) -> Option<Self> {
        let mut normal = normal.unit()?;
        let mut turn = turn;
        if turn < 0 {
            normal = -normal;
            turn = -1 - turn;
        }

        // Center is taken in the plane of the start point.
        let center = center + normal * (start - center).dot(normal);
        let r_tan = start - center;
        let radius = r_tan.mag();
        if radius < CART_FUZZ {
            return None;
        }
        let r_perp = normal.cross(r_tan);

        let to_end = end - center;
        let in_plane = to_end.plane_projection(normal);
        let r_helix = to_end - in_plane;
        let spiral = in_plane.mag() - radius;
        let r_end = in_plane.unit().map_or(r_tan, |u| u * radius);

        let dot = r_tan.dot(r_end) / (radius * radius);
        let mut angle = if dot > 1.0 {
            0.0
        } else if dot < -1.0 {
            PI
        } else {
            dot.acos()
        };
        if r_tan.cross(r_end).dot(normal) < 0.0 {
            angle = TAU - angle;
        }
        if angle.abs() < CIRCLE_FUZZ {
            angle = TAU;
        }
        angle += f64::from(turn) * TAU;

        Some(Self {
            center,
            normal,
            r_tan,
            r_perp,
            r_helix,
            radius,
            angle,
            spiral,
        })
    }

    #[inline]
    pub fn center(&self) -> Cartesian {
        self.center
    }

    #[inline]
    pub fn normal(&self) -> Cartesian {
        self.normal
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Total swept angle [rad].
    #[inline]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Path length including the axial helix component.
    pub fn length(&self) -> f64 {
        let axial = self.r_helix.dot(self.normal);
        ((self.angle * self.radius).powi(2) + axial * axial).sqrt()
    }

    /// Point after sweeping `theta` radians from the start.
    pub fn point(&self, theta: f64) -> Cartesian {
        let radial = self.r_tan * theta.cos() + self.r_perp * theta.sin();
        let scale = if self.angle == 0.0 {
            0.0
        } else {
            theta / self.angle
        };
        let spiral = radial.unit().unwrap_or(Cartesian::ZERO) * (scale * self.spiral);
        self.center + radial + spiral + self.r_helix * scale
    }

    /// Unit tangent after sweeping `theta` radians.
    pub fn tangent(&self, theta: f64) -> Cartesian {
        let radial = self.r_tan * theta.cos() + self.r_perp * theta.sin();
        let d_radial = self.r_perp * theta.cos() - self.r_tan * theta.sin();
        let inv_angle = if self.angle == 0.0 {
            0.0
        } else {
            1.0 / self.angle
        };
        let scale = theta * inv_angle;
        let d = d_radial * (1.0 + scale * self.spiral / self.radius)
            + radial * (self.spiral * inv_angle / self.radius)
            + self.r_helix * inv_angle;
        d.unit().unwrap_or(Cartesian::ZERO)
    }
}
