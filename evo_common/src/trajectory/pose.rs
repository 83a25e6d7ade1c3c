//! Cartesian vectors and nine-axis poses.
//!
//! A [`Pose`] groups the nine coordinated axes as three triples: primary
//! XYZ, rotary ABC and secondary UVW. Serialized poses use a flat
//! `{ x, y, z, a, b, c, u, v, w }` table where omitted axes are zero.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Length below which a vector or displacement counts as zero.
pub const CART_FUZZ: f64 = 1.0e-6;

// ─── Cartesian ──────────────────────────────────────────────────────

/// Three-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Cartesian {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Cartesian {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    #[inline]
    pub fn mag(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, `None` for a (near) zero vector.
    #[inline]
    pub fn unit(self) -> Option<Self> {
        let mag = self.mag();
        if mag < CART_FUZZ {
            None
        } else {
            Some(self * (1.0 / mag))
        }
    }

    /// Component of `self` lying in the plane whose normal is `unit_normal`.
    #[inline]
    pub fn plane_projection(self, unit_normal: Self) -> Self {
        self - unit_normal * self.dot(unit_normal)
    }

    /// Distance to `other`.
    #[inline]
    pub fn distance(self, other: Self) -> f64 {
        (self - other).mag()
    }
}

impl Add for Cartesian {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Cartesian {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Cartesian {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Cartesian {
    type Output = Self;
    #[inline]
    fn mul(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }
}

impl Neg for Cartesian {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

// ─── Pose ───────────────────────────────────────────────────────────

/// Position of all nine coordinated axes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "AxisTable", into = "AxisTable")]
pub struct Pose {
    /// Primary linear axes.
    pub xyz: Cartesian,
    /// Rotary axes.
    pub abc: Cartesian,
    /// Secondary linear axes.
    pub uvw: Cartesian,
}

impl Pose {
    pub const ZERO: Self = Self::new(Cartesian::ZERO, Cartesian::ZERO, Cartesian::ZERO);

    #[inline]
    pub const fn new(xyz: Cartesian, abc: Cartesian, uvw: Cartesian) -> Self {
        Self { xyz, abc, uvw }
    }

    /// Pose with only the primary axes set.
    #[inline]
    pub const fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self::new(Cartesian::new(x, y, z), Cartesian::ZERO, Cartesian::ZERO)
    }

    /// Axis values in `x y z a b c u v w` order.
    pub fn axes(&self) -> [f64; 9] {
        [
            self.xyz.x, self.xyz.y, self.xyz.z, self.abc.x, self.abc.y, self.abc.z, self.uvw.x,
            self.uvw.y, self.uvw.z,
        ]
    }

    /// Build a pose from `x y z a b c u v w` ordered values.
    pub fn from_axes(v: [f64; 9]) -> Self {
        Self::new(
            Cartesian::new(v[0], v[1], v[2]),
            Cartesian::new(v[3], v[4], v[5]),
            Cartesian::new(v[6], v[7], v[8]),
        )
    }

    /// True when every axis is within `tol` of `other`.
    pub fn is_near(&self, other: &Self, tol: f64) -> bool {
        self.axes()
            .iter()
            .zip(other.axes().iter())
            .all(|(a, b)| (a - b).abs() <= tol)
    }
}

impl Add for Pose {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.xyz + rhs.xyz, self.abc + rhs.abc, self.uvw + rhs.uvw)
    }
}

impl AddAssign for Pose {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Pose {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.xyz - rhs.xyz, self.abc - rhs.abc, self.uvw - rhs.uvw)
    }
}

/// Flat serialized form of [`Pose`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AxisTable {
    x: f64,
    y: f64,
    z: f64,
    a: f64,
    b: f64,
    c: f64,
    u: f64,
    v: f64,
    w: f64,
}

impl From<AxisTable> for Pose {
    fn from(t: AxisTable) -> Self {
        Self::from_axes([t.x, t.y, t.z, t.a, t.b, t.c, t.u, t.v, t.w])
    }
}

impl From<Pose> for AxisTable {
    fn from(p: Pose) -> Self {
        let [x, y, z, a, b, c, u, v, w] = p.axes();
        Self {
            x,
            y,
            z,
            a,
            b,
            c,
            u,
            v,
            w,
        }
    }
}
