//! Blend velocity: the head speed below which the successor may start.

use crate::segment::Segment;

/// Corners sharper than this (cosine of the half angle) skip the tolerance
/// bound; the cruise bound alone applies.
const MIN_HALF_ANGLE_COS: f64 = 0.001;

/// Velocity at which `tc` hands over to `next`.
///
/// Starts from the speed `next` could reach over its own length, capped by
/// its requested velocity and scaled down when `tc` accelerates slower.
/// With a positive path tolerance the corner deviation bound
/// `2 * sqrt(a * tol / cos(theta))` also applies, `theta` being half the
/// angle between the two tangents.
pub(crate) fn blend_velocity(tc: &Segment, next: &Segment) -> f64 {
    let mut blend_vel = if next.max_accel > 0.0 {
        next.max_accel * (next.target / next.max_accel).sqrt()
    } else {
        0.0
    };

    let next_requested = next.req_vel * next.feed_override;
    if blend_vel > next_requested {
        blend_vel = next_requested;
    }
    if tc.max_accel < next.max_accel {
        blend_vel *= tc.max_accel / next.max_accel;
    }

    if tc.tolerance > 0.0 {
        let dot = tc.end_tangent().dot(next.start_tangent());
        let theta = (-dot).clamp(-1.0, 1.0).acos() / 2.0;
        let cos_theta = theta.cos();
        if cos_theta > MIN_HALF_ANGLE_COS {
            let tol_vel = 2.0 * (tc.max_accel * tc.tolerance / cos_theta).sqrt();
            if tol_vel < blend_vel {
                blend_vel = tol_vel;
            }
        }
    }

    blend_vel
}
