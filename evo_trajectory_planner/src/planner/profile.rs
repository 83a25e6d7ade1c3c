//! Per-cycle trapezoidal velocity step.

use crate::segment::Segment;

/// Two velocities closer than this count as equal when deciding whether a
/// segment is on its final deceleration ramp.
const FINAL_DECEL_EPSILON: f64 = 0.001;

/// Advance `tc` by one cycle of length `cycle_time`.
///
/// The new velocity is the largest one from which the segment can still
/// stop at its target with `max_accel`, then clamped by the requested
/// velocity times feed override, the segment's own maximum and `v_limit`.
/// Acceleration never exceeds `max_accel` in either direction. Returns the
/// new velocity.
pub(crate) fn step(tc: &mut Segment, cycle_time: f64, v_limit: f64) -> f64 {
    if !tc.blending {
        tc.vel_at_blend_start = tc.current_vel;
    }

    let t = cycle_time;
    let a = tc.max_accel;
    let v = tc.current_vel;

    let discr_term = 0.5 * t * v - (tc.target - tc.progress);
    let max_new_vel = if discr_term > 0.0 {
        // Cannot stop in time anymore; land on the target.
        0.0
    } else {
        let discr = 0.25 * t * t - 2.0 / a * discr_term;
        -0.5 * a * t + a * discr.sqrt()
    };

    let mut new_vel = max_new_vel;
    if new_vel <= 0.0 {
        new_vel = 0.0;
        tc.progress = tc.target;
    } else {
        let requested = tc.req_vel * tc.feed_override;
        if new_vel > requested {
            new_vel = requested;
        }
        if new_vel > tc.max_vel {
            new_vel = tc.max_vel;
        }
        if !tc.is_angular_only() && !tc.is_position_synced() && new_vel > v_limit {
            new_vel = v_limit;
        }

        let accel = ((new_vel - v) / t).clamp(-a, a);
        new_vel = v + accel * t;
        tc.progress = (tc.progress + (new_vel + v) * 0.5 * t).min(tc.target);
    }

    tc.on_final_decel = (max_new_vel - new_vel).abs() < FINAL_DECEL_EPSILON;
    tc.current_vel = new_vel;
    new_vel
}
