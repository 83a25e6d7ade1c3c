//! Motion request types accepted by the planner command API.
//!
//! Requests are plain data so that any producer (program files, an
//! interpreter, tests) can build them. The planner validates them on
//! enqueue and copies them into a queued segment.

use serde::{Deserialize, Serialize};

use super::pose::{Cartesian, Pose};
use super::state::{MotionEnables, MotionType};

fn feed() -> MotionType {
    MotionType::Feed
}

fn arc() -> MotionType {
    MotionType::Arc
}

/// Straight move of all nine axes to `end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineRequest {
    /// Target pose.
    pub end: Pose,
    /// Requested feed velocity [units/s].
    pub vel: f64,
    /// Velocity ceiling for this move; the planner's `v_max` when absent.
    #[serde(default)]
    pub max_vel: Option<f64>,
    /// Acceleration limit [units/s²].
    pub acc: f64,
    #[serde(default = "feed")]
    pub motion_type: MotionType,
    #[serde(default)]
    pub enables: MotionEnables,
    /// Hold the start until the spindle reports at-speed.
    #[serde(default)]
    pub atspeed: bool,
    /// Rotary axis (0 = A) to unlock before and re-lock after the move.
    #[serde(default)]
    pub index_rotary: Option<usize>,
}

impl LineRequest {
    /// Feed move with default enables and no spindle wait.
    pub fn feed(end: Pose, vel: f64, acc: f64) -> Self {
        Self {
            end,
            vel,
            max_vel: None,
            acc,
            motion_type: MotionType::Feed,
            enables: MotionEnables::default(),
            atspeed: false,
            index_rotary: None,
        }
    }
}

/// Circular or helical move in the plane given by `normal`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArcRequest {
    pub end: Pose,
    pub center: Cartesian,
    /// Plane normal; counter-clockwise motion about it is positive.
    pub normal: Cartesian,
    /// Extra full turns; negative values reverse the direction.
    #[serde(default)]
    pub turn: i32,
    pub vel: f64,
    #[serde(default)]
    pub max_vel: Option<f64>,
    pub acc: f64,
    #[serde(default = "arc")]
    pub motion_type: MotionType,
    #[serde(default)]
    pub enables: MotionEnables,
    #[serde(default)]
    pub atspeed: bool,
}

impl ArcRequest {
    pub fn new(end: Pose, center: Cartesian, normal: Cartesian, vel: f64, acc: f64) -> Self {
        Self {
            end,
            center,
            normal,
            turn: 0,
            vel,
            max_vel: None,
            acc,
            motion_type: MotionType::Arc,
            enables: MotionEnables::default(),
            atspeed: false,
        }
    }
}

/// Spindle-synchronized tap to `end` and back out to the start point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTapRequest {
    /// Bottom of the hole. Only the XYZ triple is used.
    pub end: Pose,
    pub vel: f64,
    #[serde(default)]
    pub max_vel: Option<f64>,
    pub acc: f64,
    #[serde(default)]
    pub enables: MotionEnables,
}

impl RigidTapRequest {
    pub fn new(end: Pose, vel: f64, acc: f64) -> Self {
        Self {
            end,
            vel,
            max_vel: None,
            acc,
            enables: MotionEnables::default(),
        }
    }
}
