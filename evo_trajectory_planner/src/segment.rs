//! Queued motion segments.
//!
//! A [`Segment`] pairs fixed geometry ([`SegmentKind`]) with the runtime
//! state the cycle driver advances: progress, velocities, blend and sync
//! bookkeeping. Geometry never changes after enqueue except for the rigid
//! tap's return line.

pub mod arc;
pub mod geometry;
pub mod line;
pub mod rigid_tap;

use evo_common::trajectory::pose::{Cartesian, Pose};
use evo_common::trajectory::state::{MotionEnables, MotionType, RigidTapState, SyncMode};

use crate::io::SyncedIo;

pub use arc::ArcMotion;
pub use line::LineMotion;
pub use rigid_tap::RigidTap;

/// Segment geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentKind {
    Line(LineMotion),
    Arc(ArcMotion),
    RigidTap(RigidTap),
}

impl SegmentKind {
    /// Nominal path length.
    pub fn length(&self) -> f64 {
        match self {
            Self::Line(line) => line.length(),
            Self::Arc(arc) => arc.length(),
            Self::RigidTap(tap) => tap.depth(),
        }
    }
}

/// One queued move plus its execution state.
#[derive(Debug, Clone)]
pub struct Segment {
    pub(crate) id: u32,
    pub(crate) kind: SegmentKind,
    pub(crate) motion_type: MotionType,

    // ── Profile ──
    pub(crate) target: f64,
    pub(crate) progress: f64,
    pub(crate) current_vel: f64,
    pub(crate) req_vel: f64,
    pub(crate) max_vel: f64,
    pub(crate) max_accel: f64,
    pub(crate) feed_override: f64,

    // ── Blending ──
    pub(crate) blend_with_next: bool,
    pub(crate) tolerance: f64,
    pub(crate) blend_vel: f64,
    pub(crate) vel_at_blend_start: f64,
    pub(crate) blending: bool,
    pub(crate) on_final_decel: bool,

    // ── Spindle ──
    pub(crate) sync: SyncMode,
    pub(crate) uu_per_rev: f64,
    /// Cycles spent matching spindle speed; 0 once locked.
    pub(crate) sync_accel: u32,
    pub(crate) atspeed: bool,

    pub(crate) active: bool,
    pub(crate) index_rotary: Option<usize>,
    pub(crate) enables: MotionEnables,
    pub(crate) synced_io: SyncedIo,
}

impl Segment {
    /// Fresh, inactive segment with zero progress and velocity.
    ///
    /// Limits, blend and sync fields are filled in by the command API.
    pub(crate) fn new(id: u32, kind: SegmentKind, motion_type: MotionType) -> Self {
        let target = kind.length();
        Self {
            id,
            kind,
            motion_type,
            target,
            progress: 0.0,
            current_vel: 0.0,
            req_vel: 0.0,
            max_vel: 0.0,
            max_accel: 0.0,
            feed_override: 1.0,
            blend_with_next: false,
            tolerance: 0.0,
            blend_vel: 0.0,
            vel_at_blend_start: 0.0,
            blending: false,
            on_final_decel: false,
            sync: SyncMode::None,
            uu_per_rev: 0.0,
            sync_accel: 0,
            atspeed: false,
            active: false,
            index_rotary: None,
            enables: MotionEnables::default(),
            synced_io: SyncedIo::default(),
        }
    }

    // ── Accessors ──

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> &SegmentKind {
        &self.kind
    }

    #[inline]
    pub fn motion_type(&self) -> MotionType {
        self.motion_type
    }

    #[inline]
    pub fn target(&self) -> f64 {
        self.target
    }

    #[inline]
    pub fn progress(&self) -> f64 {
        self.progress
    }

    #[inline]
    pub fn velocity(&self) -> f64 {
        self.current_vel
    }

    #[inline]
    pub fn requested_velocity(&self) -> f64 {
        self.req_vel
    }

    #[inline]
    pub fn max_velocity(&self) -> f64 {
        self.max_vel
    }

    #[inline]
    pub fn max_acceleration(&self) -> f64 {
        self.max_accel
    }

    #[inline]
    pub fn feed_override(&self) -> f64 {
        self.feed_override
    }

    #[inline]
    pub fn blend_velocity(&self) -> f64 {
        self.blend_vel
    }

    #[inline]
    pub fn blends_with_next(&self) -> bool {
        self.blend_with_next
    }

    #[inline]
    pub fn is_blending(&self) -> bool {
        self.blending
    }

    #[inline]
    pub fn sync_mode(&self) -> SyncMode {
        self.sync
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn enables(&self) -> MotionEnables {
        self.enables
    }

    #[inline]
    pub fn synced_io(&self) -> &SyncedIo {
        &self.synced_io
    }

    pub fn rigid_tap_state(&self) -> Option<RigidTapState> {
        match &self.kind {
            SegmentKind::RigidTap(tap) => Some(tap.state),
            _ => None,
        }
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.progress >= self.target
    }

    #[inline]
    pub(crate) fn is_position_synced(&self) -> bool {
        self.sync == SyncMode::Position
    }

    // ── Geometry ──

    pub fn pose_at(&self, progress: f64) -> Pose {
        match &self.kind {
            SegmentKind::Line(line) => line.pose_at(progress, self.target),
            SegmentKind::Arc(arc) => arc.pose_at(progress, self.target),
            SegmentKind::RigidTap(tap) => tap.pose_at(progress),
        }
    }

    /// Pose at the current progress.
    #[inline]
    pub fn pose(&self) -> Pose {
        self.pose_at(self.progress)
    }

    /// Where this segment is heading.
    pub fn end_pose(&self) -> Pose {
        match &self.kind {
            SegmentKind::RigidTap(tap) => tap.end_pose(),
            _ => self.pose_at(self.target),
        }
    }

    /// Unit XYZ tangent at the start (zero when XYZ does not move).
    pub fn start_tangent(&self) -> Cartesian {
        match &self.kind {
            SegmentKind::Line(line) => line.tangent(),
            SegmentKind::Arc(arc) => arc.start_tangent(),
            SegmentKind::RigidTap(tap) => tap.start_tangent(),
        }
    }

    /// Unit XYZ tangent at the end.
    pub fn end_tangent(&self) -> Cartesian {
        match &self.kind {
            SegmentKind::Line(line) => line.tangent(),
            SegmentKind::Arc(arc) => arc.end_tangent(),
            SegmentKind::RigidTap(tap) => tap.end_tangent(),
        }
    }

    /// Rotary-only lines are exempt from the tool-tip velocity limit.
    pub fn is_angular_only(&self) -> bool {
        matches!(&self.kind, SegmentKind::Line(line) if line.is_angular_only())
    }
}
