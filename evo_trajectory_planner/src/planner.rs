//! Planner context: the segment queue plus everything the cycle driver
//! remembers between cycles.
//!
//! The context holds both halves of the segment ring. The command API
//! ([`command`]) only touches the [`SegmentProducer`]; [`PlannerContext::run_cycle`]
//! ([`run`]) only touches the [`SegmentConsumer`]. The ring itself is
//! lock-free across threads; the rest of the planner state belongs to
//! whoever owns the context, so commands and cycles on one context are
//! issued from one place.

pub mod blend;
pub mod command;
pub mod profile;
pub mod rigid_tap;
pub mod run;
pub mod sync;

use evo_common::consts::CYCLE_TIME_US;
use evo_common::trajectory::config::{
    MAX_ACCELERATION_DEFAULT, MAX_VELOCITY_DEFAULT, PlannerConfig, VELOCITY_LIMIT_DEFAULT,
};
use evo_common::trajectory::error::TpError;
use evo_common::trajectory::pose::Pose;
use evo_common::trajectory::state::{MotionType, SyncMode, TermCond};

use crate::io::SyncedIo;
use crate::queue::{SegmentConsumer, SegmentProducer, segment_queue};
use crate::segment::Segment;

use self::sync::SpindleSync;

/// Planner state outside the queue.
#[derive(Debug)]
pub(crate) struct PlannerState {
    /// Cycle period [s].
    pub(crate) cycle_time: f64,
    pub(crate) v_max: f64,
    pub(crate) v_limit: f64,
    pub(crate) a_max: f64,
    pub(crate) v_scale: f64,

    pub(crate) term_cond: TermCond,
    pub(crate) tolerance: f64,

    pub(crate) current_pos: Pose,
    /// End of the last queued move; start of the next one.
    pub(crate) goal_pos: Pose,

    pub(crate) sync_mode: SyncMode,
    pub(crate) uu_per_rev: f64,

    pub(crate) paused: bool,
    pub(crate) aborting: bool,
    pub(crate) done: bool,

    pub(crate) next_id: u32,
    pub(crate) exec_id: u32,
    pub(crate) motion_type: Option<MotionType>,
    pub(crate) active_depth: usize,

    pub(crate) spindle: SpindleSync,
    /// Output changes waiting for the next enqueued segment.
    pub(crate) pending_io: SyncedIo,
}

impl PlannerState {
    fn new() -> Self {
        Self {
            cycle_time: CYCLE_TIME_US as f64 * 1.0e-6,
            v_max: MAX_VELOCITY_DEFAULT,
            v_limit: VELOCITY_LIMIT_DEFAULT,
            a_max: MAX_ACCELERATION_DEFAULT,
            v_scale: 1.0,
            term_cond: TermCond::Blend,
            tolerance: 0.0,
            current_pos: Pose::ZERO,
            goal_pos: Pose::ZERO,
            sync_mode: SyncMode::None,
            uu_per_rev: 0.0,
            paused: false,
            aborting: false,
            done: true,
            next_id: 1,
            exec_id: 0,
            motion_type: None,
            active_depth: 0,
            spindle: SpindleSync::default(),
            pending_io: SyncedIo::default(),
        }
    }
}

/// Trajectory planner instance.
#[derive(Debug)]
pub struct PlannerContext {
    pub(crate) producer: SegmentProducer,
    pub(crate) consumer: SegmentConsumer,
    pub(crate) state: PlannerState,
}

impl PlannerContext {
    /// Create a planner with room for `queue_size` segments.
    ///
    /// All queue memory is allocated here; nothing allocates afterwards.
    pub fn new(queue_size: usize) -> Result<Self, TpError> {
        let (producer, consumer) = segment_queue(queue_size)?;
        Ok(Self {
            producer,
            consumer,
            state: PlannerState::new(),
        })
    }

    /// Create a planner and apply the configured limits.
    pub fn from_config(config: &PlannerConfig) -> Result<Self, TpError> {
        let mut planner = Self::new(config.queue_size)?;
        planner.set_cycle_time(config.cycle_time_s())?;
        planner.set_vmax(config.max_velocity)?;
        planner.set_vlimit(config.velocity_limit)?;
        planner.set_amax(config.max_acceleration)?;
        planner.set_vscale(config.velocity_scale)?;
        planner.set_term_cond(config.term_cond, config.tolerance)?;
        Ok(planner)
    }

    // ─── Queries ────────────────────────────────────────────────────

    /// Commanded position after the last cycle.
    #[inline]
    pub fn position(&self) -> Pose {
        self.state.current_pos
    }

    /// End point of the last queued move.
    #[inline]
    pub fn goal(&self) -> Pose {
        self.state.goal_pos
    }

    /// Id of the segment currently reported (0 when idle).
    #[inline]
    pub fn exec_id(&self) -> u32 {
        self.state.exec_id
    }

    /// Id the next enqueued segment will get.
    #[inline]
    pub fn next_id(&self) -> u32 {
        self.state.next_id
    }

    #[inline]
    pub fn motion_type(&self) -> Option<MotionType> {
        self.state.motion_type
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.state.done
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    #[inline]
    pub fn is_aborting(&self) -> bool {
        self.state.aborting
    }

    #[inline]
    pub fn queue_depth(&self) -> usize {
        self.consumer.len()
    }

    #[inline]
    pub fn queue_capacity(&self) -> usize {
        self.producer.capacity()
    }

    #[inline]
    pub fn active_depth(&self) -> usize {
        self.state.active_depth
    }

    #[inline]
    pub fn sync_mode(&self) -> SyncMode {
        self.state.sync_mode
    }

    /// Whether the spindle index has been seen and position sync is locked.
    #[inline]
    pub fn spindle_locked(&self) -> bool {
        self.state.spindle.locked
    }

    #[inline]
    pub fn term_cond(&self) -> (TermCond, f64) {
        (self.state.term_cond, self.state.tolerance)
    }

    /// Cycle period [s].
    #[inline]
    pub fn cycle_time(&self) -> f64 {
        self.state.cycle_time
    }

    /// Queued segment `offset` places behind the head.
    #[inline]
    pub fn peek(&self, offset: usize) -> Option<&Segment> {
        self.consumer.peek(offset)
    }

    /// Output changes that will ride on the next enqueued segment.
    #[inline]
    pub fn pending_io(&self) -> &SyncedIo {
        &self.state.pending_io
    }
}
