//! Prelude module for common re-exports.
//!
//! `use evo_common::prelude::*;` brings in the types most planner code
//! touches without listing individual paths.

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::trajectory::config::{PlannerConfig, SimulationConfig, TrajectoryConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{CYCLE_TIME_US, MAX_SYNCED_AIO, MAX_SYNCED_DIO, NUM_AXES};

// ─── Trajectory ─────────────────────────────────────────────────────
pub use crate::trajectory::command::{ArcRequest, LineRequest, RigidTapRequest};
pub use crate::trajectory::error::TpError;
pub use crate::trajectory::pose::{Cartesian, Pose};
pub use crate::trajectory::state::{MotionEnables, MotionType, RigidTapState, SyncMode, TermCond};
