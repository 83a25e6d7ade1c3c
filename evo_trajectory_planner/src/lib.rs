//! # EVO Trajectory Planner Library
//!
//! Real-time execution engine for coordinated nine-axis motion. Producers
//! queue line, arc and rigid-tap segments through the command API; a fixed
//! period cycle consumes them and publishes a commanded pose every tick.
//!
//! ## Cycle Responsibilities
//!
//! 1. **Profile**: discrete trapezoidal velocity along each segment
//! 2. **Blending**: overlap a decelerating segment with its successor
//! 3. **Spindle Sync**: velocity-following and position-locked feed
//! 4. **Rigid Tap**: tap, reverse, retract and re-place in one segment
//! 5. **Synced Outputs**: digital and analog writes at segment start
//!
//! ## Zero-Allocation Cycle
//!
//! The segment queue is allocated once at planner creation. `run_cycle`
//! never allocates and never blocks; all machine interaction goes through
//! the [`io::MachineIo`] seam.

#![deny(clippy::disallowed_types)]

pub mod config;
pub mod cycle;
pub mod io;
pub mod planner;
pub mod program;
pub mod queue;
pub mod segment;
pub mod sim;

pub use planner::PlannerContext;
