//! EVO Common Library
//!
//! Shared constants, configuration loading and trajectory types for the
//! EVO trajectory planner workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Numeric limits and default paths
//! - [`config`] - Configuration loading traits and types
//! - [`trajectory`] - Poses, motion requests, planner enums and errors
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use evo_common::prelude::*;
//!
//! let end = Pose::xyz(10.0, 0.0, 0.0);
//! let line = LineRequest::feed(end, 5.0, 50.0);
//! assert_eq!(line.motion_type, MotionType::Feed);
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
pub mod trajectory;
