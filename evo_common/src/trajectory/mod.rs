//! Trajectory planner shared types.
//!
//! Shared between the planner core, its configuration loader and any
//! producer that builds motion requests (program files, interpreters).

pub mod command;
pub mod config;
pub mod error;
pub mod pose;
pub mod state;
