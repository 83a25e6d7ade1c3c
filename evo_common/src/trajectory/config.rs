//! Planner and simulation configuration.
//!
//! All config types use `serde::Deserialize` for TOML loading. Numeric
//! parameters have const `MIN`/`MAX` bounds checked by `validate()`.
//! Every field has a serde default so a file may omit whole sections.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{
    CYCLE_TIME_US, CYCLE_TIME_US_MAX, CYCLE_TIME_US_MIN, MAX_ROTARY_AXES, QUEUE_SIZE_DEFAULT,
    QUEUE_SIZE_MAX, QUEUE_SIZE_MIN,
};

use super::pose::Pose;
use super::state::TermCond;

pub const MAX_VELOCITY_DEFAULT: f64 = 100.0;
pub const VELOCITY_LIMIT_DEFAULT: f64 = 200.0;
pub const MAX_ACCELERATION_DEFAULT: f64 = 1000.0;
/// Upper bound for any configured velocity [units/s].
pub const VELOCITY_MAX: f64 = 1.0e5;
/// Upper bound for any configured acceleration [units/s²].
pub const ACCELERATION_MAX: f64 = 1.0e7;
pub const VELOCITY_SCALE_MAX: f64 = 10.0;
pub const TOLERANCE_MAX: f64 = 100.0;

pub const SPINDLE_ACCEL_DEFAULT: f64 = 100.0;
pub const SPINDLE_ACCEL_MIN: f64 = 0.1;
pub const SPINDLE_ACCEL_MAX: f64 = 1.0e5;
pub const AT_SPEED_TOLERANCE_DEFAULT: f64 = 0.02;
pub const ROTARY_UNLOCK_CYCLES_DEFAULT: u32 = 10;
pub const ROTARY_UNLOCK_CYCLES_MAX: u32 = 100_000;
pub const MAX_CYCLES_DEFAULT: u64 = 600_000;

// ─── Top-Level Config ───────────────────────────────────────────────

/// Complete configuration file for a planner process.
///
/// ```toml
/// [shared]
/// service_name = "evo-tp-sim"
///
/// [planner]
/// cycle_time_us = 1000
/// max_acceleration = 500.0
///
/// [simulation]
/// spindle_accel = 200.0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryConfig {
    pub shared: SharedConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl TrajectoryConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.planner
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("[planner] {e}")))?;
        self.simulation
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("[simulation] {e}")))?;
        Ok(())
    }
}

// ─── Planner ────────────────────────────────────────────────────────

/// Planner limits and defaults applied at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Cycle period in microseconds (default: 1000 = 1ms).
    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u32,

    /// Segment queue capacity (default: 2000).
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// Trajectory velocity ceiling for every segment [units/s].
    #[serde(default = "default_max_velocity")]
    pub max_velocity: f64,

    /// Absolute tool-tip velocity limit [units/s].
    #[serde(default = "default_velocity_limit")]
    pub velocity_limit: f64,

    /// Acceleration ceiling for every segment [units/s²].
    #[serde(default = "default_max_acceleration")]
    pub max_acceleration: f64,

    /// Multiplier applied on top of the machine feed scale.
    #[serde(default = "default_velocity_scale")]
    pub velocity_scale: f64,

    /// Termination condition for new segments.
    #[serde(default)]
    pub term_cond: TermCond,

    /// Blend path tolerance; 0 disables the corner-deviation bound.
    #[serde(default)]
    pub tolerance: f64,
}

fn default_cycle_time_us() -> u32 {
    CYCLE_TIME_US as u32
}
fn default_queue_size() -> usize {
    QUEUE_SIZE_DEFAULT
}
fn default_max_velocity() -> f64 {
    MAX_VELOCITY_DEFAULT
}
fn default_velocity_limit() -> f64 {
    VELOCITY_LIMIT_DEFAULT
}
fn default_max_acceleration() -> f64 {
    MAX_ACCELERATION_DEFAULT
}
fn default_velocity_scale() -> f64 {
    1.0
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: default_cycle_time_us(),
            queue_size: default_queue_size(),
            max_velocity: default_max_velocity(),
            velocity_limit: default_velocity_limit(),
            max_acceleration: default_max_acceleration(),
            velocity_scale: default_velocity_scale(),
            term_cond: TermCond::default(),
            tolerance: 0.0,
        }
    }
}

impl PlannerConfig {
    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.cycle_time_us < CYCLE_TIME_US_MIN || self.cycle_time_us > CYCLE_TIME_US_MAX {
            return Err(format!(
                "cycle_time_us {} out of range [{}, {}]",
                self.cycle_time_us, CYCLE_TIME_US_MIN, CYCLE_TIME_US_MAX
            ));
        }
        if self.queue_size < QUEUE_SIZE_MIN || self.queue_size > QUEUE_SIZE_MAX {
            return Err(format!(
                "queue_size {} out of range [{}, {}]",
                self.queue_size, QUEUE_SIZE_MIN, QUEUE_SIZE_MAX
            ));
        }
        check_positive("max_velocity", self.max_velocity, VELOCITY_MAX)?;
        check_positive("velocity_limit", self.velocity_limit, VELOCITY_MAX)?;
        check_positive("max_acceleration", self.max_acceleration, ACCELERATION_MAX)?;
        if !(0.0..=VELOCITY_SCALE_MAX).contains(&self.velocity_scale) {
            return Err(format!(
                "velocity_scale {} out of range [0, {}]",
                self.velocity_scale, VELOCITY_SCALE_MAX
            ));
        }
        if !(0.0..=TOLERANCE_MAX).contains(&self.tolerance) {
            return Err(format!(
                "tolerance {} out of range [0, {}]",
                self.tolerance, TOLERANCE_MAX
            ));
        }
        Ok(())
    }

    /// Cycle period in seconds.
    #[inline]
    pub fn cycle_time_s(&self) -> f64 {
        self.cycle_time_us as f64 * 1.0e-6
    }
}

fn check_positive(name: &str, value: f64, max: f64) -> Result<(), String> {
    if !(value > 0.0 && value <= max) {
        return Err(format!("{name} {value} out of range (0, {max}]"));
    }
    Ok(())
}

// ─── Simulation ─────────────────────────────────────────────────────

/// Simulated machine used by the standalone runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Spindle acceleration [rev/s²].
    #[serde(default = "default_spindle_accel")]
    pub spindle_accel: f64,

    /// Relative speed error still reported as at-speed.
    #[serde(default = "default_at_speed_tolerance")]
    pub at_speed_tolerance: f64,

    /// Cycles a rotary indexer needs to unlock or lock.
    #[serde(default = "default_rotary_unlock_cycles")]
    pub rotary_unlock_cycles: u32,

    /// Rotary axes fitted with an indexer.
    #[serde(default = "default_rotary_axes")]
    pub rotary_axes: usize,

    /// Machine feed scale fed to the planner each cycle.
    #[serde(default = "default_velocity_scale")]
    pub feed_scale: f64,

    /// Safety stop for a run that never drains [cycles].
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u64,

    /// Pose the planner starts from.
    #[serde(default)]
    pub initial_position: Pose,
}

fn default_spindle_accel() -> f64 {
    SPINDLE_ACCEL_DEFAULT
}
fn default_at_speed_tolerance() -> f64 {
    AT_SPEED_TOLERANCE_DEFAULT
}
fn default_rotary_unlock_cycles() -> u32 {
    ROTARY_UNLOCK_CYCLES_DEFAULT
}
fn default_rotary_axes() -> usize {
    MAX_ROTARY_AXES
}
fn default_max_cycles() -> u64 {
    MAX_CYCLES_DEFAULT
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            spindle_accel: default_spindle_accel(),
            at_speed_tolerance: default_at_speed_tolerance(),
            rotary_unlock_cycles: default_rotary_unlock_cycles(),
            rotary_axes: default_rotary_axes(),
            feed_scale: default_velocity_scale(),
            max_cycles: default_max_cycles(),
            initial_position: Pose::ZERO,
        }
    }
}

impl SimulationConfig {
    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), String> {
        if !(SPINDLE_ACCEL_MIN..=SPINDLE_ACCEL_MAX).contains(&self.spindle_accel) {
            return Err(format!(
                "spindle_accel {} out of range [{}, {}]",
                self.spindle_accel, SPINDLE_ACCEL_MIN, SPINDLE_ACCEL_MAX
            ));
        }
        if !(0.0..1.0).contains(&self.at_speed_tolerance) {
            return Err(format!(
                "at_speed_tolerance {} out of range [0, 1)",
                self.at_speed_tolerance
            ));
        }
        if self.rotary_unlock_cycles > ROTARY_UNLOCK_CYCLES_MAX {
            return Err(format!(
                "rotary_unlock_cycles {} exceeds {}",
                self.rotary_unlock_cycles, ROTARY_UNLOCK_CYCLES_MAX
            ));
        }
        if self.rotary_axes > MAX_ROTARY_AXES {
            return Err(format!(
                "rotary_axes {} exceeds {}",
                self.rotary_axes, MAX_ROTARY_AXES
            ));
        }
        if !(0.0..=VELOCITY_SCALE_MAX).contains(&self.feed_scale) {
            return Err(format!(
                "feed_scale {} out of range [0, {}]",
                self.feed_scale, VELOCITY_SCALE_MAX
            ));
        }
        if self.max_cycles == 0 {
            return Err("max_cycles must be positive".to_string());
        }
        Ok(())
    }
}
