//! TOML configuration and program loading with validation.
//!
//! The runner reads two files: the planner configuration
//! ([`TrajectoryConfig`]) and a motion [`Program`]. Both are parsed through
//! [`ConfigLoader`] and checked here before any planner is built.

use std::path::Path;

use evo_common::config::{ConfigError, ConfigLoader};
use evo_common::trajectory::config::{TrajectoryConfig, VELOCITY_SCALE_MAX};
use tracing::{debug, warn};

use crate::program::{Program, ProgramStep};

// ─── Loading Functions ──────────────────────────────────────────────

/// Load and validate the planner configuration.
pub fn load_config(path: &Path) -> Result<TrajectoryConfig, ConfigError> {
    let config = TrajectoryConfig::load(path)?;
    config.validate()?;
    debug!(path = %path.display(), service = %config.shared.service_name, "config loaded");
    Ok(config)
}

/// Parse and validate a configuration held in memory.
pub fn load_config_from_str(content: &str) -> Result<TrajectoryConfig, ConfigError> {
    let config = TrajectoryConfig::load_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load and validate a motion program.
pub fn load_program(path: &Path) -> Result<Program, ConfigError> {
    let mut program = Program::load(path)?;
    if program.name.is_empty() {
        program.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
    validate_program(&program)?;
    Ok(program)
}

// ─── Validation ─────────────────────────────────────────────────────

/// Reject steps whose machine-side values cannot be applied.
///
/// Motion parameters are left to the planner, which rejects them on
/// enqueue with the step index attached.
pub fn validate_program(program: &Program) -> Result<(), ConfigError> {
    if program.steps.is_empty() {
        warn!(name = %program.name, "program has no steps");
    }
    for (i, step) in program.steps.iter().enumerate() {
        match *step {
            ProgramStep::Spindle { rps } if !rps.is_finite() => {
                return Err(ConfigError::ValidationError(format!(
                    "step {i}: spindle speed must be finite"
                )));
            }
            ProgramStep::FeedScale { scale } if !(0.0..=VELOCITY_SCALE_MAX).contains(&scale) => {
                return Err(ConfigError::ValidationError(format!(
                    "step {i}: feed scale {scale} out of range [0, {VELOCITY_SCALE_MAX}]"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────
