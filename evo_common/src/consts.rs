//! System-wide constants for the trajectory planner workspace.
//!
//! Single source of truth for numeric limits and default paths.

use static_assertions::const_assert;

/// Number of coordinated axes (XYZ + ABC + UVW).
pub const NUM_AXES: usize = 9;

/// Default planner cycle time in microseconds (1 kHz = 1000 µs).
pub const CYCLE_TIME_US: u64 = 1000;

/// Minimum accepted cycle time [µs].
pub const CYCLE_TIME_US_MIN: u32 = 50;

/// Maximum accepted cycle time [µs].
pub const CYCLE_TIME_US_MAX: u32 = 100_000;

/// Default segment queue capacity.
pub const QUEUE_SIZE_DEFAULT: usize = 2000;

/// Smallest useful queue: head plus one blend partner.
pub const QUEUE_SIZE_MIN: usize = 2;

/// Largest accepted queue capacity.
pub const QUEUE_SIZE_MAX: usize = 100_000;

/// Digital outputs addressable by motion-synced I/O.
pub const MAX_SYNCED_DIO: usize = 64;

/// Analog outputs addressable by motion-synced I/O.
pub const MAX_SYNCED_AIO: usize = 16;

/// Rotary axes that may carry an unlock (indexer) request.
pub const MAX_ROTARY_AXES: usize = 3;

/// Spindle revolutions of travel a rigid tap may overshoot past its
/// reversal point before the segment runs out of target.
pub const RIGID_TAP_OVERSHOOT_REVS: f64 = 10.0;

const_assert!(QUEUE_SIZE_MIN <= QUEUE_SIZE_DEFAULT);
const_assert!(QUEUE_SIZE_DEFAULT <= QUEUE_SIZE_MAX);
const_assert!(MAX_SYNCED_DIO <= 64);
const_assert!(MAX_ROTARY_AXES <= NUM_AXES);
