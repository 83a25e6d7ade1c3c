//! Planner mode and segment state enums.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::error::TpError;

// ─── Termination Condition ──────────────────────────────────────────

/// How a segment hands over to its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum TermCond {
    /// Exact stop at the segment end.
    Stop = 1,
    /// Overlap the end of this segment with the start of the next.
    #[default]
    Blend = 2,
}

impl TermCond {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Stop),
            2 => Some(Self::Blend),
            _ => None,
        }
    }
}

impl TryFrom<u8> for TermCond {
    type Error = TpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or(TpError::InvalidArgument("unknown termination condition"))
    }
}

// ─── Spindle Synchronization ────────────────────────────────────────

/// Spindle coupling applied to newly queued segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Free-running feed.
    #[default]
    None,
    /// Feed rate proportional to spindle speed.
    Velocity,
    /// Progress locked to spindle angle (threading, tapping).
    Position,
}

impl SyncMode {
    #[inline]
    pub const fn is_synced(self) -> bool {
        !matches!(self, Self::None)
    }
}

// ─── Motion Type ────────────────────────────────────────────────────

/// Canonical motion tag reported while a segment executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MotionType {
    Traverse = 1,
    #[default]
    Feed = 2,
    Arc = 3,
    ToolChange = 4,
    Probing = 5,
    IndexRotary = 6,
}

impl MotionType {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Traverse),
            2 => Some(Self::Feed),
            3 => Some(Self::Arc),
            4 => Some(Self::ToolChange),
            5 => Some(Self::Probing),
            6 => Some(Self::IndexRotary),
            _ => None,
        }
    }
}

// ─── Rigid Tap ──────────────────────────────────────────────────────

/// Rigid-tap cycle phase.
///
/// Ordering follows execution order; every phase after `Reversing` runs
/// along the auxiliary return line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RigidTapState {
    Tapping = 0,
    Reversing = 1,
    Retraction = 2,
    FinalReversal = 3,
    FinalPlacement = 4,
}

impl RigidTapState {
    /// True once the tap follows its auxiliary return line.
    #[inline]
    pub const fn on_return_path(self) -> bool {
        matches!(
            self,
            Self::Retraction | Self::FinalReversal | Self::FinalPlacement
        )
    }
}

// ─── Motion Enables ─────────────────────────────────────────────────

bitflags! {
    /// Override/hold permissions carried by each segment.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MotionEnables: u8 {
        const FEED_OVERRIDE    = 0x01;
        const SPINDLE_OVERRIDE = 0x02;
        const ADAPTIVE_FEED    = 0x04;
        const FEED_HOLD        = 0x08;
    }
}

impl Default for MotionEnables {
    fn default() -> Self {
        Self::FEED_OVERRIDE | Self::SPINDLE_OVERRIDE | Self::FEED_HOLD
    }
}
