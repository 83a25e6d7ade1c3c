//! Command API error type.

use thiserror::Error;

/// Error returned synchronously by planner commands.
///
/// A rejected command leaves the planner untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TpError {
    /// Parameter out of range (non-positive velocity, bad index, zero normal).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The segment queue has no free slot. Retry after the consumer drains.
    #[error("segment queue full ({capacity} segments)")]
    QueueFull {
        /// Queue capacity fixed at planner creation.
        capacity: usize,
    },

    /// Synchronized motion requested while spindle synchronization is off.
    #[error("synchronized motion requested while spindle sync is off")]
    SynchronizationRejected,

    /// New motion refused until the running abort has drained the queue.
    #[error("planner is aborting")]
    Aborting,
}

impl TpError {
    /// Whether retrying the same command later can succeed.
    #[inline]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::QueueFull { .. } | Self::Aborting)
    }
}
