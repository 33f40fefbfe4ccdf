//! Error type for the alarm engine.

use thiserror::Error;

use crate::alarm::AlarmId;

/// Errors returned by [`AlarmService`](crate::AlarmService) operations.
///
/// A failed lookup never mutates anything. Clock failures are logged with
/// the driver's error before being collapsed into [`ServiceError::Clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServiceError {
    /// No alarm with this id exists.
    #[error("no alarm with id {0}")]
    NotFound(AlarmId),

    /// The alarm table or the schedule is full.
    #[error("alarm capacity exceeded")]
    CapacityExceeded,

    /// The real-time clock reported an error.
    #[error("real-time clock error")]
    Clock,

    /// The audio looper's command queue is full.
    #[error("audio looper command queue full")]
    LooperBusy,
}
