//! Error types for the timer service.

use thiserror::Error;

/// Errors returned when a schedule request is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TimerError {
    /// A single-shot delay was negative, NaN or infinite.
    #[error("invalid delay {0}: must be a finite, non-negative number of seconds")]
    InvalidDelay(f64),

    /// A repeating interval was zero, negative, NaN or infinite.
    #[error("invalid interval {0}: must be a finite, positive number of seconds")]
    InvalidInterval(f64),
}
