//! Timer handles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for a scheduled entry.
///
/// Handles are assigned monotonically by a [`TimerService`](crate::TimerService)
/// and are never reused within one service, so a stale handle can only ever
/// refer to an entry that no longer exists.
///
/// # Example
///
/// ```
/// use cadence::TimerService;
///
/// let mut timers = TimerService::new();
/// let a = timers.schedule_once(1.0, ()).unwrap();
/// let b = timers.schedule_once(1.0, ()).unwrap();
/// assert!(a < b);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Creates a handle from a raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value of this handle.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimerHandle({})", self.0)
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_order_by_raw_value() {
        assert!(TimerHandle::new(1) < TimerHandle::new(2));
        assert_eq!(TimerHandle::new(7).as_u64(), 7);
    }

    #[test]
    fn display_and_debug() {
        let handle = TimerHandle::new(3);
        assert_eq!(handle.to_string(), "#3");
        assert_eq!(format!("{handle:?}"), "TimerHandle(3)");
    }
}
