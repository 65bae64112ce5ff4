//! The match clock collaborator.

use serde::{Deserialize, Serialize};

/// Remaining-time clock for the live part of a match.
///
/// The engine sets the clock at the start of every half, round and overtime
/// period, pauses it outside live play and polls [`Clock::advance`] once per
/// tick.
pub trait Clock {
    /// Seconds left, never negative.
    fn remaining(&self) -> f64;

    /// Sets the seconds left. Re-arms the zero crossing.
    fn set_remaining(&mut self, seconds: f64);

    /// Stops the countdown.
    fn pause(&mut self);

    /// Restarts the countdown.
    fn resume(&mut self);

    /// Returns true while stopped.
    fn is_paused(&self) -> bool;

    /// Counts down by `dt` seconds.
    ///
    /// Returns true exactly once: on the call during which the remaining time
    /// reaches zero.
    fn advance(&mut self, dt: f64) -> bool;
}

/// Reference [`Clock`].
///
/// # Example
///
/// ```
/// use flagwarden_core::clock::{Clock, GameClock};
///
/// let mut clock = GameClock::new();
/// clock.set_remaining(1.0);
/// clock.resume();
/// assert!(!clock.advance(0.5));
/// assert!(clock.advance(0.5));
/// assert!(!clock.advance(0.5));
/// assert_eq!(clock.remaining(), 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameClock {
    remaining: f64,
    paused: bool,
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl GameClock {
    /// Creates a paused clock at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            remaining: 0.0,
            paused: true,
        }
    }
}

impl Clock for GameClock {
    fn remaining(&self) -> f64 {
        self.remaining
    }

    fn set_remaining(&mut self, seconds: f64) {
        self.remaining = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn advance(&mut self, dt: f64) -> bool {
        if self.paused || self.remaining <= 0.0 || !dt.is_finite() || dt <= 0.0 {
            return false;
        }
        self.remaining -= dt;
        if self.remaining <= cadence::TIME_EPSILON {
            self.remaining = 0.0;
            return true;
        }
        false
    }
}
