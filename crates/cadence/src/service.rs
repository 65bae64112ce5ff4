//! The timer service.
//!
//! [`TimerService`] keeps every pending entry in a `BTreeMap` keyed by
//! [`TimerHandle`], so iteration order never depends on hashing. Time is an
//! accumulated number of seconds that only moves inside
//! [`TimerService::advance`].
//!
//! # Delivery rules
//!
//! - Entries whose due time is reached during an `advance` call are returned
//!   sorted by (due time, handle).
//! - Single-shot entries are removed before they are returned.
//! - Repeating entries fire at most once per `advance` call and are re-armed
//!   one interval after their previous due time. A caller that advances by
//!   more than one interval at a time sees the backlog drained one firing per
//!   call rather than in a burst.
//! - A cancelled entry never fires, even if it was due in the same `advance`
//!   call in which a previously delivered payload caused the cancellation;
//!   callers that cancel while iterating the returned batch must re-validate
//!   each remaining entry themselves.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::TimerError;
use crate::handle::TimerHandle;
use crate::TIME_EPSILON;

// =============================================================================
// Schedule
// =============================================================================

/// How an entry recurs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Schedule {
    /// Fires once, then is removed.
    Once,
    /// Fires every `interval` seconds until cancelled.
    Repeating {
        /// Seconds between firings.
        interval: f64,
    },
}

impl Schedule {
    /// Returns true for repeating schedules.
    #[must_use]
    pub const fn is_repeating(&self) -> bool {
        matches!(self, Self::Repeating { .. })
    }
}

// =============================================================================
// Fired
// =============================================================================

/// A payload delivered by [`TimerService::advance`].
#[derive(Debug, Clone, PartialEq)]
pub struct Fired<T> {
    /// Handle of the entry that fired.
    pub handle: TimerHandle,
    /// Time (in service seconds) at which the entry was due.
    pub due: f64,
    /// The entry's schedule.
    pub schedule: Schedule,
    /// The scheduled payload.
    pub payload: T,
}

// =============================================================================
// TimerService
// =============================================================================

#[derive(Debug, Clone)]
struct Entry<T> {
    due: f64,
    schedule: Schedule,
    payload: T,
}

/// Cooperative scheduler for delayed and repeating payloads.
///
/// `TimerService` is deliberately ignorant of what its payloads mean. The
/// owner decides what to do with each [`Fired`] entry, including whether the
/// entry is still relevant.
///
/// # Example
///
/// ```
/// use cadence::TimerService;
///
/// let mut timers = TimerService::new();
/// let handle = timers.schedule_once(2.0, 42_u32).unwrap();
/// assert!(timers.advance(1.0).is_empty());
/// assert!(timers.cancel(handle));
/// assert!(timers.advance(5.0).is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct TimerService<T> {
    /// Accumulated service time in seconds.
    now: f64,
    /// Monotonically increasing handle counter.
    next_handle: u64,
    /// Pending entries in deterministic order.
    entries: BTreeMap<TimerHandle, Entry<T>>,
}

impl<T> Default for TimerService<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerService<T> {
    /// Creates an empty service at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: 0.0,
            next_handle: 0,
            entries: BTreeMap::new(),
        }
    }

    /// Returns the accumulated service time in seconds.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Schedules `payload` to fire once after `delay` seconds.
    ///
    /// A delay of zero fires on the next [`advance`](Self::advance) call.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidDelay`] if `delay` is negative or not finite.
    pub fn schedule_once(&mut self, delay: f64, payload: T) -> Result<TimerHandle, TimerError> {
        if !delay.is_finite() || delay < 0.0 {
            return Err(TimerError::InvalidDelay(delay));
        }
        Ok(self.insert(delay, Schedule::Once, payload))
    }

    /// Schedules `payload` to fire every `interval` seconds, first after one
    /// interval.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidInterval`] if `interval` is not a finite
    /// positive number.
    pub fn schedule_repeating(
        &mut self,
        interval: f64,
        payload: T,
    ) -> Result<TimerHandle, TimerError> {
        if !interval.is_finite() || interval <= 0.0 {
            return Err(TimerError::InvalidInterval(interval));
        }
        Ok(self.insert(interval, Schedule::Repeating { interval }, payload))
    }

    fn insert(&mut self, delay: f64, schedule: Schedule, payload: T) -> TimerHandle {
        let handle = TimerHandle::new(self.next_handle);
        self.next_handle += 1;
        let due = self.now + delay;
        trace!(%handle, due, ?schedule, "timer scheduled");
        self.entries.insert(
            handle,
            Entry {
                due,
                schedule,
                payload,
            },
        );
        handle
    }

    /// Cancels a pending entry.
    ///
    /// Returns true if the entry existed. Cancelling an unknown or already
    /// fired single-shot handle is harmless.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let removed = self.entries.remove(&handle).is_some();
        if removed {
            trace!(%handle, "timer cancelled");
        }
        removed
    }

    /// Cancels every entry whose payload matches `predicate`.
    ///
    /// Returns the number of cancelled entries.
    pub fn cancel_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !predicate(&entry.payload));
        let cancelled = before - self.entries.len();
        if cancelled > 0 {
            debug!(cancelled, "timers cancelled by predicate");
        }
        cancelled
    }

    /// Cancels every pending entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns true if `handle` refers to a pending entry.
    #[must_use]
    pub fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Returns the seconds left until `handle` next fires.
    #[must_use]
    pub fn remaining(&self, handle: TimerHandle) -> Option<f64> {
        self.entries
            .get(&handle)
            .map(|entry| (entry.due - self.now).max(0.0))
    }

    /// Returns the payload of a pending entry.
    #[must_use]
    pub fn payload(&self, handle: TimerHandle) -> Option<&T> {
        self.entries.get(&handle).map(|entry| &entry.payload)
    }

    /// Returns the number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> TimerService<T> {
    /// Advances service time by `dt` seconds and returns everything that
    /// became due, ordered by (due time, handle).
    ///
    /// Negative or non-finite steps are ignored.
    pub fn advance(&mut self, dt: f64) -> Vec<Fired<T>> {
        if !dt.is_finite() || dt < 0.0 {
            debug!(dt, "ignoring invalid timer step");
            return Vec::new();
        }
        self.now += dt;
        let horizon = self.now + TIME_EPSILON;

        let mut due: Vec<(f64, TimerHandle)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.due <= horizon)
            .map(|(handle, entry)| (entry.due, *handle))
            .collect();
        due.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut fired = Vec::with_capacity(due.len());
        for (_, handle) in due {
            match self.entries.get(&handle).map(|entry| entry.schedule) {
                Some(Schedule::Once) => {
                    if let Some(entry) = self.entries.remove(&handle) {
                        fired.push(Fired {
                            handle,
                            due: entry.due,
                            schedule: entry.schedule,
                            payload: entry.payload,
                        });
                    }
                }
                Some(Schedule::Repeating { interval }) => {
                    if let Some(entry) = self.entries.get_mut(&handle) {
                        let was_due = entry.due;
                        entry.due += interval;
                        fired.push(Fired {
                            handle,
                            due: was_due,
                            schedule: entry.schedule,
                            payload: entry.payload.clone(),
                        });
                    }
                }
                None => {}
            }
        }
        fired
    }
}
