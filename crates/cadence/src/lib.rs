//! # Cadence
//!
//! Deterministic, single-threaded timer service for tick-driven simulations.
//!
//! Cadence lets a simulation say "deliver this payload after N seconds" or
//! "deliver this payload every N seconds until cancelled" without owning any
//! threads or wall-clock time. Time only moves when the owner calls
//! [`TimerService::advance`], and everything that became due is handed back
//! in a deterministic order.
//!
//! - **At-most-once delivery**: a single-shot entry is removed before it is
//!   returned, so it can never fire twice
//! - **Cancellation by handle**: every schedule returns a [`TimerHandle`]
//! - **Deterministic ordering**: entries fire by due time, then by handle
//! - **No business logic**: payloads are opaque; validity checks belong to
//!   the caller
//!
//! ## Quick Start
//!
//! ```
//! use cadence::TimerService;
//!
//! let mut timers = TimerService::new();
//! let once = timers.schedule_once(1.5, "halftime over").unwrap();
//! let _tick = timers.schedule_repeating(1.0, "countdown").unwrap();
//!
//! let fired = timers.advance(1.0);
//! assert_eq!(fired.len(), 1);
//! assert_eq!(fired[0].payload, "countdown");
//!
//! let fired = timers.advance(1.0);
//! let payloads: Vec<_> = fired.iter().map(|f| f.payload).collect();
//! assert_eq!(payloads, vec!["halftime over", "countdown"]);
//! assert!(!timers.is_scheduled(once));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handle;
pub mod service;

// Re-exports for convenience
pub use error::TimerError;
pub use handle::TimerHandle;
pub use service::{Fired, Schedule, TimerService};

/// Tolerance used when comparing accumulated time against due times.
///
/// Simulations usually advance by fixed fractional steps (0.1 s, 1/60 s),
/// which do not sum exactly in binary floating point.
pub const TIME_EPSILON: f64 = 1e-9;
