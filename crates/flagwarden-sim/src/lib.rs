//! # Flagwarden Sim
//!
//! Headless driver for the Flagwarden match engine.
//!
//! - [`scenario`]: scripted matches loaded from JSON, played at a fixed tick
//!   rate into a [`MatchReport`]
//! - [`autoplay`]: seeded random matches, batched across threads
//! - [`logging`]: subscriber setup for the `flagwarden-sim` binary

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod autoplay;
pub mod error;
pub mod logging;
pub mod report;
pub mod scenario;

pub use autoplay::{autoplay, autoplay_with, run_batch, AutoplayResult, BatchSummary};
pub use error::{Result, SimError};
pub use logging::{init_logging, LogFormat};
pub use report::{MatchReport, RejectedEvent};
pub use scenario::{run_scenario, BaseSpec, PlayerSpec, Scenario, TimedEvent};
