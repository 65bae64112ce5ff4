//! Match-level tests.
//!
//! - `helpers.rs`: a [`Harness`](helpers::Harness) that owns a machine and its
//!   collaborators
//! - `scenarios.rs`: full matches for each variant
//! - `properties.rs`: property tests over random event sequences
//! - `determinism.rs`: identical inputs give identical output

mod determinism;
mod helpers;

pub use helpers::*;
