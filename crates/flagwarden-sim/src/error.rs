//! Error types for the scenario runner.

use std::path::PathBuf;

use flagwarden_core::TransitionError;
use thiserror::Error;

/// Errors that stop a scenario from running.
#[derive(Debug, Error)]
pub enum SimError {
    /// The scenario file could not be read.
    #[error("cannot read scenario {path}: {source}")]
    Io {
        /// The file.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The scenario is not valid JSON or does not match the schema.
    #[error("malformed scenario: {0}")]
    Parse(#[from] serde_json::Error),

    /// The scenario parsed but describes something unplayable.
    #[error("invalid scenario: {0}")]
    Invalid(String),

    /// The match refused to leave warmup.
    #[error("match did not start: {0}")]
    Start(#[from] TransitionError),
}

/// Result alias for the runner.
pub type Result<T> = std::result::Result<T, SimError>;
