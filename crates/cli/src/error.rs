//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration is invalid or could not be read.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred in the harness before or during the run.
    #[error(transparent)]
    Harness(#[from] harness::Error),

    /// The run finished but left regressions behind (`--strict`).
    #[error("{0} regression(s) found")]
    Regressions(usize),

    /// The run was cut short by a harness-level failure.
    #[error("run aborted after {completed} scenario(s)")]
    Aborted {
        completed: usize,
        #[source]
        source: harness::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
