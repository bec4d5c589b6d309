//! Harness error types.

use thiserror::Error;

/// Harness-level failures.
///
/// Transport and tool failures never show up here: they become failed
/// [`TestRecord`](crate::TestRecord)s and the run carries on. These are the
/// errors that stop a run before or between scenarios.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The table prefix would not produce a valid unquoted identifier.
    #[error("invalid table prefix '{0}': use letters, digits and '_', not starting with a digit")]
    InvalidTablePrefix(String),

    /// Starting or talking to the server failed outside a scenario.
    #[error(transparent)]
    Mcp(#[from] mcp::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Render an error followed by its `source()` chain, outermost first.
///
/// Sources whose message is already part of the output are skipped, since
/// many error types repeat their source in their own message.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let message = cause.to_string();
        if !out.contains(&message) {
            out.push_str(": ");
            out.push_str(&message);
        }
        source = cause.source();
    }
    out
}
