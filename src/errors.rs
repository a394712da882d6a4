use std::process::ExitStatus;

use thiserror::Error;

/// Failures that callers are expected to tell apart. Everything else is
/// propagated as a plain `anyhow` error with context.
#[derive(Debug, Error)]
pub enum MagqcError {
    #[error("external command '{program}' failed with {status}")]
    Invocation { program: String, status: ExitStatus },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    EmptyResults(String),
}
