//! Error types shared by the scheduler interfaces and the orchestrator

use thiserror::Error;

/// Failures with a domain meaning. Everything else travels as `anyhow::Error`
/// with context attached at the call site.
#[derive(Debug, Error)]
pub enum NodetestError {
    /// The batch-system selector did not name a supported scheduler
    #[error("{0} is not a known batch system (expected LSF or PBS)")]
    UnknownBatchSystem(String),

    /// A scheduler command exited non-zero
    #[error("{command} failed with return code {return_code}: {stderr}")]
    CommandFailed {
        command: String,
        return_code: i32,
        stderr: String,
    },

    /// The scheduler accepted a submission but its response had no job id
    #[error("could not parse a job id from scheduler output: {0:?}")]
    JobIdParse(String),

    /// Hold release was requested from a scheduler without hold support
    #[error("{0} does not support held submissions")]
    HoldsUnsupported(String),
}
