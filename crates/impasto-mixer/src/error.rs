use thiserror::Error;

/// Errors of the paint mixing module.
#[derive(Debug, Error)]
pub enum MixerError {
    /// A numeric precondition failed (e.g. weights count does not match
    /// the palette size, or the palette is empty).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A persisted palette did not parse.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// The non-linear optimizer did not converge. Not fatal; callers
    /// use the last-iterate solution.
    #[error("solver failed to converge after {iterations} iterations")]
    SolverFailed { iterations: usize },
}
