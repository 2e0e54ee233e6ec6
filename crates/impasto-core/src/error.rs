use thiserror::Error;

/// Errors raised by the numeric core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A numeric precondition failed (e.g. black reflectance >= white
    /// in the Kubelka-Munk inversion).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A non-fractional index or size was out of range.
    #[error("out of range: {0}")]
    OutOfRange(String),
}
