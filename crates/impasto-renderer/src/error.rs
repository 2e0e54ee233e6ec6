use thiserror::Error;

/// Errors of the canvas and brush layer.
#[derive(Debug, Error)]
pub enum RendererError {
    /// A brush asset file is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// A brush asset did not parse.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// A numeric precondition failed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<impasto_io::IoError> for RendererError {
    fn from(err: impasto_io::IoError) -> Self {
        match err {
            impasto_io::IoError::NotFound(p) => Self::NotFound(p),
            impasto_io::IoError::InvalidFormat(m) => Self::InvalidFormat(m),
            impasto_io::IoError::WriteFailed(m) => Self::InvalidFormat(m),
        }
    }
}
