use thiserror::Error;

/// Errors of the stroke-based painter.
#[derive(Debug, Error)]
pub enum SbrError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Mixer(#[from] impasto_mixer::MixerError),

    #[error(transparent)]
    Renderer(#[from] impasto_renderer::RendererError),
}
