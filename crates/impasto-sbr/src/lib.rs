//! Stroke-based rendering: tracing stroke paths along the edge tangent
//! flow of a target image and driving a brush to repaint it.

pub mod config;
pub mod error;
pub mod painter;
pub mod path_tracer;

pub use config::{
    ConvergenceParams, InputParams, OrientationParams, PainterConfig, StrokeParams,
};
pub use error::SbrError;
pub use painter::PictureTargetSbrPainter;
pub use path_tracer::{PathEval, PathTracer, Rect};
