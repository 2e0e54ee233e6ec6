//! Core numeric primitives for the impasto painting system.
//!
//! This crate carries everything the rest of the workspace builds on:
//! - [`mat::Mat`] - a generic row-major 2-D buffer with bilinear sampling
//! - [`color::ColorConverter`] - sRGB / linear RGB / XYZ / CIELab / LCHab
//! - [`kubelka_munk`] - the two-constant pigment optics model
//! - [`spline`] - Catmull-Rom evaluation over polylines
//! - [`pool::WorkerPool`] - the single concurrency primitive of the core

pub mod color;
pub mod error;
pub mod kubelka_munk;
pub mod mat;
pub mod math;
pub mod pool;
pub mod spline;
pub mod vec;

pub use error::CoreError;
pub use mat::Mat;
pub use vec::{Vec2, Vec2i, Vec3};
