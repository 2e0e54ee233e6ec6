//! The capability shared by both brush flavors. The stroke-based
//! painter depends only on this trait.

use impasto_core::vec::{Vec2, Vec3};

use crate::canvas::Canvas;

/// A brush that can be resized, dipped into paint and dragged along a
/// path over a canvas.
pub trait Brush {
    fn set_radius(&mut self, radius: f64);

    /// Dip the brush into a paint, given as its `[K, S]` pair.
    fn dip(&mut self, paint: [Vec3; 2]);

    /// Factor scaling the thickness of applied paint layers.
    fn set_thickness_scale(&mut self, scale: f64);

    fn thickness_scale(&self) -> f64;

    /// Apply a stroke along a path of canvas-space vertices.
    fn paint_stroke(&mut self, path: &[Vec2], canvas: &mut Canvas);
}
