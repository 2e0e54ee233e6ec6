//! The painting surface and the brushes that work it: wet paint
//! layers, the drying canvas, texture and footprint brushes, and the
//! compositing renderer.

pub mod brush;
pub mod brush_stroke_sample;
pub mod canvas;
pub mod error;
pub mod footprint_brush;
pub mod paint_layer;
pub mod render_queue;
pub mod renderer;
pub mod smudge;
pub mod texture_brush;
pub mod texture_brush_dictionary;
pub mod texture_warp;

pub use brush::Brush;
pub use brush_stroke_sample::BrushStrokeSample;
pub use canvas::Canvas;
pub use error::RendererError;
pub use footprint_brush::FootprintBrush;
pub use paint_layer::PaintLayer;
pub use renderer::Renderer;
pub use texture_brush::TextureBrush;
pub use texture_brush_dictionary::TextureBrushDictionary;
