//! A render queue serializing all canvas mutations on one worker, so
//! strokes, drying and readbacks happen in submission order.

use std::sync::{Arc, Mutex};

use impasto_core::mat::Mat;
use impasto_core::pool::{TaskHandle, WorkerPool};
use impasto_core::vec::{Vec2, Vec3};
use tracing::debug;

use crate::brush::Brush;
use crate::brush_stroke_sample::BrushStrokeSample;
use crate::canvas::Canvas;
use crate::renderer::Renderer;
use crate::texture_brush::TextureBrush;

struct QueueState {
    canvas: Canvas,
    brush: TextureBrush,
}

/// Owns a canvas and a texture brush behind a single-worker pool.
/// Every operation returns a handle that can be waited on; operations
/// execute strictly in submission order.
pub struct RenderQueue {
    pool: WorkerPool,
    state: Arc<Mutex<QueueState>>,
    size: (usize, usize),
    thickness_scale: f64,
}

impl RenderQueue {
    pub fn new(rows: usize, cols: usize, sample: BrushStrokeSample) -> Self {
        debug!(rows, cols, "starting render queue");
        Self {
            pool: WorkerPool::new(1),
            state: Arc::new(Mutex::new(QueueState {
                canvas: Canvas::new(rows, cols),
                brush: TextureBrush::new(sample),
            })),
            size: (rows, cols),
            thickness_scale: 1.0,
        }
    }

    /// Canvas size as (rows, cols).
    pub fn size(&self) -> (usize, usize) {
        self.size
    }

    pub fn brush_thickness_scale(&self) -> f64 {
        self.thickness_scale
    }

    /// Queue a brush stroke: dip, set the radius, paint the path.
    pub fn render_stroke(
        &self,
        path: Vec<Vec2>,
        radius: f64,
        paint: [Vec3; 2],
    ) -> TaskHandle<()> {
        let state = Arc::clone(&self.state);
        self.pool.push_back(move || {
            let mut state = state.lock().expect("render queue state poisoned");
            state.brush.dip(paint);
            state.brush.set_radius(radius);
            let QueueState { canvas, brush } = &mut *state;
            brush.paint_stroke(&path, canvas);
        })
    }

    /// Queue a readback of the composed canvas as linear RGB.
    pub fn linear_rgb_image(&self) -> TaskHandle<Mat<Vec3>> {
        let state = Arc::clone(&self.state);
        self.pool.push_back(move || {
            let state = state.lock().expect("render queue state poisoned");
            Renderer::new().compose_canvas(&state.canvas)
        })
    }

    /// Queue an instant full dry of the canvas.
    pub fn dry(&self) -> TaskHandle<()> {
        let state = Arc::clone(&self.state);
        self.pool.push_back(move || {
            state
                .lock()
                .expect("render queue state poisoned")
                .canvas
                .dry_canvas();
        })
    }

    pub fn set_brush_thickness_scale(&mut self, scale: f64) {
        self.thickness_scale = scale;
        let state = Arc::clone(&self.state);
        let _ = self.pool.push_back(move || {
            state
                .lock()
                .expect("render queue state poisoned")
                .brush
                .set_thickness_scale(scale);
        });
    }

    pub fn enable_smudge(&self, enable: bool) {
        let state = Arc::clone(&self.state);
        let _ = self.pool.push_back(move || {
            state
                .lock()
                .expect("render queue state poisoned")
                .brush
                .set_smudge_enabled(enable);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stroke_then_readback_in_order() {
        let queue = RenderQueue::new(32, 32, BrushStrokeSample::default_sample());
        let stroke = queue.render_stroke(
            vec![Vec2::new(6.0, 16.0), Vec2::new(26.0, 16.0)],
            4.0,
            [Vec3::new(0.8, 0.2, 0.2), Vec3::splat(0.3)],
        );
        let image = queue.linear_rgb_image();

        stroke.wait().unwrap();
        let image = image.wait().unwrap();
        // readback queued after the stroke must observe it
        let mut touched = 0;
        for &v in image.data() {
            if (v - Vec3::ONE).abs().max_element() > 1e-6 {
                touched += 1;
            }
        }
        assert!(touched > 0, "stroke invisible in readback");
    }

    #[test]
    fn test_dry_clears_wet_layer() {
        let queue = RenderQueue::new(16, 16, BrushStrokeSample::default_sample());
        queue
            .render_stroke(
                vec![Vec2::new(2.0, 8.0), Vec2::new(14.0, 8.0)],
                3.0,
                [Vec3::splat(0.4), Vec3::splat(0.4)],
            )
            .wait()
            .unwrap();
        queue.dry().wait().unwrap();
        let state = queue.state.lock().unwrap();
        let wet: f64 = state.canvas.paint_layer().v().data().iter().sum();
        assert_eq!(wet, 0.0);
    }

    #[test]
    fn test_size_accessor() {
        let queue = RenderQueue::new(10, 20, BrushStrokeSample::default_sample());
        assert_eq!(queue.size(), (10, 20));
    }
}
