//! The canvas: a wet paint layer over a dry substrate, with a height
//! field and a lazy per-cell drying clock.

use std::time::{Duration, Instant};

use impasto_core::kubelka_munk::compute_reflectance;
use impasto_core::mat::Mat;
use impasto_core::vec::Vec3;
use tracing::debug;

use crate::paint_layer::PaintLayer;

/// Default drying duration of wet paint.
pub const DEFAULT_DRYING_TIME: Duration = Duration::from_secs(15);

/// Wet cells below this volume are not worth drying.
const DRY_VOLUME_THRESHOLD: f64 = 0.001;

/// Painting surface. Cells dry lazily: a cell's wet paint is merged
/// into the substrate when the cell is next touched (or in bulk via
/// [`Canvas::dry_canvas`]).
#[derive(Debug, Clone)]
pub struct Canvas {
    paint_layer: PaintLayer,
    background: Vec3,
    r0: Mat<Vec3>,
    height: Mat<f64>,
    time_map: Vec<Instant>,
    drying_time: Duration,
}

impl Canvas {
    /// Create a canvas with a white substrate.
    pub fn new(rows: usize, cols: usize) -> Self {
        let now = Instant::now();
        let mut canvas = Self {
            paint_layer: PaintLayer::new(rows, cols),
            background: Vec3::ONE,
            r0: Mat::filled(rows, cols, Vec3::ONE),
            height: Mat::new(rows, cols),
            time_map: vec![now; rows * cols],
            drying_time: DEFAULT_DRYING_TIME,
        };
        canvas.clear();
        canvas
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.paint_layer.rows()
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.paint_layer.cols()
    }

    pub fn paint_layer(&self) -> &PaintLayer {
        &self.paint_layer
    }

    pub fn paint_layer_mut(&mut self) -> &mut PaintLayer {
        &mut self.paint_layer
    }

    pub fn r0(&self) -> &Mat<Vec3> {
        &self.r0
    }

    pub fn r0_mut(&mut self) -> &mut Mat<Vec3> {
        &mut self.r0
    }

    pub fn height(&self) -> &Mat<f64> {
        &self.height
    }

    /// Snapshot of the dry reflectance layer.
    pub fn reflectance_dry(&self) -> Mat<Vec3> {
        self.r0.clone()
    }

    pub fn drying_time(&self) -> Duration {
        self.drying_time
    }

    pub fn set_drying_time(&mut self, drying_time: Duration) {
        self.drying_time = drying_time;
    }

    /// Reset: zero the wet layer and height, substrate back to the
    /// background color, all cells stamped now.
    pub fn clear(&mut self) {
        self.paint_layer.clear();
        self.r0.fill(self.background);
        self.height.fill(0.0);
        let now = Instant::now();
        for t in &mut self.time_map {
            *t = now;
        }
    }

    /// Clear and copy an image into the substrate.
    pub fn set_background(&mut self, background: &Mat<Vec3>) {
        self.clear();
        for i in 0..self.r0.len().min(background.len()) {
            *self.r0.at_index_mut(i) = background.at_index(i);
        }
    }

    /// Instantly merge the entire wet layer into the substrate.
    pub fn dry_canvas(&mut self) {
        debug!("drying whole canvas");
        let now = Instant::now();
        for i in 0..self.paint_layer.v().len() {
            let v = self.paint_layer.v().at_index(i);
            *self.height.at_index_mut(i) += v;
            *self.r0.at_index_mut(i) = compute_reflectance(
                self.paint_layer.k().at_index(i),
                self.paint_layer.s().at_index(i),
                self.r0.at_index(i),
                v,
            );
            *self.paint_layer.v_mut().at_index_mut(i) = 0.0;
            *self.paint_layer.k_mut().at_index_mut(i) = Vec3::ZERO;
            *self.paint_layer.s_mut().at_index_mut(i) = Vec3::ZERO;
            self.time_map[i] = now;
        }
    }

    /// Dry the cell (x, y) according to the time elapsed since it was
    /// last touched. Called by brushes before modifying the cell.
    pub fn check_dry(&mut self, x: usize, y: usize, now: Instant) {
        let index = y * self.cols() + x;
        let v = self.paint_layer.v()[(y, x)];

        if !self.drying_time.is_zero() && v > DRY_VOLUME_THRESHOLD {
            let elapsed = now
                .checked_duration_since(self.time_map[index])
                .unwrap_or(Duration::ZERO);

            if elapsed >= self.drying_time {
                // fully dry
                self.height[(y, x)] += v;
                self.r0[(y, x)] = compute_reflectance(
                    self.paint_layer.k()[(y, x)],
                    self.paint_layer.s()[(y, x)],
                    self.r0[(y, x)],
                    v,
                );
                self.paint_layer.set(y, x, Vec3::ZERO, Vec3::ZERO, 0.0);
            } else {
                let rate = elapsed.as_secs_f64() / self.drying_time.as_secs_f64();
                if rate > 0.01 {
                    // dry only a portion; coefficients stay
                    let v_dry = rate * v;
                    self.height[(y, x)] += v_dry;
                    self.r0[(y, x)] = compute_reflectance(
                        self.paint_layer.k()[(y, x)],
                        self.paint_layer.s()[(y, x)],
                        self.r0[(y, x)],
                        v_dry,
                    );
                    self.paint_layer.v_mut()[(y, x)] = v - v_dry;
                }
            }
        }
        self.time_map[index] = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wet_canvas() -> Canvas {
        let mut canvas = Canvas::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                canvas.paint_layer_mut().set(
                    y,
                    x,
                    Vec3::new(0.2, 0.1, 0.22),
                    Vec3::new(0.124, 0.658, 0.123),
                    0.5,
                );
            }
        }
        canvas
    }

    #[test]
    fn test_new_canvas_is_white_and_dry() {
        let canvas = Canvas::new(3, 5);
        assert_eq!(canvas.rows(), 3);
        assert_eq!(canvas.cols(), 5);
        assert!((canvas.r0()[(0, 0)] - Vec3::ONE).abs().max_element() < 1e-12);
        assert_eq!(canvas.paint_layer().v()[(2, 4)], 0.0);
        assert_eq!(canvas.height()[(0, 0)], 0.0);
    }

    #[test]
    fn test_dry_canvas_conserves_volume_into_height() {
        let mut canvas = wet_canvas();
        canvas.dry_canvas();
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(canvas.paint_layer().v()[(y, x)], 0.0);
                assert_eq!(canvas.paint_layer().k()[(y, x)], Vec3::ZERO);
                assert!((canvas.height()[(y, x)] - 0.5).abs() < 1e-12);
                // substrate took the layer color
                assert!((canvas.r0()[(y, x)] - Vec3::ONE).abs().max_element() > 0.1);
            }
        }
    }

    #[test]
    fn test_dry_canvas_is_idempotent() {
        let mut canvas = wet_canvas();
        canvas.dry_canvas();
        let r0 = canvas.reflectance_dry();
        let height = canvas.height().clone();
        canvas.dry_canvas();
        for i in 0..r0.len() {
            assert!((canvas.r0().at_index(i) - r0.at_index(i)).abs().max_element() < 1e-12);
            assert!((canvas.height().at_index(i) - height.at_index(i)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_check_dry_full_after_drying_time() {
        let mut canvas = wet_canvas();
        canvas.set_drying_time(Duration::from_millis(10));
        let later = Instant::now() + Duration::from_millis(100);
        canvas.check_dry(1, 1, later);
        assert_eq!(canvas.paint_layer().v()[(1, 1)], 0.0);
        assert!((canvas.height()[(1, 1)] - 0.5).abs() < 1e-12);
        // untouched neighbors stay wet
        assert!((canvas.paint_layer().v()[(2, 2)] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_check_dry_partial() {
        let mut canvas = wet_canvas();
        canvas.set_drying_time(Duration::from_secs(10));
        let later = Instant::now() + Duration::from_secs(2);
        canvas.check_dry(0, 0, later);
        let v = canvas.paint_layer().v()[(0, 0)];
        // roughly a fifth of the volume moved into the height field
        assert!(v < 0.5 && v > 0.3, "wet volume {v}");
        assert!((canvas.height()[(0, 0)] + v - 0.5).abs() < 1e-9);
        // coefficients unchanged for the remaining wet paint
        assert!((canvas.paint_layer().k()[(0, 0)] - Vec3::new(0.2, 0.1, 0.22))
            .abs()
            .max_element() < 1e-12);
    }

    #[test]
    fn test_check_dry_same_instant_twice_is_stable() {
        let mut canvas = wet_canvas();
        canvas.set_drying_time(Duration::from_secs(10));
        let later = Instant::now() + Duration::from_secs(2);
        canvas.check_dry(3, 2, later);
        let v_after = canvas.paint_layer().v()[(3, 2)];
        let h_after = canvas.height()[(3, 2)];
        canvas.check_dry(3, 2, later);
        assert_eq!(canvas.paint_layer().v()[(3, 2)], v_after);
        assert_eq!(canvas.height()[(3, 2)], h_after);
    }

    #[test]
    fn test_zero_drying_time_never_dries() {
        let mut canvas = wet_canvas();
        canvas.set_drying_time(Duration::ZERO);
        let later = Instant::now() + Duration::from_secs(3600);
        canvas.check_dry(1, 1, later);
        assert!((canvas.paint_layer().v()[(1, 1)] - 0.5).abs() < 1e-12);
        assert_eq!(canvas.height()[(1, 1)], 0.0);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut canvas = wet_canvas();
        canvas.dry_canvas();
        canvas.clear();
        assert!((canvas.r0()[(1, 1)] - Vec3::ONE).abs().max_element() < 1e-12);
        assert_eq!(canvas.height()[(1, 1)], 0.0);
        assert_eq!(canvas.paint_layer().v()[(1, 1)], 0.0);
    }

    #[test]
    fn test_set_background() {
        let mut canvas = Canvas::new(2, 2);
        let bg = Mat::filled(2, 2, Vec3::new(0.5, 0.25, 0.125));
        canvas.set_background(&bg);
        assert!((canvas.r0()[(1, 0)] - Vec3::new(0.5, 0.25, 0.125))
            .abs()
            .max_element() < 1e-12);
    }
}
