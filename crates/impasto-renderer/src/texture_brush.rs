//! The texture brush: warps a stroke-shaped thickness sample along a
//! spline path, smudges the wet canvas and deposits the stored paint.

use std::time::Instant;

use impasto_core::mat::Mat;
use impasto_core::spline::SplineEval;
use impasto_core::vec::{Vec2, Vec3};
use tracing::debug;

use crate::brush::Brush;
use crate::brush_stroke_sample::BrushStrokeSample;
use crate::canvas::Canvas;
use crate::smudge::Smudge;
use crate::texture_brush_dictionary::TextureBrushDictionary;
use crate::texture_warp::TextureWarp;

/// Brush that drags a scanned stroke texture along a vertex path.
#[derive(Debug, Clone)]
pub struct TextureBrush {
    sample: BrushStrokeSample,
    dictionary: Option<TextureBrushDictionary>,
    paint: [Vec3; 2],
    radius: f64,
    thickness_scale: f64,
    smudge: Smudge,
    smudge_enabled: bool,
}

impl TextureBrush {
    pub fn new(sample: BrushStrokeSample) -> Self {
        let radius = 10.0;
        Self {
            sample,
            dictionary: None,
            paint: [Vec3::splat(0.1), Vec3::splat(0.1)],
            radius,
            thickness_scale: 1.0,
            smudge: Smudge::new((2.0 * radius) as usize),
            smudge_enabled: true,
        }
    }

    pub fn set_smudge_enabled(&mut self, enabled: bool) {
        self.smudge_enabled = enabled;
    }

    /// Replace the fixed stroke sample.
    pub fn set_sample(&mut self, sample: BrushStrokeSample) {
        self.sample = sample;
    }

    /// With a dictionary, every stroke re-selects a texture matching
    /// its length and the brush size.
    pub fn set_dictionary(&mut self, dictionary: Option<TextureBrushDictionary>) {
        self.dictionary = dictionary;
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Drag the stroke sample along the path and blend it into the
    /// canvas. Paths shorter than two vertices deposit nothing.
    pub fn apply_to(&mut self, vertices: &[Vec2], canvas: &mut Canvas) {
        if vertices.len() < 2 {
            return;
        }

        if let Some(dictionary) = &mut self.dictionary {
            let texture = dictionary.lookup(vertices, 2.0 * self.radius);
            if let Ok(sample) = BrushStrokeSample::from_texture(texture, 2.0 * self.radius) {
                self.sample = sample;
            }
        }

        // stroke bounding box, expanded by the radius, clamped
        let mut bound_min = vertices[0];
        let mut bound_max = vertices[0];
        for v in vertices {
            bound_min = bound_min.min(*v);
            bound_max = bound_max.max(*v);
        }
        bound_min = (bound_min - Vec2::splat(self.radius)).max(Vec2::ZERO);
        bound_max = (bound_max + Vec2::splat(self.radius)).min(Vec2::new(
            canvas.cols() as f64 - 1.0,
            canvas.rows() as f64 - 1.0,
        ));
        if bound_min.x > bound_max.x || bound_min.y > bound_max.y {
            return;
        }

        let mut length = 0.0;
        for pair in vertices.windows(2) {
            length += (pair[1] - pair[0]).length();
        }

        let spine = SplineEval::new(vertices);

        // ribbons at +-radius with their UV rails
        let count = vertices.len();
        let mut up = Vec::with_capacity(count);
        let mut down = Vec::with_capacity(count);
        let mut up_uv = Vec::with_capacity(count);
        let mut down_uv = Vec::with_capacity(count);
        for i in 0..count {
            let u = i as f64 / (count - 1) as f64;
            let c = spine.catmull_rom(u);
            let t = spine.catmull_rom_derivative(u).normalize_or(Vec2::X);
            let d = Vec2::new(-t.y, t.x);

            up.push(c - d * self.radius);
            down.push(c + d * self.radius);
            up_uv.push(Vec2::new(u, -1.0));
            down_uv.push(Vec2::new(u, 1.0));
        }

        // closed strip: down reversed, then up
        let mut polygon: Vec<Vec2> = down.iter().rev().copied().collect();
        polygon.extend(up.iter().copied());
        let mut polygon_uv: Vec<Vec2> = down_uv.iter().rev().copied().collect();
        polygon_uv.extend(up_uv.iter().copied());

        let mut canvas_to_uv = TextureWarp::new();
        if canvas_to_uv.init(polygon, polygon_uv).is_err() {
            return;
        }

        let now = Instant::now();

        // integer-aligned stroke box for the per-stroke thickness map
        let x0 = bound_min.x.floor() as usize;
        let y0 = bound_min.y.floor() as usize;
        let x1 = (bound_max.x.ceil() as usize).min(canvas.cols() - 1);
        let y1 = (bound_max.y.ceil() as usize).min(canvas.rows() - 1);
        let map_origin = Vec2::new(x0 as f64, y0 as f64);

        let mut thickness_map: Mat<f64> = Mat::new(y1 - y0 + 1, x1 - x0 + 1);
        let mut marked: Vec<(usize, usize)> = Vec::new();

        for x in x0..=x1 {
            for y in y0..=y1 {
                let uv = canvas_to_uv.warp(Vec2::new(x as f64, y as f64));
                if uv.x < 0.0 || uv.x > 1.0 || uv.y < -1.0 || uv.y > 1.0 {
                    continue;
                }
                let v_tex = self.sample.sample_at_uv(uv) * self.thickness_scale;
                if v_tex > 0.0 {
                    canvas.check_dry(x, y, now);
                    thickness_map[(y - y0, x - x0)] = v_tex;
                    marked.push((x, y));
                }
            }
        }
        debug!(marked = marked.len(), "texture brush stroke coverage");

        if self.smudge_enabled {
            self.smudge
                .smudge(canvas, map_origin, &spine, length, &thickness_map);
        }

        for &(x, y) in &marked {
            let v_tex = thickness_map[(y - y0, x - x0)];
            let v_can = canvas.paint_layer().v()[(y, x)];
            let v_sum = v_can + v_tex;
            if v_sum <= 0.0 {
                continue;
            }
            let scale = 1.0 / v_sum;
            let k = canvas.paint_layer().k()[(y, x)];
            let s = canvas.paint_layer().s()[(y, x)];
            canvas.paint_layer_mut().set(
                y,
                x,
                (k * v_can + self.paint[0] * v_tex) * scale,
                (s * v_can + self.paint[1] * v_tex) * scale,
                v_tex.max(v_can),
            );
        }
    }
}

impl Brush for TextureBrush {
    fn set_radius(&mut self, radius: f64) {
        self.radius = radius;
        self.smudge = Smudge::new((2.0 * radius) as usize);
    }

    fn dip(&mut self, paint: [Vec3; 2]) {
        self.paint = paint;
        self.smudge.clean();
    }

    fn set_thickness_scale(&mut self, scale: f64) {
        self.thickness_scale = scale;
    }

    fn thickness_scale(&self) -> f64 {
        self.thickness_scale
    }

    fn paint_stroke(&mut self, path: &[Vec2], canvas: &mut Canvas) {
        self.apply_to(path, canvas);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_brush() -> TextureBrush {
        let mut brush = TextureBrush::new(BrushStrokeSample::default_sample());
        brush.set_radius(4.0);
        brush.dip([Vec3::new(0.8, 0.2, 0.2), Vec3::new(0.3, 0.3, 0.3)]);
        brush
    }

    fn straight_path() -> Vec<Vec2> {
        vec![
            Vec2::new(8.0, 16.0),
            Vec2::new(16.0, 16.0),
            Vec2::new(24.0, 16.0),
        ]
    }

    #[test]
    fn test_stroke_deposits_paint() {
        let mut canvas = Canvas::new(32, 32);
        canvas.set_drying_time(Duration::ZERO);
        let mut brush = test_brush();
        brush.paint_stroke(&straight_path(), &mut canvas);

        let total: f64 = canvas.paint_layer().v().data().iter().sum();
        assert!(total > 0.0, "stroke deposited nothing");
        // paint near the spine carries the dipped color
        let v = canvas.paint_layer().v()[(16, 16)];
        assert!(v > 0.0);
        let k = canvas.paint_layer().k()[(16, 16)];
        assert!((k - Vec3::new(0.8, 0.2, 0.2)).abs().max_element() < 1e-6);
    }

    #[test]
    fn test_stroke_respects_radius() {
        let mut canvas = Canvas::new(32, 32);
        canvas.set_drying_time(Duration::ZERO);
        let mut brush = test_brush();
        brush.paint_stroke(&straight_path(), &mut canvas);

        // cells far from the spine stay untouched
        assert_eq!(canvas.paint_layer().v()[(2, 16)], 0.0);
        assert_eq!(canvas.paint_layer().v()[(30, 16)], 0.0);
    }

    #[test]
    fn test_single_point_path_renders_nothing() {
        let mut canvas = Canvas::new(16, 16);
        let mut brush = test_brush();
        brush.paint_stroke(&[Vec2::new(8.0, 8.0)], &mut canvas);
        let total: f64 = canvas.paint_layer().v().data().iter().sum();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn test_empty_path_renders_nothing() {
        let mut canvas = Canvas::new(16, 16);
        let mut brush = test_brush();
        brush.paint_stroke(&[], &mut canvas);
        let total: f64 = canvas.paint_layer().v().data().iter().sum();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn test_stroke_determinism_without_drying() {
        let path = straight_path();

        let run_twice = |mut brush: TextureBrush| {
            let mut canvas = Canvas::new(32, 32);
            canvas.set_drying_time(Duration::ZERO);
            brush.paint_stroke(&path, &mut canvas);
            brush.paint_stroke(&path, &mut canvas);
            canvas
        };

        let a = run_twice(test_brush());
        let b = run_twice(test_brush());
        for i in 0..a.paint_layer().v().len() {
            assert!(
                (a.paint_layer().v().at_index(i) - b.paint_layer().v().at_index(i)).abs()
                    < 1e-12
            );
            assert!(
                (a.paint_layer().k().at_index(i) - b.paint_layer().k().at_index(i))
                    .abs()
                    .max_element()
                    < 1e-12
            );
        }
    }

    #[test]
    fn test_dictionary_swaps_sample_per_stroke() {
        use crate::texture_brush_dictionary::TextureBrushDictionary;
        use impasto_core::mat::Mat;

        let dictionary = TextureBrushDictionary::from_textures(vec![
            (0, 0, Mat::from_fn(8, 32, |r, _| r as f64)),
            (0, 1, Mat::from_fn(8, 128, |r, _| r as f64)),
        ]);
        let mut canvas = Canvas::new(32, 32);
        canvas.set_drying_time(Duration::ZERO);
        let mut brush = test_brush();
        brush.set_dictionary(Some(dictionary));
        brush.paint_stroke(&straight_path(), &mut canvas);
        let total: f64 = canvas.paint_layer().v().data().iter().sum();
        assert!(total > 0.0);
    }

    #[test]
    fn test_thickness_scale_raises_volume() {
        let path = straight_path();
        let volume_with_scale = |scale: f64| {
            let mut canvas = Canvas::new(32, 32);
            canvas.set_drying_time(Duration::ZERO);
            let mut brush = test_brush();
            brush.set_smudge_enabled(false);
            brush.set_thickness_scale(scale);
            brush.paint_stroke(&path, &mut canvas);
            canvas.paint_layer().v().data().iter().sum::<f64>()
        };
        assert!(volume_with_scale(2.0) > volume_with_scale(1.0));
    }
}
