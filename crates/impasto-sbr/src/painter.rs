//! The picture-target painter: reproduces a raster image on a canvas
//! as a sequence of coherent brush strokes, coarse to fine.

use std::collections::BTreeMap;

use impasto_core::color::ColorConverter;
use impasto_core::kubelka_munk::compute_reflectance;
use impasto_core::mat::Mat;
use impasto_core::vec::{Vec2, Vec3};
use impasto_image::fdog::smooth_oabf;
use impasto_image::superpixel::{ImageRegion, SuperpixelSegmentation};
use impasto_image::tensor::compute_tensors;
use impasto_mixer::palette::Palette;
use impasto_mixer::{PaintMixer, thinning_medium};
use impasto_renderer::{Brush, Canvas, Renderer};
use tracing::{debug, info};

use crate::config::{ConvergenceParams, InputParams, OrientationParams, StrokeParams};
use crate::error::SbrError;
use crate::path_tracer::{PathEval, PathTracer, Rect};

/// Layer thickness assumed when predicting what a paint will look like
/// over a region.
pub const ASSUMED_AVG_THICKNESS: f64 = 1.0;

struct BrushStroke {
    path: Vec<Vec2>,
    radius: f64,
}

struct RegionStats {
    target_lab: Vec3,
    canvas_lab: Vec3,
}

/// Drives segmentation, path tracing, paint selection and the brush to
/// reproduce a target image on the canvas.
pub struct PictureTargetSbrPainter {
    canvas: Canvas,
    mixer: PaintMixer,
    brush: Box<dyn Brush>,
    target_srgb: Mat<Vec3>,
    mask: Option<Mat<f64>>,
    pub params_input: InputParams,
    pub params_orientations: OrientationParams,
    pub params_stroke: StrokeParams,
    pub params_convergence: ConvergenceParams,
    coat_canvas: bool,
    seed: u64,
}

impl PictureTargetSbrPainter {
    pub fn new(
        canvas: Canvas,
        mixer: PaintMixer,
        brush: Box<dyn Brush>,
        target_srgb: Mat<Vec3>,
    ) -> Self {
        Self {
            canvas,
            mixer,
            brush,
            target_srgb,
            mask: None,
            params_input: InputParams::default(),
            params_orientations: OrientationParams::default(),
            params_stroke: StrokeParams::default(),
            params_convergence: ConvergenceParams::default(),
            coat_canvas: false,
            seed: 0x5eed,
        }
    }

    pub fn set_mask(&mut self, mask: Option<Mat<f64>>) {
        self.mask = mask;
    }

    pub fn set_coat_canvas(&mut self, coat: bool) {
        self.coat_canvas = coat;
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    pub fn into_canvas(self) -> Canvas {
        self.canvas
    }

    /// Run all brush-size stages. Returns `Ok(true)` when global
    /// convergence was reached, `Ok(false)` when the iteration budget
    /// ran out first.
    pub fn paint(&mut self) -> Result<bool, SbrError> {
        if self.target_srgb.is_empty() {
            return Err(SbrError::InvalidInput("target image is empty".into()));
        }

        let con = ColorConverter::default();
        info!("smoothing target image");
        let target_lab = smooth_oabf(
            &self.target_srgb.map(|c| con.srgb_to_lab(c)),
            self.mask.as_ref(),
            self.params_input.sigma_spatial,
            self.params_input.sigma_color,
            self.params_orientations.outer_blur_scale,
            self.params_input.smooth_iterations,
        );

        info!(colors = self.params_input.nr_colors, "mixing palette from the image");
        let mut palette = self
            .mixer
            .mix_from_image(&self.target_srgb, self.params_input.nr_colors)?;
        if self.params_input.thinning_volume > 0.0 {
            let thinner = thinning_medium();
            for paint in palette.iter_mut() {
                *paint = self
                    .mixer
                    .mixed(paint, 1.0, &thinner, self.params_input.thinning_volume);
            }
        }

        self.brush.set_thickness_scale(self.params_stroke.thickness_scale);

        if self.coat_canvas {
            self.coat();
        }

        let brush_sizes = self.params_stroke.brush_sizes.clone();
        for brush_size in brush_sizes {
            info!(brush_size, "switching brush size");
            for iteration in 0..self.params_convergence.max_iterations {
                debug!(iteration, "painting iteration");
                if self.run_iteration(&target_lab, &palette, brush_size, iteration)? {
                    info!("converged globally");
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Prime the canvas with a dried uniform coat of thinning medium.
    fn coat(&mut self) {
        let thinner = thinning_medium();
        let layer = self.canvas.paint_layer_mut();
        for y in 0..layer.rows() {
            for x in 0..layer.cols() {
                layer.set(y, x, thinner.k, thinner.s, 1.0);
            }
        }
        self.canvas.dry_canvas();
    }

    /// One segmentation + stroke pass; true when globally converged.
    fn run_iteration(
        &mut self,
        target_lab: &Mat<Vec3>,
        palette: &Palette,
        brush_size: f64,
        iteration: u32,
    ) -> Result<bool, SbrError> {
        let con = ColorConverter::default();
        let (t_rows, t_cols) = (target_lab.rows(), target_lab.cols());

        let canvas_rgb = Renderer::new().compose_canvas(&self.canvas);
        let canvas_lab = canvas_rgb.map(|c| con.rgb_to_lab(c)).scaled(t_rows, t_cols);

        let difference = Mat::from_fn(t_rows, t_cols, |r, c| {
            ColorConverter::color_difference(target_lab[(r, c)], canvas_lab[(r, c)])
        });

        let mut segmentation = SuperpixelSegmentation::new();
        segmentation.set_seed(self.seed ^ (iteration as u64 + 1).wrapping_mul(0x9e3779b9));
        segmentation.extract(
            target_lab,
            &canvas_lab,
            self.mask.as_ref(),
            brush_size.max(2.0) as i32,
        );
        let mut regions: BTreeMap<i32, ImageRegion> = BTreeMap::new();
        let mut labels = segmentation.regions(&mut regions);

        if self.check_convergence(&difference, &mut regions, &mut labels) {
            return Ok(true);
        }

        let strokes = self.generate_brush_strokes(
            &mut regions,
            &labels,
            target_lab,
            &canvas_lab,
            brush_size / 2.0,
            palette,
        );

        // render the recorded strokes, grouped by paint
        let xs = self.canvas.cols() as f64 / t_cols as f64;
        let ys = self.canvas.rows() as f64 / t_rows as f64;
        for (paint_index, group) in strokes {
            let paint = palette[paint_index];
            debug!(paint_index, strokes = group.len(), "rendering stroke group");
            self.brush.dip([paint.k, paint.s]);
            for stroke in group {
                let path: Vec<Vec2> = stroke
                    .path
                    .iter()
                    .map(|p| Vec2::new(p.x * xs, p.y * ys))
                    .collect();
                self.brush.set_radius((xs + ys) * 0.5 * stroke.radius);
                self.brush.paint_stroke(&path, &mut self.canvas);
            }
        }
        Ok(false)
    }

    /// Deactivate regions already close enough; true when the mean RMS
    /// over the remaining active regions is below the global threshold.
    fn check_convergence(
        &self,
        difference: &Mat<f64>,
        regions: &mut BTreeMap<i32, ImageRegion>,
        labels: &mut Mat<i32>,
    ) -> bool {
        let mut global_rms = 0.0;
        let mut active = 0usize;
        for region in regions.values_mut() {
            let rms = region.rms(difference);
            if rms >= self.params_convergence.rms_local {
                region.set_active(true);
                global_rms += rms;
                active += 1;
            } else {
                region.set_active(false);
                region.fill(labels, -1);
            }
        }
        if active == 0 {
            debug!("no active regions left");
            return true;
        }
        global_rms /= active as f64;
        debug!(global_rms, active, "convergence check");
        global_rms < self.params_convergence.rms_global
    }

    /// Pick the palette paint whose composition over the region's
    /// current color lands closest to the target color, if any beats
    /// leaving the region untouched.
    fn find_best_paint_index(r_target: Vec3, r_current: Vec3, palette: &Palette) -> Option<usize> {
        let con = ColorConverter::default();
        let target_lab = con.rgb_to_lab(r_target);
        let current_lab = con.rgb_to_lab(r_current);

        let mut best_distance = ColorConverter::ciede2000(current_lab, target_lab);
        let mut best_index = None;
        for (i, paint) in palette.iter().enumerate() {
            let composed =
                compute_reflectance(paint.k, paint.s, r_current, ASSUMED_AVG_THICKNESS);
            let distance = ColorConverter::ciede2000(con.rgb_to_lab(composed), target_lab);
            if distance < best_distance {
                best_distance = distance;
                best_index = Some(i);
            }
        }
        best_index
    }

    fn generate_brush_strokes(
        &self,
        regions: &mut BTreeMap<i32, ImageRegion>,
        labels: &Mat<i32>,
        target_lab: &Mat<Vec3>,
        canvas_lab: &Mat<Vec3>,
        brush_radius: f64,
        palette: &Palette,
    ) -> BTreeMap<usize, Vec<BrushStroke>> {
        let con = ColorConverter::default();
        let (t_rows, t_cols) = (target_lab.rows(), target_lab.cols());

        debug!("computing structure tensor field");
        let tensors = compute_tensors(
            target_lab,
            self.mask.as_ref(),
            brush_radius * self.params_orientations.inner_blur_scale,
            brush_radius * self.params_orientations.outer_blur_scale,
        );
        let mut tracer = PathTracer::new(tensors);
        tracer.set_min_len(self.params_stroke.min_len);
        tracer.set_max_len(self.params_stroke.max_len);
        tracer.set_step(if self.params_stroke.step_size <= 0.0 {
            brush_radius * 0.5
        } else {
            self.params_stroke.step_size
        });
        tracer.set_frame(Rect::new(0.0, 0.0, t_cols as f64, t_rows as f64));
        tracer.set_curvature_blend(self.params_stroke.curvature_alpha);

        // per-region means, frozen for this iteration
        let stats: BTreeMap<i32, RegionStats> = regions
            .iter()
            .map(|(&label, region)| {
                (
                    label,
                    RegionStats {
                        target_lab: region.mean(target_lab),
                        canvas_lab: region.mean(canvas_lab),
                    },
                )
            })
            .collect();

        // the configured diameters bound the per-region brush radius
        let size_min = self
            .params_stroke
            .brush_sizes
            .iter()
            .cloned()
            .fold(f64::MAX, f64::min);
        let size_max = self
            .params_stroke
            .brush_sizes
            .iter()
            .cloned()
            .fold(0.0_f64, f64::max);

        let active_labels: Vec<i32> = regions
            .iter()
            .filter(|(_, r)| r.is_active())
            .map(|(&l, _)| l)
            .collect();

        let mut strokes: BTreeMap<usize, Vec<BrushStroke>> = BTreeMap::new();

        for label in active_labels {
            if !regions.get(&label).map(ImageRegion::is_active).unwrap_or(false) {
                continue; // blocked by an earlier path this iteration
            }
            let region = &regions[&label];
            let (incenter, inscribed_radius) = region.inscribed_circle();
            let width = inscribed_radius * 2.0;

            let used_radius = if self.params_stroke.clamp_brush_radius {
                width.clamp(size_min, size_max) / 2.0
            } else {
                if width < size_min {
                    if let Some(region) = regions.get_mut(&label) {
                        region.set_active(false);
                    }
                    continue;
                }
                width.min(size_max) / 2.0
            };

            let stat = &stats[&label];
            let r_target = con.lab_to_rgb(stat.target_lab);
            let r_current = con.lab_to_rgb(stat.canvas_lab);
            let Some(paint_index) = Self::find_best_paint_index(r_target, r_current, palette)
            else {
                continue;
            };
            let paint = palette[paint_index];

            let mask = self.mask.as_ref();
            let eval = |p: Vec2| -> PathEval {
                let (x, y) = (p.x as i64, p.y as i64);
                if x < 0 || y < 0 || x >= t_cols as i64 || y >= t_rows as i64 {
                    return PathEval::StopNow;
                }
                let (xu, yu) = (x as usize, y as usize);
                let here = labels[(yu, xu)];
                if here < 0 {
                    return PathEval::StopNow;
                }
                if let Some(mask) = mask {
                    if mask[(yu, xu)] < 1.0 {
                        return PathEval::StopNow;
                    }
                }
                let Some(stat) = stats.get(&here) else {
                    return PathEval::StopNow;
                };

                // would the chosen paint improve this region?
                let r0 = con.lab_to_rgb(stat.canvas_lab);
                let composed =
                    compute_reflectance(paint.k, paint.s, r0, ASSUMED_AVG_THICKNESS);
                let composed_lab = con.rgb_to_lab(composed);
                if (composed_lab - stat.target_lab).length_squared()
                    < (stat.target_lab - stat.canvas_lab).length_squared()
                {
                    PathEval::Continue
                } else {
                    PathEval::StopNext
                }
            };

            let path = tracer.trace_with(incenter, eval);

            if self.params_stroke.block_visited_regions {
                for p in &path {
                    let (x, y) = (p.x as i64, p.y as i64);
                    if x < 0 || y < 0 || x >= t_cols as i64 || y >= t_rows as i64 {
                        continue;
                    }
                    let visited = labels[(y as usize, x as usize)];
                    if let Some(region) = regions.get_mut(&visited) {
                        region.set_active(false);
                    }
                }
            }

            if !path.is_empty() {
                strokes.entry(paint_index).or_default().push(BrushStroke {
                    path,
                    radius: used_radius,
                });
            }
        }
        strokes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use impasto_mixer::PaintCoeff;
    use impasto_renderer::FootprintBrush;
    use std::time::Duration;

    fn base_pigments() -> Palette {
        Palette(vec![
            // strongly covering white
            PaintCoeff::new(Vec3::splat(0.02), Vec3::splat(1.2)),
            // red
            PaintCoeff::new(Vec3::new(0.08, 1.1, 1.1), Vec3::new(0.9, 0.15, 0.15)),
            // blue
            PaintCoeff::new(Vec3::new(1.1, 0.9, 0.08), Vec3::new(0.15, 0.2, 0.9)),
            // dark
            PaintCoeff::new(Vec3::splat(1.3), Vec3::splat(0.08)),
        ])
    }

    fn painter_for_target(target: Mat<Vec3>) -> PictureTargetSbrPainter {
        let mut canvas = Canvas::new(target.rows(), target.cols());
        canvas.set_drying_time(Duration::ZERO);
        let mut painter = PictureTargetSbrPainter::new(
            canvas,
            PaintMixer::new(base_pigments()),
            Box::new(FootprintBrush::new(8.0)),
            target,
        );
        painter.params_input.smooth_iterations = 1;
        painter.params_input.nr_colors = 4;
        painter.params_input.thinning_volume = 0.0;
        painter.params_stroke.brush_sizes = vec![16.0];
        painter.params_stroke.thickness_scale = 1.0;
        painter.params_convergence.max_iterations = 2;
        painter.params_convergence.rms_local = 0.1;
        painter.params_convergence.rms_global = 0.02;
        painter
    }

    #[test]
    fn test_trivial_target_converges_immediately() {
        // the canvas already matches a near-white target
        let target = Mat::filled(64, 64, Vec3::splat(0.97));
        let mut painter = painter_for_target(target);
        let converged = painter.paint().unwrap();
        assert!(converged, "near-white target should converge right away");
        // and no paint was needed
        let wet: f64 = painter.canvas().paint_layer().v().data().iter().sum();
        assert_eq!(wet, 0.0);
    }

    #[test]
    fn test_painting_reduces_difference() {
        let target = Mat::filled(64, 64, Vec3::new(0.75, 0.15, 0.15));
        let mut painter = painter_for_target(target.clone());
        painter.params_convergence.max_iterations = 1;
        painter.params_convergence.rms_global = 0.0;

        let con = ColorConverter::default();
        let mean_diff = |canvas: &Canvas| {
            let rgb = Renderer::new().compose_canvas(canvas);
            let mut acc = 0.0;
            for i in 0..rgb.len() {
                let lab_canvas = con.rgb_to_lab(rgb.at_index(i));
                let lab_target = con.srgb_to_lab(target.at_index(i));
                acc += ColorConverter::color_difference(lab_canvas, lab_target);
            }
            acc / rgb.len() as f64
        };

        let before = mean_diff(painter.canvas());
        let _ = painter.paint().unwrap();
        let after = mean_diff(painter.canvas());

        let wet: f64 = painter.canvas().paint_layer().v().data().iter().sum();
        assert!(wet > 0.0, "painter deposited nothing");
        assert!(after < before, "difference grew: {before} -> {after}");
    }

    #[test]
    fn test_empty_target_is_invalid() {
        let mut painter = painter_for_target(Mat::new(0, 0));
        assert!(matches!(painter.paint(), Err(SbrError::InvalidInput(_))));
    }

    #[test]
    fn test_coat_canvas_primes_substrate() {
        let target = Mat::filled(32, 32, Vec3::splat(0.5));
        let mut painter = painter_for_target(target);
        painter.set_coat_canvas(true);
        painter.coat();
        // coat is dried: wet layer empty, height raised
        let wet: f64 = painter.canvas().paint_layer().v().data().iter().sum();
        assert_eq!(wet, 0.0);
        assert!(painter.canvas().height()[(16, 16)] > 0.0);
    }

    #[test]
    fn test_find_best_paint_prefers_matching_color() {
        let palette = base_pigments();
        // target red over a white canvas
        let index = PictureTargetSbrPainter::find_best_paint_index(
            Vec3::new(0.7, 0.1, 0.1),
            Vec3::ONE,
            &palette,
        );
        assert_eq!(index, Some(1));
    }

    #[test]
    fn test_find_best_paint_none_when_current_wins() {
        let palette = base_pigments();
        // the canvas already shows the target color; nothing beats it
        let index = PictureTargetSbrPainter::find_best_paint_index(
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(0.5, 0.5, 0.5),
            &palette,
        );
        assert_eq!(index, None);
    }
}
