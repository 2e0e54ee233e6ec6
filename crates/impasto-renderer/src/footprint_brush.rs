//! The footprint brush: imprints a rotated brush-head disk stepwise
//! along a path, exchanging paint between the canvas and an internal
//! pickup map.

use std::time::Instant;

use impasto_core::mat::Mat;
use impasto_core::spline::{catmull_rom, catmull_rom_derivative};
use impasto_core::vec::{Vec2, Vec3};
use tracing::debug;

use crate::brush::Brush;
use crate::canvas::Canvas;
use crate::paint_layer::PaintLayer;

/// Radially symmetric default footprint: a cosine-falloff disk, used
/// when no scanned footprint image is supplied.
pub fn default_footprint(diameter: usize) -> Mat<f64> {
    use std::f64::consts::FRAC_PI_2;
    let diameter = diameter.max(3);
    let center = (diameter as f64 - 1.0) * 0.5;
    Mat::from_fn(diameter, diameter, |r, c| {
        let d = Vec2::new(c as f64 - center, r as f64 - center).length() / (center + 0.5);
        if d >= 1.0 { 0.0 } else { (FRAC_PI_2 * d).cos() }
    })
}

/// Brush head pressed vertically onto the canvas, dragged in discrete
/// imprints.
#[derive(Debug, Clone)]
pub struct FootprintBrush {
    radius: f64,
    size_map: usize,
    footprint_full_size: Mat<f64>,
    footprint: Mat<f64>,
    pickup_map: PaintLayer,
    snapshot_buffer: PaintLayer,
    use_snapshot: bool,
    pickup_capacity: f64,
    pickup_rate: f64,
    deposition_rate: f64,
    thickness_scale: f64,
    paint: [Vec3; 2],
}

impl FootprintBrush {
    /// Create a brush from a full-resolution footprint image; the
    /// image is resized to the brush diameter on every radius change.
    pub fn with_footprint(footprint_image: Mat<f64>, radius: f64) -> Self {
        let mut brush = Self {
            radius: 0.0,
            size_map: 0,
            footprint_full_size: footprint_image,
            footprint: Mat::new(0, 0),
            pickup_map: PaintLayer::new(0, 0),
            snapshot_buffer: PaintLayer::new(0, 0),
            use_snapshot: false,
            pickup_capacity: 1.0,
            pickup_rate: 0.9,
            deposition_rate: 0.05,
            thickness_scale: 1.0,
            paint: [Vec3::splat(0.1), Vec3::splat(0.1)],
        };
        Brush::set_radius(&mut brush, radius);
        brush
    }

    /// Create a brush with the synthesized default footprint.
    pub fn new(radius: f64) -> Self {
        let diameter = (2.0 * radius.max(1.0).ceil() + 1.0) as usize;
        Self::with_footprint(default_footprint(diameter.max(64)), radius)
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn footprint(&self) -> &Mat<f64> {
        &self.footprint
    }

    pub fn pickup_map(&self) -> &PaintLayer {
        &self.pickup_map
    }

    pub fn pickup_rate(&self) -> f64 {
        self.pickup_rate
    }

    pub fn set_pickup_rate(&mut self, rate: f64) {
        self.pickup_rate = rate;
    }

    pub fn deposition_rate(&self) -> f64 {
        self.deposition_rate
    }

    pub fn set_deposition_rate(&mut self, rate: f64) {
        self.deposition_rate = rate;
    }

    pub fn use_snapshot_buffer(&self) -> bool {
        self.use_snapshot
    }

    pub fn set_use_snapshot_buffer(&mut self, use_snapshot: bool) {
        self.use_snapshot = use_snapshot;
    }

    /// Empty the pickup map.
    pub fn clean(&mut self) {
        self.pickup_map.clear();
    }

    /// Press the footprint onto the canvas at `center` with yaw
    /// `theta`: paint is first picked up into the map, then deposited.
    pub fn imprint(&mut self, center: Vec2, theta: f64, canvas: &mut Canvas) {
        let h = self.footprint.rows() as i64;
        let w = self.footprint.cols() as i64;
        let hr = (h - 1) / 2;
        let wr = (w - 1) / 2;

        if self.use_snapshot {
            self.update_snapshot(canvas, center);
        }

        let now = Instant::now();
        let (sin_t, cos_t) = (-theta).sin_cos();

        for row in -hr..=hr {
            for col in -wr..=wr {
                let canvas_x = col + center.x as i64;
                let canvas_y = row + center.y as i64;
                if canvas_x < 0
                    || canvas_y < 0
                    || canvas_x >= canvas.cols() as i64
                    || canvas_y >= canvas.rows() as i64
                {
                    continue;
                }

                // footprint cell rotated by -theta about the center
                let rotated_col = col as f64 * cos_t - row as f64 * sin_t;
                let rotated_row = col as f64 * sin_t + row as f64 * cos_t;
                let map_x = (rotated_col + wr as f64).round() as i64;
                let map_y = (rotated_row + hr as f64).round() as i64;
                if map_x < 0
                    || map_y < 0
                    || map_x >= self.size_map as i64
                    || map_y >= self.size_map as i64
                {
                    continue;
                }

                let (cx, cy) = (canvas_x as usize, canvas_y as usize);
                let (mx, my) = (map_x as usize, map_y as usize);

                canvas.check_dry(cx, cy, now);

                if self.use_snapshot {
                    // pickup reads the lagged copy, volume bookkeeping
                    // still happens on the live layer
                    let (k, s, v) = (
                        self.snapshot_buffer.k()[(cy, cx)],
                        self.snapshot_buffer.s()[(cy, cx)],
                        self.snapshot_buffer.v()[(cy, cx)],
                    );
                    self.pickup_from_cell(cy, cx, my, mx, k, s, v, canvas.paint_layer_mut());
                } else {
                    let (k, s, v) = (
                        canvas.paint_layer().k()[(cy, cx)],
                        canvas.paint_layer().s()[(cy, cx)],
                        canvas.paint_layer().v()[(cy, cx)],
                    );
                    self.pickup_from_cell(cy, cx, my, mx, k, s, v, canvas.paint_layer_mut());
                }

                self.deposit_to_cell(cy, cx, my, mx, canvas.paint_layer_mut());
            }
        }
    }

    /// Refresh the snapshot buffer from the canvas everywhere except
    /// inside the current footprint box, so the brush cannot pick its
    /// own just-deposited paint back up within one imprint.
    fn update_snapshot(&mut self, canvas: &Canvas, except_center: Vec2) {
        let layer = canvas.paint_layer();
        if layer.cols() != self.snapshot_buffer.cols()
            || layer.rows() != self.snapshot_buffer.rows()
        {
            layer.copy_to(&mut self.snapshot_buffer);
            return;
        }

        let h = self.footprint.rows() as i64;
        let w = self.footprint.cols() as i64;
        let hr = (h - 1) / 2;
        let wr = (w - 1) / 2;

        let top_left = (except_center.x as i64 - wr, except_center.y as i64 - hr);
        let bottom_right = (except_center.x as i64 + wr, except_center.y as i64 + hr);

        let radius = self.radius as i64;
        let x0 = (top_left.0 - radius).max(0);
        let y0 = (top_left.1 - radius).max(0);
        let x1 = (bottom_right.0 + radius).min(layer.cols() as i64 - 1);
        let y1 = (bottom_right.1 + radius).min(layer.rows() as i64 - 1);

        for row in y0..=y1 {
            for col in x0..=x1 {
                if row > top_left.1 && row < bottom_right.1 && col > top_left.0 && col < bottom_right.0
                {
                    continue;
                }
                let (r, c) = (row as usize, col as usize);
                self.snapshot_buffer.set(
                    r,
                    c,
                    layer.k()[(r, c)],
                    layer.s()[(r, c)],
                    layer.v()[(r, c)],
                );
            }
        }
    }

    /// Volume-weighted average, falling back to `a` when both volumes
    /// vanish.
    fn blend(v_a: f64, a: Vec3, v_b: f64, b: Vec3) -> Vec3 {
        const EPS: f64 = 0.0000001;
        let total = v_a + v_b;
        if total > EPS { (a * v_a + b * v_b) / total } else { a }
    }

    #[allow(clippy::too_many_arguments)]
    fn pickup_from_cell(
        &mut self,
        cy: usize,
        cx: usize,
        my: usize,
        mx: usize,
        source_k: Vec3,
        source_s: Vec3,
        source_v: f64,
        live_layer: &mut PaintLayer,
    ) {
        let footprint_height = self.footprint[(my, mx)];
        if footprint_height <= 0.0 {
            return;
        }

        let v_pickup = self.pickup_map.v()[(my, mx)];
        let v_leave = self.pickup_rate * source_v * footprint_height;
        if v_leave <= 0.0 {
            return;
        }

        // remove from the canvas
        live_layer.v_mut()[(cy, cx)] = live_layer.v()[(cy, cx)] - v_leave;

        // blend into the pickup map
        let k = Self::blend(v_pickup, self.pickup_map.k()[(my, mx)], v_leave, source_k);
        let s = Self::blend(v_pickup, self.pickup_map.s()[(my, mx)], v_leave, source_s);
        self.pickup_map.set(my, mx, k, s, v_pickup + v_leave);
    }

    fn deposit_to_cell(&mut self, cy: usize, cx: usize, my: usize, mx: usize, layer: &mut PaintLayer) {
        let footprint_height = self.footprint[(my, mx)];
        if footprint_height <= 0.0 {
            return;
        }

        let v_pickup = self.pickup_map.v()[(my, mx)];

        // effective source: pickup paint topped up with stored paint
        let v_free = (self.pickup_capacity - v_pickup).max(0.0);
        let k_source = Self::blend(v_pickup, self.pickup_map.k()[(my, mx)], v_free, self.paint[0]);
        let s_source = Self::blend(v_pickup, self.pickup_map.s()[(my, mx)], v_free, self.paint[1]);

        // the deposit drains the pickup map
        let v_pickup_leave = self.deposition_rate * v_pickup * footprint_height;
        self.pickup_map.v_mut()[(my, mx)] = v_pickup - v_pickup_leave;

        let v_canvas = layer.v()[(cy, cx)];
        let v_deposit = self.pickup_capacity * footprint_height * self.thickness_scale;

        let k = Self::blend(v_deposit, k_source, v_canvas, layer.k()[(cy, cx)]);
        let s = Self::blend(v_deposit, s_source, v_canvas, layer.s()[(cy, cx)]);
        layer.set(cy, cx, k, s, v_deposit + v_canvas);
    }
}

impl Brush for FootprintBrush {
    /// Rebuild the footprint and pickup map for a new radius: the
    /// footprint is resized to the brush diameter and zero-padded wide
    /// enough to contain any rotation.
    fn set_radius(&mut self, radius: f64) {
        self.radius = radius;
        let width = (2.0 * radius.ceil() + 1.0) as usize;
        self.size_map = ((2.0_f64).sqrt() * width as f64).ceil() as usize;

        let pad = (self.size_map - width) / 2;
        // rounding of the map size can leave one cell short
        let pad_right = self.size_map - width - pad;
        self.footprint = self
            .footprint_full_size
            .scaled(width, width)
            .padded(pad, pad_right, pad, pad_right, 0.0);
        self.size_map = self.footprint.rows();

        self.pickup_map = PaintLayer::new(self.size_map, self.size_map);
        debug!(radius, size_map = self.size_map, "footprint brush resized");
    }

    /// Dipping cleans the pickup map and stores the new paint.
    fn dip(&mut self, paint: [Vec3; 2]) {
        self.clean();
        self.paint = paint;
    }

    fn set_thickness_scale(&mut self, scale: f64) {
        self.thickness_scale = scale;
    }

    fn thickness_scale(&self) -> f64 {
        self.thickness_scale
    }

    /// Imprint along the path, one imprint per integer step, with the
    /// yaw following the local Catmull-Rom tangent.
    fn paint_stroke(&mut self, path: &[Vec2], canvas: &mut Canvas) {
        if path.len() < 2 {
            return;
        }
        for i in 0..path.len() - 1 {
            let p_prev = path[i.saturating_sub(1)];
            let p0 = path[i];
            let p1 = path[i + 1];

            let dist = (p1 - p0).length();
            let steps = dist as i64;
            for pd in 1..=steps {
                let t = pd as f64 / dist;
                let position = catmull_rom(p_prev, p0, p1, p1, t);
                let direction = catmull_rom_derivative(p_prev, p0, p1, p1, t);
                self.imprint(position, direction.y.atan2(direction.x), canvas);
            }
        }
    }
}
