//! Smudging: dragging wet paint along a stroke with a rotating pickup
//! map.

use impasto_core::mat::Mat;
use impasto_core::math::normalize_angle;
use impasto_core::spline::SplineEval;
use impasto_core::vec::Vec2;

use crate::canvas::Canvas;
use crate::paint_layer::PaintLayer;

/// Transfers below this volume are skipped.
const MIN_VOLUME: f64 = 0.001;

/// Paint exchange between the canvas and a brush-held pickup map,
/// evaluated along the spine of a stroke.
#[derive(Debug, Clone)]
pub struct Smudge {
    max_size: usize,
    pickup_src: PaintLayer,
    pickup_dst: PaintLayer,
    current_rotation: f64,
    pickup_rate: f64,
    deposition_rate: f64,
}

impl Smudge {
    /// `size` is the stroke diameter the pickup maps must cover; it is
    /// rounded up to an odd cell count.
    pub fn new(size: usize) -> Self {
        let max_size = if size % 2 == 0 { size + 1 } else { size };
        let max_size = max_size.max(1);
        Self {
            max_size,
            pickup_src: PaintLayer::new(max_size, max_size),
            pickup_dst: PaintLayer::new(max_size, max_size),
            current_rotation: 0.0,
            pickup_rate: 0.1,
            deposition_rate: 0.1,
        }
    }

    /// Drop all held paint and reset the orientation.
    pub fn clean(&mut self) {
        self.pickup_src.clear();
        self.pickup_dst.clear();
        self.current_rotation = 0.0;
    }

    pub fn set_rates(&mut self, pickup_rate: f64, deposition_rate: f64) {
        self.pickup_rate = pickup_rate;
        self.deposition_rate = deposition_rate;
    }

    /// Smudge the canvas along a stroke spine.
    ///
    /// `bound_min` is the canvas position of the stroke thickness map's
    /// origin, `length` the stroke length in cells; `thickness_map`
    /// masks and weights the exchange.
    pub fn smudge(
        &mut self,
        canvas: &mut Canvas,
        bound_min: Vec2,
        spine: &SplineEval<'_, Vec2>,
        length: f64,
        thickness_map: &Mat<f64>,
    ) {
        let mut max_thickness = 0.0_f64;
        for &t in thickness_map.data() {
            max_thickness = max_thickness.max(t);
        }
        if max_thickness <= 0.0 || length <= 0.0 {
            return;
        }

        let radius = self.max_size as f64 * 0.5;
        let size = self.max_size as i64;

        let mut u = 0.0;
        while u <= 1.0 {
            let center = spine.catmull_rom(u);
            let tangent = spine.catmull_rom_derivative(u).normalize_or(Vec2::X);
            self.update_orientation(tangent);

            let roi_x = (center.x - self.max_size as f64 / 2.0) as i64;
            let roi_y = (center.y - self.max_size as f64 / 2.0) as i64;

            for x in 0..size {
                for y in 0..size {
                    let cp_x = x + roi_x;
                    let cp_y = y + roi_y;
                    if cp_x < 0
                        || cp_y < 0
                        || cp_x >= canvas.cols() as i64
                        || cp_y >= canvas.rows() as i64
                    {
                        continue;
                    }
                    let tp_x = cp_x - bound_min.x as i64;
                    let tp_y = cp_y - bound_min.y as i64;
                    if tp_x < 0
                        || tp_y < 0
                        || tp_x >= thickness_map.cols() as i64
                        || tp_y >= thickness_map.rows() as i64
                    {
                        continue;
                    }

                    let dist = (center - Vec2::new(cp_x as f64, cp_y as f64)).length();
                    if dist > radius {
                        continue;
                    }

                    let thickness = thickness_map[(tp_y as usize, tp_x as usize)];
                    if thickness <= 0.0 {
                        continue;
                    }
                    let weight = thickness / max_thickness;

                    let (cy, cx) = (cp_y as usize, cp_x as usize);
                    let (sy, sx) = (y as usize, x as usize);

                    let canvas_v = canvas.paint_layer().v()[(cy, cx)];
                    let pickup_v = self.pickup_dst.v()[(sy, sx)];

                    // paint picked up from the canvas
                    let canvas_leave = canvas_v * self.pickup_rate * weight;
                    let canvas_rest = canvas_v - canvas_leave;

                    // paint deposited onto the canvas
                    let pickup_leave = pickup_v * self.deposition_rate * weight;
                    let pickup_rest = pickup_v - pickup_leave;

                    let canvas_k = canvas.paint_layer().k()[(cy, cx)];
                    let canvas_s = canvas.paint_layer().s()[(cy, cx)];
                    let pick_k = self.pickup_dst.k()[(sy, sx)];
                    let pick_s = self.pickup_dst.s()[(sy, sx)];

                    let pickup_new = pickup_rest + canvas_leave;
                    if pickup_new > MIN_VOLUME {
                        let inv = 1.0 / pickup_new;
                        self.pickup_dst.set(
                            sy,
                            sx,
                            (pick_k * pickup_rest + canvas_k * canvas_leave) * inv,
                            (pick_s * pickup_rest + canvas_s * canvas_leave) * inv,
                            pickup_new.max(0.0),
                        );
                    }

                    let canvas_new = canvas_rest + pickup_leave;
                    if canvas_new > MIN_VOLUME {
                        let inv = 1.0 / canvas_new;
                        canvas.paint_layer_mut().set(
                            cy,
                            cx,
                            (canvas_k * canvas_rest + pick_k * pickup_leave) * inv,
                            (canvas_s * canvas_rest + pick_s * pickup_leave) * inv,
                            canvas_new.max(0.0),
                        );
                    }
                }
            }
            u += 1.0 / length;
        }
    }

    /// Rotate the pickup map to the new heading, double-buffered:
    /// destination cells whose pre-image falls outside the map carry
    /// the previous value through.
    fn update_orientation(&mut self, heading: Vec2) {
        let theta = heading.y.atan2(heading.x);
        let dtheta = normalize_angle(theta - self.current_rotation);
        self.current_rotation = theta;

        self.pickup_dst.copy_to(&mut self.pickup_src);

        let center = Vec2::new(self.max_size as f64 / 2.0, self.max_size as f64 / 2.0);
        let (sin, cos) = dtheta.sin_cos();

        for x in 0..self.max_size {
            for y in 0..self.max_size {
                let d = Vec2::new(x as f64, y as f64) - center;
                let pickup_pos =
                    Vec2::new(d.x * cos - d.y * sin, d.x * sin + d.y * cos) + center;

                if pickup_pos.x < 0.0
                    || pickup_pos.y < 0.0
                    || pickup_pos.x >= self.max_size as f64
                    || pickup_pos.y >= self.max_size as f64
                {
                    self.pickup_dst.set(
                        y,
                        x,
                        self.pickup_src.k()[(y, x)],
                        self.pickup_src.s()[(y, x)],
                        self.pickup_src.v()[(y, x)],
                    );
                } else {
                    self.pickup_dst.set(
                        y,
                        x,
                        self.pickup_src.k().bilinear(pickup_pos),
                        self.pickup_src.s().bilinear(pickup_pos),
                        self.pickup_src.v().bilinear(pickup_pos),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use impasto_core::vec::Vec3;

    #[test]
    fn test_new_rounds_to_odd() {
        let s = Smudge::new(10);
        assert_eq!(s.max_size, 11);
        let s = Smudge::new(7);
        assert_eq!(s.max_size, 7);
    }

    #[test]
    fn test_smudge_drags_paint_forward() {
        let mut canvas = Canvas::new(32, 32);
        canvas.set_drying_time(std::time::Duration::ZERO);
        // wet paint only in the left half of the stroke corridor
        for y in 12..20 {
            for x in 4..14 {
                canvas
                    .paint_layer_mut()
                    .set(y, x, Vec3::new(0.9, 0.1, 0.1), Vec3::splat(0.5), 1.0);
            }
        }

        let spine_points = vec![Vec2::new(6.0, 16.0), Vec2::new(26.0, 16.0)];
        let spine = SplineEval::new(&spine_points);
        let thickness = Mat::filled(16, 28, 1.0);

        let mut smudge = Smudge::new(8);
        smudge.smudge(&mut canvas, Vec2::new(2.0, 8.0), &spine, 20.0, &thickness);

        // volume appeared to the right of the painted block
        let dragged: f64 = (16..24).map(|x| canvas.paint_layer().v()[(16, x)]).sum();
        assert!(dragged > 0.0, "no paint dragged forward");
        // and the source lost some volume
        assert!(canvas.paint_layer().v()[(16, 8)] < 1.0);
    }

    #[test]
    fn test_clean_zeroes_pickup() {
        let mut canvas = Canvas::new(16, 16);
        canvas.set_drying_time(std::time::Duration::ZERO);
        for i in 0..16 {
            for j in 0..16 {
                canvas
                    .paint_layer_mut()
                    .set(i, j, Vec3::ONE, Vec3::ONE, 1.0);
            }
        }
        let spine_points = vec![Vec2::new(2.0, 8.0), Vec2::new(14.0, 8.0)];
        let spine = SplineEval::new(&spine_points);
        let thickness = Mat::filled(16, 16, 1.0);
        let mut smudge = Smudge::new(6);
        smudge.smudge(&mut canvas, Vec2::ZERO, &spine, 12.0, &thickness);

        smudge.clean();
        let held: f64 = smudge.pickup_dst.v().data().iter().sum();
        assert_eq!(held, 0.0);
        assert_eq!(smudge.current_rotation, 0.0);
    }

    #[test]
    fn test_rotation_carries_outside_cells() {
        let mut smudge = Smudge::new(5);
        // put paint into a corner cell of the pickup map
        smudge.pickup_dst.set(0, 0, Vec3::ONE, Vec3::ONE, 0.5);
        // quarter turn: the corner's pre-image leaves the map, value carries
        smudge.update_orientation(Vec2::new(0.0, 1.0));
        let total: f64 = smudge.pickup_dst.v().data().iter().sum();
        assert!(total > 0.0);
    }
}
