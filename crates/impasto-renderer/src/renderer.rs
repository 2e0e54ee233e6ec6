//! Composing the canvas to a displayable image, optionally with
//! Cook-Torrance relief shading driven by the height of the paint.

use impasto_core::kubelka_munk::compute_reflectance;
use impasto_core::mat::Mat;
use impasto_core::vec::{Vec2, Vec3};
use rayon::prelude::*;

use crate::canvas::Canvas;
use crate::paint_layer::PaintLayer;

/// Renders canvases to linear RGB images.
#[derive(Debug, Clone, Default)]
pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Self
    }

    /// Compose a wet layer onto a substrate reflectance.
    pub fn compose(&self, paint_layer: &PaintLayer, r0: &Mat<Vec3>) -> Mat<Vec3> {
        let cols = r0.cols();
        let mut out = Mat::new(r0.rows(), cols);
        out.data_mut()
            .par_chunks_mut(cols.max(1))
            .enumerate()
            .for_each(|(r, row)| {
                for (c, cell) in row.iter_mut().enumerate() {
                    *cell = compute_reflectance(
                        paint_layer.k()[(r, c)],
                        paint_layer.s()[(r, c)],
                        r0[(r, c)],
                        paint_layer.v()[(r, c)],
                    );
                }
            });
        out
    }

    /// Compose the current wet layer of a canvas onto its substrate.
    pub fn compose_canvas(&self, canvas: &Canvas) -> Mat<Vec3> {
        self.compose(canvas.paint_layer(), canvas.r0())
    }

    /// Render the canvas with a single light: Cook-Torrance with a
    /// Beckmann microfacet distribution over the paint relief.
    pub fn render(&self, canvas: &Canvas) -> Mat<Vec3> {
        let composed = self.compose_canvas(canvas);
        let (rows, cols) = (composed.rows(), composed.cols());

        // relief is dried height plus the wet layer
        let height = Mat::from_fn(rows, cols, |r, c| {
            canvas.height()[(r, c)] + canvas.paint_layer().v()[(r, c)]
        });

        let light_pos = Vec3::new(-200.0, -1500.0, -2000.0);
        let eye_pos = Vec3::new(cols as f64 / 2.0, rows as f64 / 2.0, -100.0);
        let light_power = Vec3::splat(15.0);
        let specular_color = Vec3::ONE; // Schlick F0
        let roughness = 0.5;
        let specular_amount = 0.2;

        let geometric = |n_dot_h: f64, n_dot_v: f64, v_dot_h: f64, n_dot_l: f64| -> f64 {
            let g1 = 2.0 * n_dot_h * n_dot_v / v_dot_h;
            let g2 = 2.0 * n_dot_h * n_dot_l / v_dot_h;
            g1.min(g2).min(1.0)
        };
        let fresnel = |v_dot_h: f64, ks: Vec3| -> Vec3 {
            ks + (Vec3::ONE - ks) * (1.0 - v_dot_h).powi(5)
        };
        let beckmann = |n_dot_h: f64, m: f64| -> f64 {
            let a = 1.0 / (m * m + n_dot_h.powi(4) * std::f64::consts::PI);
            let b = (-(n_dot_h.acos().tan().powi(2)) / (m * m)).exp();
            a * b
        };

        let mut out = Mat::new(rows, cols);
        out.data_mut()
            .par_chunks_mut(cols.max(1))
            .enumerate()
            .for_each(|(i, row)| {
                for (j, cell) in row.iter_mut().enumerate() {
                    let s11 = height[(i, j)];
                    let s01 = height.bilinear(Vec2::new(j as f64 - 1.0, i as f64));
                    let s21 = height.bilinear(Vec2::new(j as f64 + 1.0, i as f64));
                    let s10 = height.bilinear(Vec2::new(j as f64, i as f64 - 1.0));
                    let s12 = height.bilinear(Vec2::new(j as f64, i as f64 + 1.0));

                    let va = Vec3::new(2.0, 0.0, s21 - s01).normalize();
                    let vb = Vec3::new(0.0, 2.0, s12 - s10).normalize();
                    let mut n = va.cross(vb).normalize();
                    n.z *= -1.0;

                    let pix_pos = Vec3::new(j as f64, i as f64, s11);
                    let light_dir = (light_pos - pix_pos).normalize();
                    let v = (eye_pos - pix_pos).normalize();
                    let h = (v + light_dir).normalize();

                    let kd = composed[(i, j)];
                    let ambient = kd * 0.2;

                    let n_dot_h = n.dot(h).max(0.0);
                    let v_dot_h = v.dot(h).max(0.0);
                    let n_dot_v = n.dot(v).max(0.0);
                    let n_dot_l = n.dot(light_dir).max(0.0);

                    let specular = if n_dot_l > 0.0 && n_dot_v > 0.0 && v_dot_h > 0.0 {
                        fresnel(v_dot_h, specular_color)
                            * (beckmann(n_dot_h, roughness)
                                * geometric(n_dot_h, n_dot_v, v_dot_h, n_dot_l))
                            / (n_dot_l * n_dot_v)
                    } else {
                        Vec3::ZERO
                    };

                    let falloff =
                        1.0 / (4.0 * std::f64::consts::PI * (light_pos - pix_pos).length_squared());
                    let beta = light_power * falloff;
                    let result = beta * n_dot_l
                        * (kd * (1.0 - specular_amount) + specular * specular_amount)
                        + ambient * kd;

                    *cell = result.clamp(Vec3::ZERO, Vec3::ONE);
                }
            });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use impasto_core::vec::Vec3;

    #[test]
    fn test_compose_empty_layer_returns_substrate() {
        let canvas = Canvas::new(8, 8);
        let composed = Renderer::new().compose_canvas(&canvas);
        for &v in composed.data() {
            assert!((v - Vec3::ONE).abs().max_element() < 1e-9);
        }
    }

    #[test]
    fn test_compose_wet_layer_darkens_white() {
        let mut canvas = Canvas::new(4, 4);
        canvas
            .paint_layer_mut()
            .set(2, 2, Vec3::new(0.5, 0.5, 0.5), Vec3::new(0.2, 0.2, 0.2), 1.0);
        let composed = Renderer::new().compose_canvas(&canvas);
        assert!(composed[(2, 2)].x < 1.0);
        assert!((composed[(0, 0)] - Vec3::ONE).abs().max_element() < 1e-9);
    }

    #[test]
    fn test_render_output_clamped() {
        let mut canvas = Canvas::new(16, 16);
        for y in 4..12 {
            for x in 4..12 {
                canvas
                    .paint_layer_mut()
                    .set(y, x, Vec3::new(0.4, 0.1, 0.6), Vec3::splat(0.3), 0.8);
            }
        }
        let lit = Renderer::new().render(&canvas);
        for &v in lit.data() {
            assert!(v.min_element() >= 0.0);
            assert!(v.max_element() <= 1.0);
        }
    }

    #[test]
    fn test_flat_canvas_renders_uniform() {
        let canvas = Canvas::new(12, 12);
        let lit = Renderer::new().render(&canvas);
        // zero relief: neighboring pixels should shade almost alike
        let d = (lit[(6, 6)] - lit[(6, 7)]).abs().max_element();
        assert!(d < 1e-3, "non-uniform flat shading: {d}");
    }
}
