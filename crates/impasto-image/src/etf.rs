//! Edge tangent flow: the field of normalized minor eigenvectors of a
//! structure tensor field.

use impasto_core::mat::Mat;
use impasto_core::math::fuzzy_compare;
use impasto_core::vec::{Vec2, Vec3};

/// Reduce a tensor field to its edge-tangent flow. Degenerate tensors
/// map to the vertical default (0, 1); NaN components are treated as 0.
pub fn compute_edge_tangent_flow(tensors: &Mat<Vec3>) -> Mat<Vec2> {
    Mat::from_fn(tensors.rows(), tensors.cols(), |r, c| {
        let t = tensors[(r, c)];
        let e = if t.x.is_nan() { 0.0 } else { t.x };
        let f = if t.y.is_nan() { 0.0 } else { t.y };
        let g = if t.z.is_nan() { 0.0 } else { t.z };

        let det = ((e - g) * (e - g) + 4.0 * f * f).sqrt();
        let v = Vec2::new(2.0 * f, g - e - det);
        let m = v.length();
        if fuzzy_compare(m, 0.0, f64::EPSILON * 1000.0) {
            Vec2::new(0.0, 1.0)
        } else {
            v / m
        }
    })
}

/// Visualize a flow field by advecting binary noise along it
/// (line integral convolution). Debug output only.
pub fn line_integral_convolution(etf: &Mat<Vec2>, sigma: f64, seed: u64) -> Mat<f64> {
    let (rows, cols) = (etf.rows(), etf.cols());
    let mut out = Mat::new(rows, cols);

    let half_len = (2.0 * (-(0.1_f64).ln() * 2.0 * sigma * sigma).sqrt().floor() + 1.0) as i32 / 2;

    let mut rng = fastrand::Rng::with_seed(seed);
    let coarse = Mat::from_fn(rows.div_ceil(4).max(1), cols.div_ceil(4).max(1), |_, _| {
        if rng.f64() < 0.5 { 0.0 } else { 1.0 }
    });
    let noise = Mat::from_fn(rows, cols, |r, c| coarse[(r / 4, c / 4)]);

    for y in 0..rows {
        for x in 0..cols {
            let mut c = 0.0;
            let mut g = 0.0;
            for dir in [1.0, -1.0] {
                let mut v0 = etf[(y, x)] * dir;
                let mut p = Vec2::new(x as f64, y as f64);
                for i in 0..half_len {
                    let mut v1 = etf.bilinear(p) * dir;
                    if v1.dot(v0) < 0.0 {
                        v1 = -v1;
                    }
                    p += v1;
                    if p.x.is_nan()
                        || p.y.is_nan()
                        || p.x < 0.0
                        || p.x >= cols as f64
                        || p.y < 0.0
                        || p.y >= rows as f64
                    {
                        break;
                    }
                    v0 = v1;
                    let gw = (-((i * i) as f64) / (2.0 * sigma * sigma)).exp();
                    c += gw * noise[(p.y as usize, p.x as usize)];
                    g += gw;
                }
            }
            out[(y, x)] = if g > 0.0 { c / g } else { 0.0 };
        }
    }
    out
}
