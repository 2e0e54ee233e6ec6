//! Scalar math helpers shared by the optics, brushes and image
//! operators.

use std::ops::{Add, Mul};

use crate::error::CoreError;
use crate::vec::Vec2;

/// Fuzzy floating point comparison.
#[inline]
pub fn fuzzy_compare(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

/// Hyperbolic cotangent with the overflow cutoff used by the
/// Kubelka-Munk evaluation: `coth(x) = 1` for x > 20, `coth(0) = +inf`.
pub fn coth(x: f64) -> f64 {
    if x > 20.0 {
        return 1.0;
    }
    if x.abs() > 0.0 {
        let res = x.cosh() / x.sinh();
        if res.is_nan() { 1.0 } else { res }
    } else {
        f64::INFINITY
    }
}

/// Inverse hyperbolic cotangent; `acoth(1) = +inf`.
pub fn acoth(x: f64) -> f64 {
    if fuzzy_compare(x, 1.0, 100.0 * f64::EPSILON) {
        return f64::INFINITY;
    }
    ((x + 1.0) / (x - 1.0)).ln() / 2.0
}

#[inline]
pub fn lerp<T>(p0: T, p1: T, t: f64) -> T
where
    T: Add<Output = T> + Mul<f64, Output = T>,
{
    p0 * (1.0 - t) + p1 * t
}

#[inline]
pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Normalize an angle into (-pi/2, pi/2], the symmetry range of a brush
/// footprint rotation.
pub fn normalize_angle(angle: f64) -> f64 {
    use std::f64::consts::{FRAC_PI_2, PI};
    let mut a = angle;
    while a <= -FRAC_PI_2 {
        a += PI;
    }
    while a > FRAC_PI_2 {
        a -= PI;
    }
    a
}

/// 1-D Gaussian.
#[inline]
pub fn gauss(x: f64, sigma: f64) -> f64 {
    let s2 = sigma * sigma;
    (-x * x / (2.0 * s2)).exp() / (std::f64::consts::PI * 2.0 * s2).sqrt()
}

/// Point-in-polygon test (crossing number).
pub fn point_in_polygon(polygon: &[Vec2], vertex: Vec2) -> bool {
    let mut inside = false;
    let n = polygon.len();
    for i in 0..n {
        let p_prev = polygon[(i + n - 1) % n];
        let p_curr = polygon[i];
        if ((p_curr.y > vertex.y) != (p_prev.y > vertex.y))
            && (vertex.x
                < (p_prev.x - p_curr.x) * (vertex.y - p_curr.y) / (p_prev.y - p_curr.y)
                    + p_curr.x)
        {
            inside = !inside;
        }
    }
    inside
}

/// Generalized barycentric coordinate interpolation over an arbitrary
/// polygon (Hormann-Floater mean value coordinates).
///
/// `polygon` lists the 2-D vertices in winding order, `values` the value
/// attached to each vertex. A single-vertex polygon returns that
/// vertex's value; a position on a vertex or an edge interpolates
/// exactly.
pub fn barycentric_interpolate<V>(
    polygon: &[Vec2],
    position: Vec2,
    values: &[V],
) -> Result<V, CoreError>
where
    V: Copy + Add<Output = V> + Mul<f64, Output = V>,
{
    const EPS: f64 = f64::EPSILON * 100.0;

    if polygon.is_empty() || values.is_empty() {
        return Err(CoreError::InvalidInput("polygon is empty".into()));
    }
    if polygon.len() != values.len() {
        return Err(CoreError::InvalidInput(
            "polygon size differs from values size".into(),
        ));
    }
    let n = polygon.len();
    if n == 1 {
        return Ok(values[0]);
    }

    let s: Vec<Vec2> = polygon.iter().map(|&p| p - position).collect();
    let mut r = vec![0.0; n];
    let mut area = vec![0.0; n];
    let mut dot = vec![0.0; n];

    for i in 0..n {
        let si = s[i];
        let si1 = s[(i + 1) % n];

        r[i] = si.length();
        if fuzzy_compare(r[i], 0.0, EPS) {
            return Ok(values[i]);
        }

        let det = si.x * si1.y - si1.x * si.y;
        area[i] = det / 2.0;
        dot[i] = si.dot(si1);

        if fuzzy_compare(area[i], 0.0, EPS) && dot[i] < 0.0 {
            // on the edge between vertex i and i + 1
            let ri1 = si1.length();
            let fi1 = values[(i + 1) % n];
            return Ok((values[i] * ri1 + fi1 * r[i]) * (1.0 / (r[i] + ri1)));
        }
    }

    let mut f: Option<V> = None;
    let mut weight_sum = 0.0;

    for i in 0..n {
        let mut w = 0.0;
        let a_prev = area[(i + n - 1) % n];
        if a_prev != 0.0 {
            let r_prev = r[(i + n - 1) % n];
            let d_prev = dot[(i + n - 1) % n];
            w += (r_prev - d_prev / r[i]) / a_prev;
        }
        if area[i] != 0.0 {
            let ri1 = r[(i + 1) % n];
            w += (ri1 - dot[i] / r[i]) / area[i];
        }
        let term = values[i] * w;
        f = Some(match f {
            Some(acc) => acc + term,
            None => term,
        });
        weight_sum += w;
    }

    match f {
        Some(acc) if !fuzzy_compare(weight_sum, 0.0, EPS) => Ok(acc * (1.0 / weight_sum)),
        _ => Ok(values[0]),
    }
}
