//! Catmull-Rom and cubic spline evaluation over four control points
//! and over whole polylines.

use std::ops::{Add, Mul, Sub};

/// Catmull-Rom interpolation (tension 0.5) of the segment p0 -> p1 with
/// outer control points p_prev and p2, at t in [0, 1].
pub fn catmull_rom<T>(p_prev: T, p0: T, p1: T, p2: T, t: f64) -> T
where
    T: Copy + Add<Output = T> + Mul<f64, Output = T>,
{
    const TAU: f64 = 0.5;
    let t2 = t * t;
    let t3 = t2 * t;

    let b1 = -TAU * t + 2.0 * TAU * t2 - TAU * t3;
    let b2 = 1.0 + (TAU - 3.0) * t2 + (2.0 - TAU) * t3;
    let b3 = TAU * t + (3.0 - 2.0 * TAU) * t2 + (TAU - 2.0) * t3;
    let b4 = -TAU * t2 + TAU * t3;

    p_prev * b1 + p0 * b2 + p1 * b3 + p2 * b4
}

/// First derivative of [`catmull_rom`] with respect to t.
pub fn catmull_rom_derivative<T>(p_prev: T, p0: T, p1: T, p2: T, t: f64) -> T
where
    T: Copy + Add<Output = T> + Mul<f64, Output = T>,
{
    const TAU: f64 = 0.5;
    let t2 = t * t;

    let b1 = TAU * (-3.0 * t2 + 4.0 * t - 1.0);
    let b2 = -t * (-2.0 * TAU + 3.0 * (TAU - 2.0) * t + 6.0);
    let b3 = (t - 1.0) * (3.0 * (TAU - 2.0) * t - TAU);
    let b4 = TAU * t * (3.0 * t - 2.0);

    p_prev * b1 + p0 * b2 + p1 * b3 + p2 * b4
}

/// Plain cubic interpolation of the segment p0 -> p1.
pub fn cubic<T>(p_prev: T, p0: T, p1: T, p2: T, t: f64) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f64, Output = T>,
{
    let t2 = t * t;
    let a0 = p2 - p1 - p_prev + p0;
    let a1 = p_prev - p0 - a0;
    let a2 = p1 - p_prev;
    let a3 = p0;

    a0 * (t * t2) + a1 * t2 + a2 * t + a3
}

/// First derivative of [`cubic`] with respect to t.
pub fn cubic_derivative<T>(p_prev: T, p0: T, p1: T, p2: T, t: f64) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f64, Output = T>,
{
    let t2 = t * t;
    let a0 = p2 - p1 - p_prev + p0;
    let a1 = p_prev - p0 - a0;
    let a2 = p1 - p_prev;

    a0 * (3.0 * t2) + a1 * (2.0 * t) + a2
}

/// Second derivative of [`cubic`] with respect to t.
pub fn cubic_derivative_second<T>(p_prev: T, p0: T, p1: T, p2: T, t: f64) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f64, Output = T>,
{
    let a0 = p2 - p1 - p_prev + p0;
    let a1 = p_prev - p0 - a0;

    (a0 * (3.0 * t) + a1) * 2.0
}

/// Evaluates a spline through a list of control points at a global
/// parameter u in [0, 1]; more than four control points are allowed,
/// end indices are clamped.
pub struct SplineEval<'a, T> {
    points: &'a [T],
}

impl<'a, T> SplineEval<'a, T>
where
    T: Copy + Add<Output = T> + Mul<f64, Output = T>,
{
    pub fn new(points: &'a [T]) -> Self {
        Self { points }
    }

    pub fn catmull_rom(&self, u: f64) -> T {
        let (index, t) = self.control(u);
        catmull_rom(
            self.clamped(index - 1),
            self.clamped(index),
            self.clamped(index + 1),
            self.clamped(index + 2),
            t,
        )
    }

    pub fn catmull_rom_derivative(&self, u: f64) -> T {
        let (index, t) = self.control(u);
        catmull_rom_derivative(
            self.clamped(index - 1),
            self.clamped(index),
            self.clamped(index + 1),
            self.clamped(index + 2),
            t,
        )
    }

    fn control(&self, u: f64) -> (i64, f64) {
        let n = self.points.len();
        let x = (n as f64 - 1.0) * u;
        let index = x.floor() as i64;
        (index, x - x.floor())
    }

    fn clamped(&self, index: i64) -> T {
        let n = self.points.len() as i64;
        self.points[index.clamp(0, n - 1) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec::Vec2;

    #[test]
    fn test_endpoints() {
        let p = [1.0, 2.0, 5.0, 6.0];
        assert!((catmull_rom(p[0], p[1], p[2], p[3], 0.0) - p[1]).abs() < 1e-12);
        assert!((catmull_rom(p[0], p[1], p[2], p[3], 1.0) - p[2]).abs() < 1e-12);
    }

    #[test]
    fn test_straight_line_stays_straight() {
        let pts: Vec<Vec2> = (0..5).map(|i| Vec2::new(i as f64, 2.0 * i as f64)).collect();
        let spline = SplineEval::new(&pts);
        for i in 0..=20 {
            let u = i as f64 / 20.0;
            let p = spline.catmull_rom(u);
            assert!((p.y - 2.0 * p.x).abs() < 1e-9, "point off line: {p:?}");
        }
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let pts: Vec<Vec2> = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 2.0),
            Vec2::new(3.0, 1.0),
            Vec2::new(4.0, 4.0),
        ];
        let spline = SplineEval::new(&pts);
        let u = 0.4;
        let h = 1e-6;
        let num = (spline.catmull_rom(u + h) - spline.catmull_rom(u - h)) * (1.0 / (2.0 * h));
        // derivative of the global parameterization carries the (n - 1) chain factor
        let ana = spline.catmull_rom_derivative(u) * (pts.len() as f64 - 1.0);
        assert!((num - ana).length() < 1e-4);
    }

    #[test]
    fn test_cubic_endpoints() {
        let (a, b, c, d) = (1.0, 2.0, 5.0, 6.0);
        assert!((cubic(a, b, c, d, 0.0) - b).abs() < 1e-12);
        assert!((cubic(a, b, c, d, 1.0) - c).abs() < 1e-12);
    }

    #[test]
    fn test_cubic_derivatives_match_finite_differences() {
        let p = (
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 3.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(4.0, 0.0),
        );
        let t = 0.37;
        let h = 1e-6;
        let num1 = (cubic(p.0, p.1, p.2, p.3, t + h) - cubic(p.0, p.1, p.2, p.3, t - h))
            * (1.0 / (2.0 * h));
        let ana1 = cubic_derivative(p.0, p.1, p.2, p.3, t);
        assert!((num1 - ana1).length() < 1e-4);

        let num2 = (cubic_derivative(p.0, p.1, p.2, p.3, t + h)
            - cubic_derivative(p.0, p.1, p.2, p.3, t - h))
            * (1.0 / (2.0 * h));
        let ana2 = cubic_derivative_second(p.0, p.1, p.2, p.3, t);
        assert!((num2 - ana2).length() < 1e-4);
    }

    #[test]
    fn test_eval_clamps_at_ends() {
        let pts = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0)];
        let spline = SplineEval::new(&pts);
        let start = spline.catmull_rom(0.0);
        let end = spline.catmull_rom(1.0);
        assert!((start - pts[0]).length() < 1e-12);
        assert!((end - pts[1]).length() < 1e-12);
    }
}
