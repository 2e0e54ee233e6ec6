//! Separable Gaussian filtering, Sobel derivatives and the
//! edge-aware domain-transform filter.

use std::ops::{Add, Mul};

use impasto_core::mat::{Mat, border_reflect};
use impasto_core::math::gauss;
use impasto_core::vec::Vec3;

/// Kernel size covering a Gaussian down to 10% of its peak.
pub fn gauss_kernel_size_from_sigma(sigma: f64) -> usize {
    (2.0 * (-(0.1_f64).ln() * 2.0 * sigma * sigma).sqrt().floor() + 1.0) as usize
}

/// Matching sigma for a given kernel size (OpenCV convention).
pub fn gauss_sigma_from_kernel_size(size: f64) -> f64 {
    0.3 * ((size - 1.0) * 0.5 - 1.0) + 0.8
}

fn gauss_kernel(sigma: f64) -> Vec<f64> {
    let size = gauss_kernel_size_from_sigma(sigma).max(1) | 1;
    let half = (size / 2) as i64;
    let mut kernel: Vec<f64> = (-half..=half).map(|i| gauss(i as f64, sigma)).collect();
    let sum: f64 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Separable Gaussian blur with a reflecting border. No-op for
/// non-positive sigma.
pub fn gaussian_blur<T>(src: &Mat<T>, sigma: f64) -> Mat<T>
where
    T: Copy + Default + Add<Output = T> + Mul<f64, Output = T>,
{
    if sigma <= 0.0 || src.is_empty() {
        return src.clone();
    }
    let kernel = gauss_kernel(sigma);
    let half = (kernel.len() / 2) as i64;
    let (rows, cols) = (src.rows(), src.cols());

    // horizontal pass
    let horizontal = Mat::from_fn(rows, cols, |r, c| {
        let mut acc = T::default();
        for (ki, &w) in kernel.iter().enumerate() {
            let x = border_reflect(c as i64 + ki as i64 - half, cols);
            acc = acc + src[(r, x)] * w;
        }
        acc
    });
    // vertical pass
    Mat::from_fn(rows, cols, |r, c| {
        let mut acc = T::default();
        for (ki, &w) in kernel.iter().enumerate() {
            let y = border_reflect(r as i64 + ki as i64 - half, rows);
            acc = acc + horizontal[(y, c)] * w;
        }
        acc
    })
}

/// Horizontal Sobel derivative (3x3), reflecting border.
pub fn sobel_x<T>(src: &Mat<T>) -> Mat<T>
where
    T: Copy + Default + Add<Output = T> + Mul<f64, Output = T>,
{
    sobel(src, true)
}

/// Vertical Sobel derivative (3x3), reflecting border.
pub fn sobel_y<T>(src: &Mat<T>) -> Mat<T>
where
    T: Copy + Default + Add<Output = T> + Mul<f64, Output = T>,
{
    sobel(src, false)
}

fn sobel<T>(src: &Mat<T>, horizontal: bool) -> Mat<T>
where
    T: Copy + Default + Add<Output = T> + Mul<f64, Output = T>,
{
    const KX: [[f64; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
    const KY: [[f64; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];
    let kernel = if horizontal { &KX } else { &KY };
    let (rows, cols) = (src.rows(), src.cols());
    Mat::from_fn(rows, cols, |r, c| {
        let mut acc = T::default();
        for dr in 0..3 {
            for dc in 0..3 {
                let y = border_reflect(r as i64 + dr as i64 - 1, rows);
                let x = border_reflect(c as i64 + dc as i64 - 1, cols);
                acc = acc + src[(y, x)] * kernel[dr][dc];
            }
        }
        acc
    })
}

/// Edge-aware smoothing by the recursive domain transform
/// (Gastal & Oliveira 2011, RF variant). The guide image drives the
/// edge weights; three iterations with per-iteration sigma scaling.
pub fn filter_domain_transform(
    guide: &Mat<Vec3>,
    src: &Mat<Vec3>,
    sigma_s: f64,
    sigma_r: f64,
) -> Mat<Vec3> {
    const ITERATIONS: u32 = 3;
    if sigma_s <= 0.0 || sigma_r <= 0.0 {
        return src.clone();
    }
    let (rows, cols) = (src.rows(), src.cols());
    assert!(guide.rows() == rows && guide.cols() == cols, "guide size mismatch");

    let ratio = sigma_s / sigma_r;
    // domain transform derivatives along rows and columns
    let dct_x = Mat::from_fn(rows, cols, |r, c| {
        if c + 1 < cols {
            let d = guide[(r, c + 1)] - guide[(r, c)];
            1.0 + ratio * (d.x.abs() + d.y.abs() + d.z.abs())
        } else {
            1.0
        }
    });
    let dct_y = Mat::from_fn(rows, cols, |r, c| {
        if r + 1 < rows {
            let d = guide[(r + 1, c)] - guide[(r, c)];
            1.0 + ratio * (d.x.abs() + d.y.abs() + d.z.abs())
        } else {
            1.0
        }
    });

    let mut out = src.clone();
    let n = ITERATIONS as i32;
    for i in 0..n {
        // sigma for this iteration so that the total variance matches
        let sigma_h = sigma_s * (3.0_f64).sqrt() * 2.0_f64.powi(n - i - 1)
            / (4.0_f64.powi(n) - 1.0).sqrt();
        let alpha = (-(2.0_f64).sqrt() / sigma_h).exp();

        // horizontal: left -> right, then right -> left
        for r in 0..rows {
            for c in 1..cols {
                let a = alpha.powf(dct_x[(r, c - 1)]);
                out[(r, c)] = out[(r, c)] + (out[(r, c - 1)] - out[(r, c)]) * a;
            }
            for c in (0..cols - 1).rev() {
                let a = alpha.powf(dct_x[(r, c)]);
                out[(r, c)] = out[(r, c)] + (out[(r, c + 1)] - out[(r, c)]) * a;
            }
        }
        // vertical: top -> bottom, then bottom -> top
        for c in 0..cols {
            for r in 1..rows {
                let a = alpha.powf(dct_y[(r - 1, c)]);
                out[(r, c)] = out[(r, c)] + (out[(r - 1, c)] - out[(r, c)]) * a;
            }
            for r in (0..rows - 1).rev() {
                let a = alpha.powf(dct_y[(r, c)]);
                out[(r, c)] = out[(r, c)] + (out[(r + 1, c)] - out[(r, c)]) * a;
            }
        }
    }
    out
}
