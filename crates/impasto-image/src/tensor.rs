//! Structure tensor fields.
//!
//! Each pixel carries (E, F, G) packed into a `Vec3`, where
//! `(E F; F G)` is the positive-semidefinite tensor accumulated from
//! the RGB spatial gradients. The eigenvector of the smaller eigenvalue
//! follows image edges tangentially.

use impasto_core::mat::Mat;
use impasto_core::vec::{Vec2, Vec3};
use tracing::debug;

use crate::convolution::{filter_domain_transform, gaussian_blur, sobel_x, sobel_y};

/// Smaller eigenvalue of (E F; F G).
pub fn min_eigenvalue(tensor: Vec3) -> f64 {
    let (e, f, g) = (tensor.x, tensor.y, tensor.z);
    let det = ((e - g) * (e - g) + 4.0 * f * f).sqrt();
    (e + g - det) * 0.5
}

/// Larger eigenvalue of (E F; F G).
pub fn max_eigenvalue(tensor: Vec3) -> f64 {
    let (e, f, g) = (tensor.x, tensor.y, tensor.z);
    let det = ((e - g) * (e - g) + 4.0 * f * f).sqrt();
    (e + g + det) * 0.5
}

/// Eigenvector of the smaller eigenvalue (the edge tangent direction),
/// not normalized.
pub fn min_eigenvector(tensor: Vec3) -> Vec2 {
    let (e, f, g) = (tensor.x, tensor.y, tensor.z);
    let det = ((e - g) * (e - g) + 4.0 * f * f).sqrt();
    Vec2::new(2.0 * f, g - e - det)
}

/// Eigenvector of the larger eigenvalue (the gradient direction), not
/// normalized.
pub fn max_eigenvector(tensor: Vec3) -> Vec2 {
    let (e, f, g) = (tensor.x, tensor.y, tensor.z);
    let det = ((e - g) * (e - g) + 4.0 * f * f).sqrt();
    Vec2::new(2.0 * f, g - e + det)
}

/// Compute the structure tensor field of an image (preferably CIELab).
///
/// Gradients are 3x3 Sobel per channel, optionally blurred with
/// `inner_sigma` before the outer products, the tensor components
/// optionally blurred with `outer_sigma` afterwards. Blurs are
/// mask-normalized when a mask is present (masked-out pixels contribute
/// zero and the result is renormalized by the blurred mask). The field
/// is globally scaled so the largest tensor magnitude is 1.
pub fn compute_tensors(
    image: &Mat<Vec3>,
    mask: Option<&Mat<f64>>,
    inner_sigma: f64,
    outer_sigma: f64,
) -> Mat<Vec3> {
    let (rows, cols) = (image.rows(), image.cols());
    debug!(rows, cols, inner_sigma, outer_sigma, "computing structure tensors");

    let mut dx = sobel_x(image);
    let mut dy = sobel_y(image);

    if inner_sigma > 0.0 {
        if let Some(mask) = mask {
            let (bx, by) = {
                zero_masked(&mut dx, mask);
                zero_masked(&mut dy, mask);
                (gaussian_blur(&dx, inner_sigma), gaussian_blur(&dy, inner_sigma))
            };
            let mask_blur = gaussian_blur(&binary_mask(mask), inner_sigma);
            dx = renormalized(&bx, &mask_blur);
            dy = renormalized(&by, &mask_blur);
        } else {
            dx = gaussian_blur(&dx, inner_sigma);
            dy = gaussian_blur(&dy, inner_sigma);
        }
    }

    // second order moments summed over channels
    let mut dx2 = Mat::new(rows, cols);
    let mut dy2 = Mat::new(rows, cols);
    let mut dxy = Mat::new(rows, cols);
    for i in 0..rows * cols {
        let g0 = dx.at_index(i);
        let g1 = dy.at_index(i);
        *dx2.at_index_mut(i) = g0.dot(g0);
        *dy2.at_index_mut(i) = g1.dot(g1);
        *dxy.at_index_mut(i) = g0.dot(g1);
    }

    if outer_sigma > 0.0 {
        if let Some(mask) = mask {
            for m in [&mut dx2, &mut dy2, &mut dxy] {
                for i in 0..rows * cols {
                    if mask.at_index(i) <= 0.0 {
                        *m.at_index_mut(i) = 0.0;
                    }
                }
            }
            let mask_blur = gaussian_blur(&binary_mask(mask), outer_sigma);
            dx2 = renormalized_scalar(&gaussian_blur(&dx2, outer_sigma), &mask_blur);
            dy2 = renormalized_scalar(&gaussian_blur(&dy2, outer_sigma), &mask_blur);
            dxy = renormalized_scalar(&gaussian_blur(&dxy, outer_sigma), &mask_blur);
        } else {
            dx2 = gaussian_blur(&dx2, outer_sigma);
            dy2 = gaussian_blur(&dy2, outer_sigma);
            dxy = gaussian_blur(&dxy, outer_sigma);
        }
    }

    let mut tensors = Mat::from_fn(rows, cols, |r, c| {
        Vec3::new(dx2[(r, c)], dxy[(r, c)], dy2[(r, c)])
    });

    // normalize the field magnitude
    let mut mag: f64 = 0.0;
    for &t in tensors.data() {
        mag = mag.max(t.length());
    }
    if mag > 0.0 {
        let scale = 1.0 / mag;
        for t in tensors.data_mut() {
            *t = *t * scale;
        }
    }
    tensors
}

/// [`compute_tensors`] followed by an edge-aware relaxation of the
/// tensor field with the source image as guide.
pub fn compute_tensors_relaxed(
    image: &Mat<Vec3>,
    mask: Option<&Mat<f64>>,
    inner_sigma: f64,
    outer_sigma: f64,
    spatial_sigma: f64,
    color_sigma: f64,
) -> Mat<Vec3> {
    let tensors = compute_tensors(image, mask, inner_sigma, outer_sigma);
    if spatial_sigma > 0.0 && color_sigma > 0.0 {
        filter_domain_transform(image, &tensors, spatial_sigma, color_sigma)
    } else {
        tensors
    }
}

fn binary_mask(mask: &Mat<f64>) -> Mat<f64> {
    mask.map(|v| if v > 0.0 { 1.0 } else { 0.0 })
}

fn zero_masked(field: &mut Mat<Vec3>, mask: &Mat<f64>) {
    for i in 0..field.len() {
        if mask.at_index(i) <= 0.0 {
            *field.at_index_mut(i) = Vec3::ZERO;
        }
    }
}

fn renormalized(field: &Mat<Vec3>, mask_blur: &Mat<f64>) -> Mat<Vec3> {
    Mat::from_fn(field.rows(), field.cols(), |r, c| {
        let w = mask_blur[(r, c)];
        if w > 0.0 { field[(r, c)] * (1.0 / w) } else { field[(r, c)] }
    })
}

fn renormalized_scalar(field: &Mat<f64>, mask_blur: &Mat<f64>) -> Mat<f64> {
    Mat::from_fn(field.rows(), field.cols(), |r, c| {
        let w = mask_blur[(r, c)];
        if w > 0.0 { field[(r, c)] / w } else { field[(r, c)] }
    })
}
