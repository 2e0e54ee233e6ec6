//! Kubelka-Munk two-constant pigment optics.
//!
//! A wet paint layer is described by an absorption triple K and a
//! scattering triple S. [`compute_reflectance`] evaluates the
//! reflectance of a layer of thickness `d` over a substrate, and
//! [`absorption_and_scattering_from_reflectance`] inverts a pair of
//! measurements over black and white substrates back to (K, S)
//! (Curtis et al., Computer-Generated Watercolor, SIGGRAPH '97).

use crate::error::CoreError;
use crate::math::{acoth, coth};
use crate::vec::Vec3;

/// Reflectance of a paint layer (K, S) of thickness `d` over the
/// substrate reflectance `r0`, per channel.
pub fn compute_reflectance(k: Vec3, s_in: Vec3, r0: Vec3, d: f64) -> Vec3 {
    if d.abs() < f64::EPSILON * 10000.0 {
        return r0;
    }

    let mut r = Vec3::ZERO;
    for i in 0..3 {
        let s = if s_in[i].abs() > f64::EPSILON * 10000.0 {
            s_in[i]
        } else {
            0.00000000001
        };
        let a = 1.0 + k[i] / s;
        let b = (a * a - 1.0).max(0.0).sqrt();
        let bcoth = b * coth(b * s * d);
        r[i] = (1.0 - r0[i] * (a - bcoth)) / (a - r0[i] + bcoth);
    }
    r
}

/// Recover (K, S) of a paint from its reflectance over black and over
/// white, applied at equal unit thickness.
///
/// Fails with invalid input unless `0 < r_black < r_white < 1` holds per
/// channel.
pub fn absorption_and_scattering_from_reflectance(
    r_black: Vec3,
    r_white: Vec3,
) -> Result<(Vec3, Vec3), CoreError> {
    for i in 0..3 {
        let rb = r_black[i];
        let rw = r_white[i];
        if !(rb < rw && rb > 0.0 && rb < 1.0 && rw > 0.0 && rw < 1.0) {
            return Err(CoreError::InvalidInput(
                "reflectance on black or white violates 0 < black < white < 1".into(),
            ));
        }
    }

    let mut k = Vec3::ZERO;
    let mut s = Vec3::ZERO;
    for i in 0..3 {
        let rb = r_black[i];
        let rw = r_white[i];
        let a = 0.5 * (rw + (rb - rw + 1.0) / rb);
        let b = (a * a - 1.0).sqrt();
        let arg = (b * b - (a - rw) * (a - 1.0)) / (b * (1.0 - rw));
        s[i] = (1.0 / b) * acoth(arg);
        k[i] = s[i] * (a - 1.0);
    }
    Ok((k, s))
}
