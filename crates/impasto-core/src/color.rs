//! Color conversions along the sRGB / linear RGB / XYZ / CIELab / LCHab
//! chain, plus the CIEDE2000 color difference.
//!
//! Matrices and constants follow Bruce Lindbloom's reference tables for
//! sRGB with a D65 whitepoint; the converter can be constructed with a
//! different illuminant for the Lab conversions.

use crate::math::fuzzy_compare;
use crate::vec::Vec3;

const EPSILON: f64 = f64::EPSILON * 1000.0;

// sRGB D65, http://brucelindbloom.com/index.html?Eqn_RGB_XYZ_Matrix.html
const XYZ2RGB: [[f64; 3]; 3] = [
    [3.2404542, -1.5371385, -0.4985314],
    [-0.9692660, 1.8760108, 0.0415560],
    [0.0556434, -0.2040259, 1.0572252],
];

const RGB2XYZ: [[f64; 3]; 3] = [
    [0.4124564, 0.3575761, 0.1804375],
    [0.2126729, 0.7151522, 0.0721750],
    [0.0193339, 0.1191920, 0.9503041],
];

/// Converter between the color spaces used by the painting pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ColorConverter {
    illuminant: Vec3,
}

impl Default for ColorConverter {
    fn default() -> Self {
        Self::new(Self::ILLUMINANT_D65)
    }
}

impl ColorConverter {
    pub const ILLUMINANT_A: Vec3 = Vec3::new(1.09850, 1.00000, 0.35585);
    pub const ILLUMINANT_B: Vec3 = Vec3::new(0.99072, 1.00000, 0.85223);
    pub const ILLUMINANT_C: Vec3 = Vec3::new(0.98074, 1.00000, 1.18232);
    pub const ILLUMINANT_D50: Vec3 = Vec3::new(0.96422, 1.00000, 0.82521);
    pub const ILLUMINANT_D55: Vec3 = Vec3::new(0.95682, 1.00000, 0.92149);
    pub const ILLUMINANT_D65: Vec3 = Vec3::new(0.95047, 1.00000, 1.08883);
    pub const ILLUMINANT_D75: Vec3 = Vec3::new(0.94972, 1.00000, 1.22638);
    pub const ILLUMINANT_E: Vec3 = Vec3::new(1.00000, 1.00000, 1.00000);

    /// Construct a converter with an explicit reference white.
    pub fn new(illuminant: Vec3) -> Self {
        Self { illuminant }
    }

    /// sRGB gamma expansion of a single channel.
    #[inline]
    pub fn srgb_channel_to_linear(s: f64) -> f64 {
        if s <= 0.0404482362771082 {
            s / 12.92
        } else {
            ((s + 0.055) / 1.055).powf(2.4)
        }
    }

    /// sRGB gamma compression of a single channel.
    #[inline]
    pub fn linear_channel_to_srgb(l: f64) -> f64 {
        if l <= 0.00313066844250063 {
            l * 12.92
        } else {
            1.055 * l.powf(1.0 / 2.4) - 0.055
        }
    }

    /// sRGB -> linear RGB.
    pub fn srgb_to_rgb(&self, srgb: Vec3) -> Vec3 {
        Vec3::new(
            Self::srgb_channel_to_linear(srgb.x),
            Self::srgb_channel_to_linear(srgb.y),
            Self::srgb_channel_to_linear(srgb.z),
        )
    }

    /// Linear RGB -> sRGB.
    pub fn rgb_to_srgb(&self, rgb: Vec3) -> Vec3 {
        Vec3::new(
            Self::linear_channel_to_srgb(rgb.x),
            Self::linear_channel_to_srgb(rgb.y),
            Self::linear_channel_to_srgb(rgb.z),
        )
    }

    /// Linear RGB -> XYZ (sRGB chromatically adapted matrix).
    pub fn rgb_to_xyz(&self, rgb: Vec3) -> Vec3 {
        mat_mul(&RGB2XYZ, rgb)
    }

    /// XYZ -> linear RGB.
    pub fn xyz_to_rgb(&self, xyz: Vec3) -> Vec3 {
        mat_mul(&XYZ2RGB, xyz)
    }

    /// XYZ -> CIELab against the converter's reference white.
    pub fn xyz_to_lab(&self, xyz: Vec3) -> Vec3 {
        let fx = f(xyz.x / self.illuminant.x);
        let fy = f(xyz.y / self.illuminant.y);
        let fz = f(xyz.z / self.illuminant.z);
        Vec3::new(116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz))
    }

    /// CIELab -> XYZ against the converter's reference white.
    pub fn lab_to_xyz(&self, lab: Vec3) -> Vec3 {
        let l = (1.0 / 116.0) * (lab.x + 16.0);
        Vec3::new(
            self.illuminant.x * fi(l + (1.0 / 500.0) * lab.y),
            self.illuminant.y * fi(l),
            self.illuminant.z * fi(l - (1.0 / 200.0) * lab.z),
        )
    }

    /// CIELab -> LCHab, hue in [0, 2pi).
    pub fn lab_to_lchab(&self, lab: Vec3) -> Vec3 {
        let c = (lab.y * lab.y + lab.z * lab.z).sqrt();
        let mut h = lab.z.atan2(lab.y);
        if h < 0.0 {
            h += std::f64::consts::PI * 2.0;
        }
        Vec3::new(lab.x, c, h)
    }

    /// LCHab -> CIELab.
    pub fn lchab_to_lab(&self, lch: Vec3) -> Vec3 {
        let mut h = lch.z;
        if h > std::f64::consts::PI {
            h -= std::f64::consts::PI * 2.0;
        }
        Vec3::new(lch.x, lch.y * h.cos(), lch.y * h.sin())
    }

    pub fn rgb_to_lab(&self, rgb: Vec3) -> Vec3 {
        self.xyz_to_lab(self.rgb_to_xyz(rgb))
    }

    pub fn lab_to_rgb(&self, lab: Vec3) -> Vec3 {
        self.xyz_to_rgb(self.lab_to_xyz(lab))
    }

    pub fn srgb_to_lab(&self, srgb: Vec3) -> Vec3 {
        self.rgb_to_lab(self.srgb_to_rgb(srgb))
    }

    pub fn lab_to_srgb(&self, lab: Vec3) -> Vec3 {
        self.rgb_to_srgb(self.lab_to_rgb(lab))
    }

    pub fn srgb_to_xyz(&self, srgb: Vec3) -> Vec3 {
        self.rgb_to_xyz(self.srgb_to_rgb(srgb))
    }

    pub fn xyz_to_srgb(&self, xyz: Vec3) -> Vec3 {
        self.rgb_to_srgb(self.xyz_to_rgb(xyz))
    }

    /// CIEDE2000 difference between two Lab colors.
    ///
    /// Ported from the SCIELAB reference matlab script; see
    /// <https://en.wikipedia.org/wiki/Color_difference> for the defining
    /// equations.
    pub fn ciede2000(lab1: Vec3, lab2: Vec3) -> f64 {
        use std::f64::consts::PI;

        let (l_std, a_std, b_std) = (lab1.x, lab1.y, lab1.z);
        let (l_smp, a_smp, b_smp) = (lab2.x, lab2.y, lab2.z);

        let cab_std = (a_std * a_std + b_std * b_std).sqrt();
        let cab_smp = (a_smp * a_smp + b_smp * b_smp).sqrt();
        let cab_mean = (cab_std + cab_smp) / 2.0;

        let g = 0.5
            * (1.0 - (cab_mean.powi(7) / (cab_mean.powi(7) + 25.0_f64.powi(7))).sqrt());

        let ap_std = (1.0 + g) * a_std;
        let ap_smp = (1.0 + g) * a_smp;
        let cp_std = (ap_std * ap_std + b_std * b_std).sqrt();
        let cp_smp = (ap_smp * ap_smp + b_smp * b_smp).sqrt();
        let cp_prod = cp_smp * cp_std;

        let mut hp_std = b_std.atan2(ap_std);
        if hp_std < 0.0 {
            hp_std += 2.0 * PI;
        }
        let mut hp_smp = b_smp.atan2(ap_smp);
        if hp_smp < 0.0 {
            hp_smp += 2.0 * PI;
        }
        if fuzzy_compare(ap_smp.abs() + b_smp.abs(), 0.0, EPSILON) {
            hp_smp = 0.0;
        }

        let dl = l_smp - l_std;
        let dc = cp_smp - cp_std;

        let mut dhp = hp_smp - hp_std;
        if dhp > PI {
            dhp -= 2.0 * PI;
        }
        if dhp < -PI {
            dhp += 2.0 * PI;
        }
        if fuzzy_compare(cp_prod, 0.0, EPSILON) {
            dhp = 0.0;
        }

        let dh = 2.0 * cp_prod.sqrt() * (dhp / 2.0).sin();

        let lp = (l_smp + l_std) / 2.0;
        let cp = (cp_std + cp_smp) / 2.0;

        let mut hp = (hp_std + hp_smp) / 2.0;
        if (hp_std - hp_smp).abs() > PI {
            hp -= PI;
        }
        if hp < 0.0 {
            hp += 2.0 * PI;
        }
        if fuzzy_compare(cp_prod, 0.0, EPSILON) {
            hp = hp_smp + hp_std;
        }

        let lpm50_sq = (lp - 50.0) * (lp - 50.0);
        let sl = 1.0 + 0.015 * lpm50_sq / (20.0 + lpm50_sq).sqrt();
        let sc = 1.0 + 0.045 * cp;
        let t = 1.0 - 0.17 * (hp - PI / 6.0).cos() + 0.24 * (2.0 * hp).cos()
            + 0.32 * (3.0 * hp + PI / 30.0).cos()
            - 0.20 * (4.0 * hp - 63.0 * PI / 180.0).cos();
        let sh = 1.0 + 0.015 * cp * t;
        let delta_theta =
            (30.0 * PI / 180.0) * (-((180.0 / PI * hp - 275.0) / 25.0).powi(2)).exp();
        let rc = 2.0 * (cp.powi(7) / (cp.powi(7) + 25.0_f64.powi(7))).sqrt();
        let rt = -(2.0 * delta_theta).sin() * rc;

        ((dl / sl).powi(2)
            + (dc / sc).powi(2)
            + (dh / sh).powi(2)
            + rt * (dc / sc) * (dh / sh))
            .sqrt()
    }

    /// Normalized color difference: CIEDE2000 / 100 clamped to [0, 1].
    pub fn color_difference(lab1: Vec3, lab2: Vec3) -> f64 {
        const D0: f64 = 100.0;
        let d = Self::ciede2000(lab1, lab2);
        if (0.0..=D0).contains(&d) { d / D0 } else { 1.0 }
    }
}

#[inline]
fn mat_mul(m: &[[f64; 3]; 3], v: Vec3) -> Vec3 {
    Vec3::new(
        m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
        m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
        m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
    )
}

#[inline]
fn f(t: f64) -> f64 {
    if t > (6.0_f64 / 29.0).powi(3) {
        t.cbrt()
    } else {
        (1.0 / 3.0) * (29.0_f64 / 6.0).powi(2) * t + 4.0 / 29.0
    }
}

#[inline]
fn fi(t: f64) -> f64 {
    if t > 6.0 / 29.0 {
        t.powi(3)
    } else {
        3.0 * (6.0_f64 / 29.0).powi(2) * (t - 4.0 / 29.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srgb_lab_roundtrip() {
        let con = ColorConverter::default();
        for &srgb in &[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(0.25, 0.5, 0.75),
            Vec3::new(0.9, 0.1, 0.3),
            Vec3::new(0.01, 0.02, 0.03),
        ] {
            let lab = con.srgb_to_lab(srgb);
            let back = con.lab_to_srgb(lab);
            assert!(
                (back - srgb).abs().max_element() < 1e-5,
                "roundtrip failed for {srgb:?}: {back:?}"
            );
        }
    }

    #[test]
    fn test_white_is_lab_100() {
        let con = ColorConverter::default();
        let lab = con.rgb_to_lab(Vec3::new(1.0, 1.0, 1.0));
        assert!((lab.x - 100.0).abs() < 1e-3);
        assert!(lab.y.abs() < 1e-2);
        assert!(lab.z.abs() < 1e-2);
    }

    #[test]
    fn test_lchab_roundtrip() {
        let con = ColorConverter::default();
        let lab = Vec3::new(52.0, -18.0, 31.0);
        let lch = con.lab_to_lchab(lab);
        let back = con.lchab_to_lab(lch);
        assert!((back - lab).abs().max_element() < 1e-9);
        assert!(lch.z >= 0.0 && lch.z < std::f64::consts::PI * 2.0);
    }

    #[test]
    fn test_gamma_knee_continuity() {
        let lo = ColorConverter::srgb_channel_to_linear(0.0404482);
        let hi = ColorConverter::srgb_channel_to_linear(0.0404483);
        assert!((lo - hi).abs() < 1e-6);
    }

    #[test]
    fn test_ciede2000_identity_and_symmetry() {
        let a = Vec3::new(50.0, 2.6772, -79.7751);
        let b = Vec3::new(50.0, 0.0, -82.7485);
        assert!(ColorConverter::ciede2000(a, a) < 1e-12);
        let d_ab = ColorConverter::ciede2000(a, b);
        let d_ba = ColorConverter::ciede2000(b, a);
        assert!((d_ab - d_ba).abs() < 1e-9);
        // first entry of the Sharma CIEDE2000 test set
        assert!((d_ab - 2.0425).abs() < 1e-3);
    }

    #[test]
    fn test_color_difference_normalized() {
        let black = Vec3::new(0.0, 0.0, 0.0);
        let white = Vec3::new(100.0, 0.0, 0.0);
        let d = ColorConverter::color_difference(black, white);
        assert!(d > 0.0 && d <= 1.0);
        assert_eq!(ColorConverter::color_difference(black, black), 0.0);
    }
}
