//! Mixing recipes over a base palette: weighted sums, and solving for
//! the weights that approximate a target paint or reflectance.

use impasto_core::kubelka_munk::compute_reflectance;
use impasto_core::mat::Mat;
use impasto_core::math::fuzzy_compare;
use impasto_core::vec::Vec3;
use tracing::{debug, warn};

use crate::error::MixerError;
use crate::extraction::extract_color_palette_aharoni;
use crate::paint::PaintCoeff;
use crate::palette::Palette;
use crate::solver::{SolveOptions, levenberg_marquardt};

const WEIGHT_SUM: f64 = 1.0;
const WEIGHT_SPARSE: f64 = 0.1;
const THICKNESS_LOWER: f64 = 1e-9;
const THICKNESS_UPPER: f64 = 5.0;
const EPS: f64 = 10e-6;

/// Mixes paints from an underlying base palette.
#[derive(Debug, Clone)]
pub struct PaintMixer {
    base_palette: Palette,
}

impl PaintMixer {
    pub fn new(base_palette: Palette) -> Self {
        Self { base_palette }
    }

    pub fn palette(&self) -> &Palette {
        &self.base_palette
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.base_palette = palette;
    }

    /// Weighted linear combination of the base paints, normalized so
    /// the weights sum to one.
    pub fn mix_single_paint(&self, weights: &[f64]) -> Result<PaintCoeff, MixerError> {
        if self.base_palette.is_empty() {
            return Err(MixerError::InvalidInput("base palette is empty".into()));
        }
        if weights.len() != self.base_palette.len() {
            return Err(MixerError::InvalidInput(
                "weights size does not match palette size".into(),
            ));
        }

        let sum: f64 = weights.iter().sum();
        let norm = if fuzzy_compare(sum, 1.0, EPS) { 1.0 } else { 1.0 / sum };

        let mut paint = PaintCoeff::default();
        for (weight, base) in weights.iter().zip(self.base_palette.iter()) {
            paint.k += base.k * (norm * weight);
            paint.s += base.s * (norm * weight);
        }
        Ok(paint)
    }

    /// Volume-weighted blend of two paints.
    pub fn mixed(
        &self,
        paint: &PaintCoeff,
        paint_volume: f64,
        other: &PaintCoeff,
        other_volume: f64,
    ) -> PaintCoeff {
        let total = paint_volume + other_volume;
        if total <= 0.0 {
            return *paint;
        }
        let f = 1.0 / total;
        PaintCoeff::new(
            (paint.k * paint_volume + other.k * other_volume) * f,
            (paint.s * paint_volume + other.s * other_volume) * f,
        )
    }

    /// Find mixing weights approximating a target paint.
    ///
    /// Minimizes the coefficient distance plus a sum-to-one penalty and
    /// a Hoyer sparsity penalty, with weights in [0, 1]. A
    /// non-converged solve is logged and its last iterate used.
    pub fn weights_for_target_paint(&self, target: &PaintCoeff) -> Result<Vec<f64>, MixerError> {
        let k = self.base_palette.len();
        if k == 0 {
            return Err(MixerError::InvalidInput("base palette is empty".into()));
        }

        let initial = vec![1.0 / k as f64; k];
        let palette = self.base_palette.clone();
        let target = *target;

        let result = levenberg_marquardt(
            move |weights, r| {
                r.clear();
                let (mix_k, mix_s) = linear_mix(&palette, weights);
                r.extend_from_slice(&[
                    mix_k.x - target.k.x,
                    mix_k.y - target.k.y,
                    mix_k.z - target.k.z,
                    mix_s.x - target.s.x,
                    mix_s.y - target.s.y,
                    mix_s.z - target.s.z,
                ]);
                r.push(WEIGHT_SUM.sqrt() * sum_residual(weights));
                let Some(sparse) = sparsity_residual(weights) else {
                    return false;
                };
                r.push(WEIGHT_SPARSE.sqrt() * sparse);
                true
            },
            &initial,
            &vec![0.0; k],
            &vec![1.0; k],
            SolveOptions::default(),
        );

        if !result.converged {
            warn!(
                iterations = result.iterations,
                cost = result.cost,
                "paint weight solve did not converge; using last iterate"
            );
        }
        let weights = normalized_to_one(result.params);
        debug!(?weights, "mixture weights for target paint");
        Ok(weights)
    }

    /// Find mixing weights and a layer thickness such that the mixture
    /// composed over `background` approximates `target` reflectance.
    /// Returns `(weights, thickness)`.
    pub fn weights_for_reflectance(
        &self,
        target: Vec3,
        background: Vec3,
    ) -> Result<(Vec<f64>, f64), MixerError> {
        let k = self.base_palette.len();
        if k == 0 {
            return Err(MixerError::InvalidInput("base palette is empty".into()));
        }

        // parameters: k weights followed by the layer thickness
        let mut initial = vec![1.0 / k as f64; k];
        initial.push(1.0);
        let mut lower = vec![0.0; k];
        lower.push(THICKNESS_LOWER);
        let mut upper = vec![1.0; k];
        upper.push(THICKNESS_UPPER);

        let palette = self.base_palette.clone();
        let result = levenberg_marquardt(
            move |params, r| {
                r.clear();
                let (weights, d) = params.split_at(k);
                let (mix_k, mix_s) = linear_mix(&palette, weights);
                if mix_s.min_element() < 1e-12 {
                    return false;
                }
                let composed = compute_reflectance(mix_k, mix_s, background, d[0]);
                r.extend_from_slice(&[
                    composed.x - target.x,
                    composed.y - target.y,
                    composed.z - target.z,
                ]);
                r.push(WEIGHT_SUM.sqrt() * sum_residual(weights));
                let Some(sparse) = sparsity_residual(weights) else {
                    return false;
                };
                r.push(WEIGHT_SPARSE.sqrt() * sparse);
                true
            },
            &initial,
            &lower,
            &upper,
            SolveOptions::default(),
        );

        if !result.converged {
            warn!(
                iterations = result.iterations,
                cost = result.cost,
                "reflectance weight solve did not converge; using last iterate"
            );
        }
        let thickness = *result.params.last().expect("thickness parameter");
        let weights = normalized_to_one(result.params[..k].to_vec());
        Ok((weights, thickness))
    }

    /// Mix a palette of `count` paints matching an input picture:
    /// extract the dominant colors and solve each against a white
    /// background.
    pub fn mix_from_image(
        &self,
        srgb_picture: &Mat<Vec3>,
        count: u32,
    ) -> Result<Palette, MixerError> {
        let colors = extract_color_palette_aharoni(srgb_picture, count);
        debug!(extracted = colors.len(), requested = count, "palette colors from image");

        let white = Vec3::ONE;
        let mut palette = Palette::new();
        for color in colors {
            let (weights, _thickness) = self.weights_for_reflectance(color, white)?;
            palette.push(self.mix_single_paint(&weights)?);
        }
        Ok(palette)
    }
}

fn linear_mix(palette: &Palette, weights: &[f64]) -> (Vec3, Vec3) {
    let mut k = Vec3::ZERO;
    let mut s = Vec3::ZERO;
    for (w, paint) in weights.iter().zip(palette.iter()) {
        k += paint.k * *w;
        s += paint.s * *w;
    }
    (k, s)
}

fn sum_residual(weights: &[f64]) -> f64 {
    1.0 - weights.iter().sum::<f64>()
}

/// Hoyer sparsity: 1 - (sqrt(n) - l1/l2) / (sqrt(n) - 1). Returns None
/// for a numerically zero weight vector.
fn sparsity_residual(weights: &[f64]) -> Option<f64> {
    let l1: f64 = weights.iter().sum();
    let l2: f64 = weights.iter().map(|w| w * w).sum::<f64>().sqrt();
    if l2 < 1e-12 {
        return None;
    }
    let n_sqrt = (weights.len() as f64).sqrt();
    Some(1.0 - (n_sqrt - l1 / l2) / (n_sqrt - 1.0))
}

fn normalized_to_one(mut weights: Vec<f64>) -> Vec<f64> {
    let sum: f64 = weights.iter().sum();
    if !fuzzy_compare(sum, 1.0, EPS) && sum > 0.0 {
        let norm = 1.0 / sum;
        for w in &mut weights {
            *w *= norm;
        }
    }
    weights
}
