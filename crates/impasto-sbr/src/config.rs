//! Configuration bundles of the picture-target painter, matching the
//! JSON layout of the `sbr-painter` config file.

use serde::Deserialize;

fn default_sigma_spatial() -> f64 {
    3.0
}
fn default_sigma_color() -> f64 {
    4.25
}
fn default_smooth_iterations() -> u32 {
    5
}
fn default_nr_colors() -> u32 {
    6
}
fn default_thinning_volume() -> f64 {
    1.0
}
fn default_alpha_diff() -> f64 {
    1.0
}

/// Input image smoothing and palette parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputParams {
    pub sigma_spatial: f64,
    pub sigma_color: f64,
    pub smooth_iterations: u32,
    pub nr_colors: u32,
    pub thinning_volume: f64,
    pub alpha_diff: f64,
}

impl Default for InputParams {
    fn default() -> Self {
        Self {
            sigma_spatial: default_sigma_spatial(),
            sigma_color: default_sigma_color(),
            smooth_iterations: default_smooth_iterations(),
            nr_colors: default_nr_colors(),
            thinning_volume: default_thinning_volume(),
            alpha_diff: default_alpha_diff(),
        }
    }
}

/// Structure tensor blur scales, in units of the brush radius.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrientationParams {
    pub inner_blur_scale: f64,
    pub outer_blur_scale: f64,
}

impl Default for OrientationParams {
    fn default() -> Self {
        Self {
            inner_blur_scale: 0.0,
            outer_blur_scale: 1.0,
        }
    }
}

/// Stroke generation parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrokeParams {
    /// Brush diameters, generally coarse to fine.
    pub brush_sizes: Vec<f64>,
    pub min_len: u32,
    pub max_len: u32,
    /// Path step length; non-positive means half the brush radius.
    pub step_size: f64,
    pub curvature_alpha: f64,
    pub block_visited_regions: bool,
    pub clamp_brush_radius: bool,
    pub thickness_scale: f64,
}

impl Default for StrokeParams {
    fn default() -> Self {
        Self {
            brush_sizes: vec![60.0, 30.0, 10.0],
            min_len: 5,
            max_len: 12,
            step_size: 0.0,
            curvature_alpha: 1.0,
            block_visited_regions: true,
            clamp_brush_radius: true,
            thickness_scale: 2.0,
        }
    }
}

/// Convergence thresholds per brush-size stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConvergenceParams {
    pub max_iterations: u32,
    pub rms_local: f64,
    pub rms_global: f64,
}

impl Default for ConvergenceParams {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            rms_local: 0.1,
            rms_global: 0.0,
        }
    }
}

/// Top-level `sbr-painter` configuration file.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PainterConfig {
    /// Base pigment palette file name.
    pub base_pigments: Option<String>,
    #[serde(rename = "dryingTimeMillis")]
    pub drying_time_millis: Option<u64>,
    #[serde(rename = "coatCanvas")]
    pub coat_canvas: bool,
    #[serde(rename = "enableSmudge")]
    pub enable_smudge: Option<bool>,
    pub image_params: InputParams,
    pub orientation_params: OrientationParams,
    pub stroke_params: StrokeParams,
    pub convergence_params: ConvergenceParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parses() {
        let json = r#"{
            "base_pigments": "measured.json",
            "dryingTimeMillis": 60000,
            "coatCanvas": true,
            "enableSmudge": false,
            "image_params": { "sigmaSpatial": 2.0, "nrColors": 8 },
            "orientation_params": { "innerBlurScale": 0.5 },
            "stroke_params": { "brushSizes": [40.0, 20.0], "maxLen": 20 },
            "convergence_params": { "maxIterations": 5, "rmsLocal": 0.2 }
        }"#;
        let config: PainterConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.base_pigments.as_deref(), Some("measured.json"));
        assert_eq!(config.drying_time_millis, Some(60000));
        assert!(config.coat_canvas);
        assert_eq!(config.enable_smudge, Some(false));
        assert_eq!(config.image_params.sigma_spatial, 2.0);
        assert_eq!(config.image_params.nr_colors, 8);
        // unset fields fall back to their defaults
        assert_eq!(config.image_params.sigma_color, 4.25);
        assert_eq!(config.orientation_params.inner_blur_scale, 0.5);
        assert_eq!(config.orientation_params.outer_blur_scale, 1.0);
        assert_eq!(config.stroke_params.brush_sizes, vec![40.0, 20.0]);
        assert_eq!(config.stroke_params.max_len, 20);
        assert_eq!(config.convergence_params.max_iterations, 5);
        assert_eq!(config.convergence_params.rms_local, 0.2);
    }

    #[test]
    fn test_empty_config_is_all_defaults() {
        let config: PainterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.stroke_params.brush_sizes, vec![60.0, 30.0, 10.0]);
        assert_eq!(config.convergence_params.max_iterations, 3);
        assert!(!config.coat_canvas);
        assert!(config.enable_smudge.is_none());
        assert_eq!(config.image_params.smooth_iterations, 5);
    }

    #[test]
    fn test_malformed_config_fails() {
        let r: Result<PainterConfig, _> =
            serde_json::from_str(r#"{"stroke_params": {"brushSizes": "wide"}}"#);
        assert!(r.is_err());
    }
}
