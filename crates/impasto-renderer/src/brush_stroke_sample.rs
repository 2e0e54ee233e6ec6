//! A scanned brush stroke: a thickness texture plus the warp mapping
//! stroke UV space onto it.
//!
//! On disk a sample is a directory holding `spine.txt` (the rail
//! correspondences) and `thickness_map.png`. UV space is u in [0, 1]
//! along the stroke, v in [-1, 1] across it.

use std::path::Path;

use impasto_core::mat::Mat;
use impasto_core::vec::Vec2;
use tracing::debug;

use crate::error::RendererError;
use crate::texture_warp::TextureWarp;

/// Brush stroke texture sample that can be warped along a trajectory.
#[derive(Debug, Clone, Default)]
pub struct BrushStrokeSample {
    thickness_map: Mat<f64>,

    // texture-space rail coordinates
    txy_l: Vec<Vec2>,
    txy_c: Vec<Vec2>,
    txy_r: Vec<Vec2>,

    // parameterization rails
    puv_l: Vec<Vec2>,
    puv_c: Vec<Vec2>,
    puv_r: Vec<Vec2>,

    warper: TextureWarp,
    width_max: f64,
}

impl BrushStrokeSample {
    /// Load a sample from a directory with `spine.txt` and
    /// `thickness_map.png`.
    pub fn load(sample_dir: impl AsRef<Path>) -> Result<Self, RendererError> {
        let dir = sample_dir.as_ref();
        let spine_path = dir.join("spine.txt");
        let spine = std::fs::read_to_string(&spine_path)
            .map_err(|_| RendererError::NotFound(spine_path.display().to_string()))?;

        let mut sample = Self::default();
        sample.parse_spine(&spine)?;
        sample.create_warper()?;
        sample.thickness_map = impasto_io::read_image_gray(dir.join("thickness_map.png"))?;
        debug!(
            rows = sample.thickness_map.rows(),
            cols = sample.thickness_map.cols(),
            "loaded brush stroke sample"
        );
        Ok(sample)
    }

    /// Build a straight sample from a bare thickness texture.
    pub fn from_texture(texture: Mat<f64>, brush_width: f64) -> Result<Self, RendererError> {
        if texture.is_empty() || brush_width <= 0.0 {
            return Err(RendererError::InvalidInput(
                "texture must be non-empty and the brush width positive".into(),
            ));
        }
        let mut sample = Self {
            thickness_map: texture,
            ..Self::default()
        };

        let cols = sample.thickness_map.cols() as f64;
        let rows = sample.thickness_map.rows() as f64;
        let sample_spacing = cols / brush_width;
        let top = 0.0;
        let bottom = rows - 1.0;
        let center = bottom * 0.5;

        let mut t = 0.0;
        while t < cols {
            let u = t / (cols - 1.0);
            sample.txy_l.push(Vec2::new(t, top));
            sample.puv_l.push(Vec2::new(u, -1.0));
            sample.txy_c.push(Vec2::new(t, center));
            sample.puv_c.push(Vec2::new(u, 0.0));
            sample.txy_r.push(Vec2::new(t, bottom));
            sample.puv_r.push(Vec2::new(u, 1.0));
            t += sample_spacing;
        }
        sample.txy_l.push(Vec2::new(cols - 1.0, top));
        sample.puv_l.push(Vec2::new(1.0, -1.0));
        sample.txy_c.push(Vec2::new(cols - 1.0, center));
        sample.puv_c.push(Vec2::new(1.0, 0.0));
        sample.txy_r.push(Vec2::new(cols - 1.0, bottom));
        sample.puv_r.push(Vec2::new(1.0, 1.0));

        sample.create_warper()?;
        Ok(sample)
    }

    /// A synthesized straight stroke with a smooth cross profile, for
    /// running without scanned assets.
    pub fn default_sample() -> Self {
        use std::f64::consts::PI;
        let rows = 64;
        let cols = 256;
        let texture = Mat::from_fn(rows, cols, |r, c| {
            let v = (r as f64 / (rows - 1) as f64) * 2.0 - 1.0;
            let u = c as f64 / (cols - 1) as f64;
            // cosine profile across, soft fade in and out along
            let across = (0.5 * PI * v).cos();
            let along = (u * PI).sin().sqrt();
            (across * along).max(0.0)
        });
        Self::from_texture(texture, 64.0).expect("synthesized sample is valid")
    }

    pub fn thickness_map(&self) -> &Mat<f64> {
        &self.thickness_map
    }

    pub fn set_thickness_map(&mut self, thickness_map: Mat<f64>) {
        self.thickness_map = thickness_map;
    }

    /// Widest distance between the left and right rails.
    pub fn width(&self) -> f64 {
        self.width_max
    }

    /// Sample the thickness texture at a texture-space position;
    /// 0.0 outside.
    pub fn sample_at(&self, xy: Vec2) -> f64 {
        if xy.x < 0.0
            || xy.y < 0.0
            || xy.x >= self.thickness_map.cols() as f64
            || xy.y >= self.thickness_map.rows() as f64
        {
            return 0.0;
        }
        self.thickness_map.bilinear(xy)
    }

    /// Sample the thickness at stroke UV coordinates; the sample's own
    /// warp maps UV into the stored texture.
    pub fn sample_at_uv(&self, uv: Vec2) -> f64 {
        self.sample_at(self.warper.warp(uv))
    }

    fn parse_spine(&mut self, spine: &str) -> Result<(), RendererError> {
        enum Section {
            TxyL,
            TxyC,
            TxyR,
            PuvL,
            PuvC,
            PuvR,
        }
        let mut section = Section::TxyL;

        for (line_number, line) in spine.lines().enumerate() {
            let line = line.trim_end();
            match line {
                "txy_l" => section = Section::TxyL,
                "txy_c" => section = Section::TxyC,
                "txy_r" => section = Section::TxyR,
                "puv_l" => section = Section::PuvL,
                "puv_c" => section = Section::PuvC,
                "puv_r" => section = Section::PuvR,
                "" => continue,
                _ => {
                    let mut parts = line.split_whitespace();
                    let parse = |token: Option<&str>| -> Result<f64, RendererError> {
                        token
                            .and_then(|t| t.parse::<f64>().ok())
                            .ok_or_else(|| {
                                RendererError::InvalidFormat(format!(
                                    "spine.txt line {}: expected `x y` floats, got {line:?}",
                                    line_number + 1
                                ))
                            })
                    };
                    let x = parse(parts.next())?;
                    let y = parse(parts.next())?;
                    let point = Vec2::new(x, y);
                    match section {
                        Section::TxyL => self.txy_l.push(point),
                        Section::TxyC => self.txy_c.push(point),
                        Section::TxyR => self.txy_r.push(point),
                        Section::PuvL => self.puv_l.push(point),
                        Section::PuvC => self.puv_c.push(point),
                        Section::PuvR => self.puv_r.push(point),
                    }
                }
            }
        }
        Ok(())
    }

    /// Build the UV -> texture warp from the left rail plus the
    /// reversed right rail, and record the maximal rail distance.
    fn create_warper(&mut self) -> Result<(), RendererError> {
        let mut uv: Vec<Vec2> = self.puv_l.clone();
        uv.extend(self.puv_r.iter().rev().copied());
        let mut txy: Vec<Vec2> = self.txy_l.clone();
        txy.extend(self.txy_r.iter().rev().copied());
        self.warper.init(uv, txy)?;

        self.width_max = 0.0;
        for (l, r) in self.txy_l.iter().zip(self.txy_r.iter()) {
            self.width_max = self.width_max.max((*l - *r).length_squared());
        }
        self.width_max = self.width_max.sqrt();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_texture_uv_sampling() {
        let texture = Mat::filled(20, 100, 0.8);
        let sample = BrushStrokeSample::from_texture(texture, 50.0).unwrap();
        // center of the stroke maps inside the texture
        let v = sample.sample_at_uv(Vec2::new(0.5, 0.0));
        assert!((v - 0.8).abs() < 1e-6);
        assert!((sample.width() - 19.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_outside_texture_is_zero() {
        let sample = BrushStrokeSample::default_sample();
        assert_eq!(sample.sample_at(Vec2::new(-1.0, 0.0)), 0.0);
        assert_eq!(sample.sample_at(Vec2::new(0.0, 1e6)), 0.0);
    }

    #[test]
    fn test_default_sample_profile() {
        let sample = BrushStrokeSample::default_sample();
        let center = sample.sample_at_uv(Vec2::new(0.5, 0.0));
        let edge = sample.sample_at_uv(Vec2::new(0.5, 0.95));
        assert!(center > 0.5);
        assert!(edge < center);
    }

    #[test]
    fn test_spine_parsing_roundtrip() {
        let spine = "txy_l\n0 0\n10 0\ntxy_c\n0 5\n10 5\ntxy_r\n0 10\n10 10\n\
                     puv_l\n0 -1\n1 -1\npuv_c\n0 0\n1 0\npuv_r\n0 1\n1 1\n";
        let mut sample = BrushStrokeSample::default();
        sample.parse_spine(spine).unwrap();
        sample.create_warper().unwrap();
        assert_eq!(sample.txy_l.len(), 2);
        assert_eq!(sample.puv_r.len(), 2);
        assert!((sample.width() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_spine_rejects_garbage() {
        let mut sample = BrushStrokeSample::default();
        let err = sample.parse_spine("txy_l\nnot numbers\n").unwrap_err();
        assert!(matches!(err, RendererError::InvalidFormat(_)));
    }

    #[test]
    fn test_load_missing_dir_is_not_found() {
        let err = BrushStrokeSample::load("/no/such/sample").unwrap_err();
        assert!(matches!(err, RendererError::NotFound(_)));
    }
}
