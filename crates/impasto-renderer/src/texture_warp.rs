//! Warping positions between canvas space and a stroke sample's UV
//! space via generalized barycentric interpolation over the stroke
//! polygon.

use impasto_core::math::barycentric_interpolate;
use impasto_core::vec::Vec2;

use crate::error::RendererError;

/// Maps points of a source polygon to corresponding values of an
/// output polygon, smoothly interpolating in between. Useful when the
/// stroke sample is not straight but a curved stroke.
#[derive(Debug, Clone, Default)]
pub struct TextureWarp {
    input: Vec<Vec2>,
    output: Vec<Vec2>,
}

impl TextureWarp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the correspondence polygons. Both must be non-empty and of
    /// equal length.
    pub fn init(&mut self, input: Vec<Vec2>, output: Vec<Vec2>) -> Result<(), RendererError> {
        if input.is_empty() || input.len() != output.len() {
            return Err(RendererError::InvalidInput(
                "warp polygons must be non-empty and of equal size".into(),
            ));
        }
        self.input = input;
        self.output = output;
        Ok(())
    }

    /// Warp a 2-D position. A single-vertex polygon returns that
    /// vertex's output value.
    pub fn warp(&self, p: Vec2) -> Vec2 {
        match barycentric_interpolate(&self.input, p, &self.output) {
            Ok(v) => v,
            Err(_) => self.output.first().copied().unwrap_or(Vec2::ZERO),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_warp_on_square() {
        let square = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ];
        let mut warp = TextureWarp::new();
        warp.init(square.clone(), square).unwrap();
        let p = Vec2::new(3.0, 7.0);
        assert!((warp.warp(p) - p).length() < 1e-9);
    }

    #[test]
    fn test_scaling_warp() {
        let input = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(0.0, 2.0),
        ];
        let output = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let mut warp = TextureWarp::new();
        warp.init(input, output).unwrap();
        let uv = warp.warp(Vec2::new(1.0, 1.0));
        assert!((uv - Vec2::new(0.5, 0.5)).length() < 1e-9);
    }

    #[test]
    fn test_single_vertex_polygon() {
        let mut warp = TextureWarp::new();
        warp.init(vec![Vec2::new(5.0, 5.0)], vec![Vec2::new(0.25, -1.0)])
            .unwrap();
        assert_eq!(warp.warp(Vec2::new(100.0, -3.0)), Vec2::new(0.25, -1.0));
    }

    #[test]
    fn test_init_rejects_mismatch() {
        let mut warp = TextureWarp::new();
        assert!(warp.init(vec![], vec![]).is_err());
        assert!(
            warp.init(vec![Vec2::ZERO], vec![Vec2::ZERO, Vec2::ONE])
                .is_err()
        );
    }
}
