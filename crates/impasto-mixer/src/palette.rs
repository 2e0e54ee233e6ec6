//! Ordered collections of paints, their JSON persistence and a debug
//! visualization.

use std::io::{Read, Write};
use std::ops::{Deref, DerefMut};

use impasto_core::color::ColorConverter;
use impasto_core::kubelka_munk::compute_reflectance;
use impasto_core::mat::Mat;
use impasto_core::vec::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MixerError;
use crate::paint::PaintCoeff;

/// An ordered sequence of paints. Insertion order defines the paint
/// indices used everywhere in the painter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Palette(pub Vec<PaintCoeff>);

impl Palette {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse a palette from a JSON stream. Fails with invalid-format on
    /// malformed input.
    pub fn load(reader: impl Read) -> Result<Self, MixerError> {
        serde_json::from_reader(reader).map_err(|e| MixerError::InvalidFormat(e.to_string()))
    }

    /// Serialize the palette as a JSON array.
    pub fn save(&self, writer: impl Write) -> Result<(), MixerError> {
        serde_json::to_writer(writer, self).map_err(|e| MixerError::InvalidFormat(e.to_string()))
    }

    /// Paint every entry over black and white bands for visual
    /// inspection. Returns sRGB.
    pub fn visualize(&self, applied_thickness: f64) -> Mat<Vec3> {
        let con = ColorConverter::default();
        let count = self.0.len().max(1);
        let rows = 200;
        let cols = count * 100;
        debug!(count, "visualizing palette");

        let mut image = Mat::filled(rows, cols, Vec3::ONE);
        for (index, paint) in self.0.iter().enumerate() {
            let on_black = con.rgb_to_srgb(compute_reflectance(
                paint.k,
                paint.s,
                Vec3::ZERO,
                applied_thickness,
            ));
            let on_white = con.rgb_to_srgb(compute_reflectance(
                paint.k,
                paint.s,
                Vec3::ONE,
                applied_thickness,
            ));

            let h = rows as f64;
            for x in index * 100..(index + 1) * 100 {
                for y in 0..rows {
                    let fy = y as f64;
                    image[(y, x)] = if fy < 0.1 * h {
                        Vec3::ONE
                    } else if fy < 0.4 * h {
                        on_white
                    } else if fy < 0.5 * h {
                        Vec3::ONE
                    } else if fy < 0.6 * h {
                        Vec3::ZERO
                    } else if fy < 0.9 * h {
                        on_black
                    } else {
                        Vec3::ZERO
                    };
                }
            }
        }
        image
    }
}

impl Deref for Palette {
    type Target = Vec<PaintCoeff>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Palette {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<PaintCoeff> for Palette {
    fn from_iter<I: IntoIterator<Item = PaintCoeff>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_palette() -> Palette {
        Palette(vec![
            PaintCoeff::new(Vec3::new(0.2, 0.3, 0.4), Vec3::new(0.5, 0.6, 0.7)),
            PaintCoeff::new(Vec3::new(0.05, 0.9, 0.01), Vec3::new(0.3, 0.3, 0.3)),
        ])
    }

    #[test]
    fn test_json_roundtrip() {
        let palette = sample_palette();
        let mut buffer = Vec::new();
        palette.save(&mut buffer).unwrap();
        let back = Palette::load(buffer.as_slice()).unwrap();
        assert_eq!(back.len(), palette.len());
        for (a, b) in back.iter().zip(palette.iter()) {
            assert!((a.k - b.k).abs().max_element() < 1e-9);
            assert!((a.s - b.s).abs().max_element() < 1e-9);
        }
    }

    #[test]
    fn test_order_is_preserved() {
        let json = r#"[{"K":[1,0,0],"S":[1,1,1]},{"K":[0,1,0],"S":[1,1,1]}]"#;
        let palette = Palette::load(json.as_bytes()).unwrap();
        assert_eq!(palette[0].k.x, 1.0);
        assert_eq!(palette[1].k.y, 1.0);
    }

    #[test]
    fn test_malformed_input_fails() {
        assert!(matches!(
            Palette::load("{not json".as_bytes()),
            Err(MixerError::InvalidFormat(_))
        ));
        assert!(matches!(
            Palette::load(r#"[{"K":[1,0,0]}]"#.as_bytes()),
            Err(MixerError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_visualize_dimensions() {
        let image = sample_palette().visualize(1.0);
        assert_eq!(image.rows(), 200);
        assert_eq!(image.cols(), 200);
    }
}
