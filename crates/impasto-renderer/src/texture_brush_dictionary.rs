//! A dictionary of scanned stroke textures, keyed by brush size and
//! stroke length classes, so each stroke can pick a texture that
//! matches its geometry.
//!
//! On disk the dictionary is a flat folder of grayscale images named
//! `<sizeclass>_<lengthclass>_<id>.png`; values are min-max normalized
//! on load.

use std::path::Path;

use impasto_core::mat::Mat;
use impasto_core::vec::Vec2;
use tracing::debug;

use crate::error::RendererError;

#[derive(Debug, Clone)]
struct DictionaryEntry {
    size_class: i32,
    length_class: i32,
    texture: Mat<f64>,
}

impl DictionaryEntry {
    fn tex_size(&self) -> f64 {
        self.texture.rows() as f64
    }

    fn tex_length(&self) -> f64 {
        self.texture.cols() as f64
    }
}

/// Looks up stroke textures by brush size and path length.
#[derive(Debug, Clone)]
pub struct TextureBrushDictionary {
    /// Entries grouped by size class, then length class.
    entries: Vec<Vec<Vec<DictionaryEntry>>>,
    avg_sizes: Vec<f64>,
    avg_lengths: Vec<Vec<f64>>,
    rng: fastrand::Rng,
}

impl TextureBrushDictionary {
    /// Load every texture in a folder. File stems must follow the
    /// `<sizeclass>_<lengthclass>_<id>` convention; anything else is
    /// an invalid-format error.
    pub fn load(folder: impl AsRef<Path>) -> Result<Self, RendererError> {
        let folder = folder.as_ref();
        if !folder.is_dir() {
            return Err(RendererError::NotFound(folder.display().to_string()));
        }

        let mut raw_entries = Vec::new();
        let mut paths: Vec<_> = std::fs::read_dir(folder)
            .map_err(|e| RendererError::NotFound(format!("{}: {e}", folder.display())))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        for path in paths {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            let tokens: Vec<&str> = stem.split('_').collect();
            if tokens.len() < 3 {
                return Err(RendererError::InvalidFormat(format!(
                    "texture name {stem:?} is not <size>_<length>_<id>"
                )));
            }
            let parse = |t: &str| -> Result<i32, RendererError> {
                t.parse().map_err(|_| {
                    RendererError::InvalidFormat(format!("non-numeric token in {stem:?}"))
                })
            };
            let entry = DictionaryEntry {
                size_class: parse(tokens[0])?,
                length_class: parse(tokens[1])?,
                texture: normalized_min_max(impasto_io::read_image_gray(&path)?),
            };
            raw_entries.push(entry);
        }
        if raw_entries.is_empty() {
            return Err(RendererError::InvalidFormat(format!(
                "no textures in {}",
                folder.display()
            )));
        }
        Ok(Self::from_entries(raw_entries))
    }

    /// Build a dictionary from already-loaded textures; each tuple is
    /// `(size_class, length_class, texture)`.
    pub fn from_textures(textures: Vec<(i32, i32, Mat<f64>)>) -> Self {
        let raw = textures
            .into_iter()
            .map(|(size_class, length_class, texture)| DictionaryEntry {
                size_class,
                length_class,
                texture: normalized_min_max(texture),
            })
            .collect();
        Self::from_entries(raw)
    }

    fn from_entries(mut raw: Vec<DictionaryEntry>) -> Self {
        raw.sort_by_key(|e| (e.size_class, e.length_class));

        let mut entries: Vec<Vec<Vec<DictionaryEntry>>> = Vec::new();
        let mut size_class = None;
        let mut length_class = None;
        for entry in raw {
            if Some(entry.size_class) != size_class {
                size_class = Some(entry.size_class);
                length_class = None;
                entries.push(Vec::new());
            }
            let by_size = entries.last_mut().expect("pushed above");
            if Some(entry.length_class) != length_class {
                length_class = Some(entry.length_class);
                by_size.push(Vec::new());
            }
            by_size.last_mut().expect("pushed above").push(entry);
        }

        let avg = |items: &[DictionaryEntry], f: fn(&DictionaryEntry) -> f64| -> f64 {
            items.iter().map(f).sum::<f64>() / items.len() as f64
        };
        let avg_sizes: Vec<f64> = entries
            .iter()
            .map(|by_size| {
                let all: Vec<f64> = by_size
                    .iter()
                    .flat_map(|c| c.iter().map(DictionaryEntry::tex_size))
                    .collect();
                all.iter().sum::<f64>() / all.len() as f64
            })
            .collect();
        let avg_lengths: Vec<Vec<f64>> = entries
            .iter()
            .map(|by_size| {
                by_size
                    .iter()
                    .map(|candidates| avg(candidates, DictionaryEntry::tex_length))
                    .collect()
            })
            .collect();

        debug!(
            size_classes = entries.len(),
            "texture brush dictionary ready"
        );
        Self {
            entries,
            avg_sizes,
            avg_lengths,
            rng: fastrand::Rng::with_seed(0x7e17),
        }
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.rng = fastrand::Rng::with_seed(seed);
    }

    /// Pick a texture for a stroke: nearest size class for the brush
    /// size, nearest length class for the path length, then a random
    /// candidate of that cell.
    pub fn lookup(&mut self, path: &[Vec2], brush_size: f64) -> Mat<f64> {
        let length: f64 = path.windows(2).map(|p| (p[1] - p[0]).length()).sum();

        let mut i0 = 0;
        let mut best = f64::MAX;
        for (i, &size) in self.avg_sizes.iter().enumerate() {
            let d = (size - brush_size).abs();
            if d < best {
                best = d;
                i0 = i;
            }
        }

        let mut i1 = 0;
        let mut best = f64::MAX;
        for (i, &l) in self.avg_lengths[i0].iter().enumerate() {
            let d = (l - length).abs();
            if d < best {
                best = d;
                i1 = i;
            }
        }

        let candidates = &self.entries[i0][i1];
        let pick = self.rng.usize(0..candidates.len());
        candidates[pick].texture.clone()
    }
}

fn normalized_min_max(mut texture: Mat<f64>) -> Mat<f64> {
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    for &v in texture.data() {
        min = min.min(v);
        max = max.max(v);
    }
    if max > min {
        let scale = 1.0 / (max - min);
        for v in texture.data_mut() {
            *v = (*v - min) * scale;
        }
    }
    texture
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture(rows: usize, cols: usize, value: f64) -> Mat<f64> {
        let mut m = Mat::filled(rows, cols, value);
        m[(0, 0)] = 0.0; // keep the min-max normalization meaningful
        m
    }

    fn dictionary() -> TextureBrushDictionary {
        TextureBrushDictionary::from_textures(vec![
            (0, 0, texture(16, 64, 0.8)),
            (0, 1, texture(16, 256, 0.8)),
            (1, 0, texture(64, 64, 0.8)),
            (1, 1, texture(64, 256, 0.8)),
        ])
    }

    fn straight_path(length: f64) -> Vec<Vec2> {
        vec![Vec2::new(0.0, 0.0), Vec2::new(length, 0.0)]
    }

    #[test]
    fn test_lookup_matches_size_and_length() {
        let mut dict = dictionary();
        // small brush, short path
        let t = dict.lookup(&straight_path(50.0), 14.0);
        assert_eq!((t.rows(), t.cols()), (16, 64));
        // large brush, long path
        let t = dict.lookup(&straight_path(300.0), 70.0);
        assert_eq!((t.rows(), t.cols()), (64, 256));
        // large brush, short path
        let t = dict.lookup(&straight_path(40.0), 70.0);
        assert_eq!((t.rows(), t.cols()), (64, 64));
    }

    #[test]
    fn test_textures_are_normalized() {
        let mut dict = TextureBrushDictionary::from_textures(vec![(
            0,
            0,
            Mat::from_fn(8, 8, |r, c| 5.0 + (r + c) as f64),
        )]);
        let t = dict.lookup(&straight_path(10.0), 8.0);
        let min = t.data().iter().cloned().fold(f64::MAX, f64::min);
        let max = t.data().iter().cloned().fold(f64::MIN, f64::max);
        assert!((min - 0.0).abs() < 1e-12);
        assert!((max - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_load_missing_folder() {
        assert!(matches!(
            TextureBrushDictionary::load("/no/such/folder"),
            Err(RendererError::NotFound(_))
        ));
    }
}
