//! The wet paint layer: per-cell absorption, scattering and volume.

use impasto_core::kubelka_munk::compute_reflectance;
use impasto_core::mat::Mat;
use impasto_core::vec::Vec3;

/// Stores paint coefficients and amount cell-wise.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintLayer {
    k: Mat<Vec3>,
    s: Mat<Vec3>,
    v: Mat<f64>,
}

impl PaintLayer {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            k: Mat::new(rows, cols),
            s: Mat::new(rows, cols),
            v: Mat::new(rows, cols),
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.k.rows()
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.k.cols()
    }

    #[inline]
    pub fn k(&self) -> &Mat<Vec3> {
        &self.k
    }

    #[inline]
    pub fn k_mut(&mut self) -> &mut Mat<Vec3> {
        &mut self.k
    }

    #[inline]
    pub fn s(&self) -> &Mat<Vec3> {
        &self.s
    }

    #[inline]
    pub fn s_mut(&mut self) -> &mut Mat<Vec3> {
        &mut self.s
    }

    #[inline]
    pub fn v(&self) -> &Mat<f64> {
        &self.v
    }

    #[inline]
    pub fn v_mut(&mut self) -> &mut Mat<f64> {
        &mut self.v
    }

    /// Set all three fields of a cell.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, k: Vec3, s: Vec3, v: f64) {
        self.k[(row, col)] = k;
        self.s[(row, col)] = s;
        self.v[(row, col)] = v;
    }

    /// Zero every field.
    pub fn clear(&mut self) {
        self.k.fill(Vec3::ZERO);
        self.s.fill(Vec3::ZERO);
        self.v.fill(0.0);
    }

    /// Compose this layer onto a substrate reflectance, treating the
    /// layer as dry. Resizes the substrate to white if its size does
    /// not match.
    pub fn compose_onto(&self, r0: &mut Mat<Vec3>) {
        if r0.rows() != self.rows() || r0.cols() != self.cols() {
            *r0 = Mat::filled(self.rows(), self.cols(), Vec3::ONE);
        }
        for i in 0..self.v.len() {
            *r0.at_index_mut(i) = compute_reflectance(
                self.k.at_index(i),
                self.s.at_index(i),
                r0.at_index(i),
                self.v.at_index(i),
            );
        }
    }

    /// Deep copy into another layer, resizing it if needed.
    pub fn copy_to(&self, other: &mut PaintLayer) {
        if other.rows() != self.rows() || other.cols() != self.cols() {
            *other = self.clone();
            return;
        }
        other.k.data_mut().copy_from_slice(self.k.data());
        other.s.data_mut().copy_from_slice(self.s.data());
        other.v.data_mut().copy_from_slice(self.v.data());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        let mut layer = PaintLayer::new(4, 4);
        layer.set(1, 2, Vec3::new(0.1, 0.2, 0.3), Vec3::new(0.4, 0.5, 0.6), 0.7);
        assert_eq!(layer.v()[(1, 2)], 0.7);
        assert_eq!(layer.k()[(1, 2)], Vec3::new(0.1, 0.2, 0.3));

        layer.clear();
        assert_eq!(layer.v()[(1, 2)], 0.0);
        assert_eq!(layer.k()[(1, 2)], Vec3::ZERO);
    }

    #[test]
    fn test_compose_onto_empty_cell_is_identity() {
        let layer = PaintLayer::new(2, 2);
        let mut r0 = Mat::filled(2, 2, Vec3::new(0.3, 0.5, 0.7));
        layer.compose_onto(&mut r0);
        assert!((r0[(0, 0)] - Vec3::new(0.3, 0.5, 0.7)).abs().max_element() < 1e-9);
    }

    #[test]
    fn test_compose_onto_resizes_mismatched_substrate() {
        let mut layer = PaintLayer::new(3, 3);
        layer.set(0, 0, Vec3::splat(0.5), Vec3::splat(0.5), 1.0);
        let mut r0: Mat<Vec3> = Mat::new(1, 1);
        layer.compose_onto(&mut r0);
        assert_eq!(r0.rows(), 3);
        assert_eq!(r0.cols(), 3);
        // untouched cells composed over white stay white
        assert!((r0[(2, 2)] - Vec3::ONE).abs().max_element() < 1e-9);
    }

    #[test]
    fn test_copy_to_resizes() {
        let mut layer = PaintLayer::new(5, 6);
        layer.set(4, 5, Vec3::ONE, Vec3::ONE, 2.0);
        let mut other = PaintLayer::new(1, 1);
        layer.copy_to(&mut other);
        assert_eq!(other.rows(), 5);
        assert_eq!(other.v()[(4, 5)], 2.0);
    }
}
