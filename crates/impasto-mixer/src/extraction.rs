//! Dominant color extraction from an image, after Aharoni-Mack et al.,
//! "Pigment-Based Recoloring of Watercolor Paintings" (Expressive
//! 2017): convex hull of the chromaticities with greedy vertex pruning,
//! plus the darkest and lightest colors.

use impasto_core::color::ColorConverter;
use impasto_core::mat::Mat;
use impasto_core::vec::{Vec2, Vec3};
use tracing::debug;

/// Minimum distance between a point and the segment v-w.
fn distance_segment_point(v: Vec2, w: Vec2, p: Vec2) -> f64 {
    let l2 = (v - w).length_squared();
    if l2.abs() < f64::EPSILON {
        return (p - v).length();
    }
    let t = ((p - v).dot(w - v) / l2).clamp(0.0, 1.0);
    let projection = v + t * (w - v);
    (p - projection).length()
}

/// Convex hull (Andrew monotone chain) returning indices into `points`
/// in counter-clockwise order.
fn convex_hull_indices(points: &[Vec2]) -> Vec<usize> {
    let n = points.len();
    if n < 3 {
        return (0..n).collect();
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        points[a]
            .x
            .partial_cmp(&points[b].x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                points[a]
                    .y
                    .partial_cmp(&points[b].y)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });

    let cross = |o: usize, a: usize, b: usize| -> f64 {
        let oa = points[a] - points[o];
        let ob = points[b] - points[o];
        oa.x * ob.y - oa.y * ob.x
    };

    let mut hull: Vec<usize> = Vec::with_capacity(2 * n);
    // lower hull
    for &i in &order {
        while hull.len() >= 2
            && cross(hull[hull.len() - 2], hull[hull.len() - 1], i) <= 0.0
        {
            hull.pop();
        }
        hull.push(i);
    }
    // upper hull
    let lower_len = hull.len() + 1;
    for &i in order.iter().rev() {
        while hull.len() >= lower_len
            && cross(hull[hull.len() - 2], hull[hull.len() - 1], i) <= 0.0
        {
            hull.pop();
        }
        hull.push(i);
    }
    hull.pop();
    hull
}

/// Extract `count` dominant colors of an sRGB image as linear RGB.
///
/// The darkest and lightest Lab colors are always included; the
/// remaining `count - 2` come from the pruned convex hull of the
/// (a*, b*) chromaticities. If the hull is small the result may hold
/// fewer than `count` entries.
pub fn extract_color_palette_aharoni(srgb: &Mat<Vec3>, count: u32) -> Vec<Vec3> {
    let converter = ColorConverter::default();

    let lab: Vec<Vec3> = srgb.data().iter().map(|&c| converter.srgb_to_lab(c)).collect();

    let mut l_max = 0.0_f64;
    let mut l_min = 100.0_f64;
    let mut c_max_l = Vec3::new(100.0, 0.0, 0.0);
    let mut c_min_l = Vec3::ZERO;
    for &e in &lab {
        if l_max < e.x {
            l_max = e.x;
            c_max_l = e;
        }
        if l_min > e.x {
            l_min = e.x;
            c_min_l = e;
        }
    }

    // discard the very brightest and darkest pixels, then hull the rest
    let mut input_points = Vec::with_capacity(lab.len());
    let mut input_colors = Vec::with_capacity(lab.len());
    for &e in &lab {
        if e.x > l_min && e.x < l_max {
            input_points.push(Vec2::new(e.y, e.z));
            input_colors.push(e);
        }
    }

    let mut colors = Vec::with_capacity(count as usize);
    colors.push(converter.lab_to_rgb(c_min_l));
    colors.push(converter.lab_to_rgb(c_max_l));
    let k = (count as usize).saturating_sub(2);

    let mut indices = convex_hull_indices(&input_points);
    debug!(hull = indices.len(), k, "convex hull of chromaticities");

    if indices.len() <= k {
        for &i in &indices {
            colors.push(converter.lab_to_rgb(input_colors[i]));
        }
        return colors;
    }

    // prune hull vertices greedily: drop the vertex closest to the
    // segment joining its neighbors (Douglas-Peucker style)
    while indices.len() > k {
        let n = indices.len();
        let mut remove_index = 0;
        let mut min_dist = f64::MAX;
        for l in 0..n {
            let p_prev = input_points[indices[(l + n - 1) % n]];
            let p_here = input_points[indices[l]];
            let p_next = input_points[indices[(l + 1) % n]];
            let d = distance_segment_point(p_prev, p_next, p_here);
            if d < min_dist {
                min_dist = d;
                remove_index = l;
            }
        }
        indices.remove(remove_index);
    }

    for &i in &indices {
        colors.push(converter.lab_to_rgb(input_colors[i]));
    }
    colors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_point_distance() {
        let v = Vec2::new(0.0, 0.0);
        let w = Vec2::new(10.0, 0.0);
        assert!((distance_segment_point(v, w, Vec2::new(5.0, 3.0)) - 3.0).abs() < 1e-12);
        // beyond the segment end the distance is to the endpoint
        assert!(
            (distance_segment_point(v, w, Vec2::new(13.0, 4.0)) - 5.0).abs() < 1e-12
        );
        // degenerate segment
        assert!((distance_segment_point(v, v, Vec2::new(3.0, 4.0)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_hull_of_square_with_interior() {
        let points = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(4.0, 4.0),
            Vec2::new(0.0, 4.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(1.0, 3.0),
        ];
        let hull = convex_hull_indices(&points);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&4));
        assert!(!hull.contains(&5));
    }

    #[test]
    fn test_extraction_returns_requested_count() {
        // an image whose chromaticities form a 12-gon plus extremes
        let mut rng = fastrand::Rng::with_seed(5);
        let con = ColorConverter::default();
        let mut cells = Vec::new();
        // lightest and darkest pixels
        cells.push(Vec3::new(0.98, 0.98, 0.98));
        cells.push(Vec3::new(0.02, 0.02, 0.02));
        for i in 0..12 {
            let angle = i as f64 / 12.0 * std::f64::consts::TAU;
            let lab = Vec3::new(55.0, 35.0 * angle.cos(), 35.0 * angle.sin());
            cells.push(con.lab_to_srgb(lab).clamp(Vec3::ZERO, Vec3::ONE));
        }
        while cells.len() < 100 {
            // interior chroma noise, never on the hull
            let angle = rng.f64() * std::f64::consts::TAU;
            let lab = Vec3::new(55.0, 5.0 * angle.cos(), 5.0 * angle.sin());
            cells.push(con.lab_to_srgb(lab).clamp(Vec3::ZERO, Vec3::ONE));
        }
        let image = Mat::from_vec(10, 10, cells);

        let colors = extract_color_palette_aharoni(&image, 6);
        assert_eq!(colors.len(), 6);
    }

    #[test]
    fn test_extraction_small_hull_returns_fewer() {
        // two-tone image: hull of chromaticities is tiny
        let image = Mat::from_fn(4, 4, |r, _| {
            if r < 2 {
                Vec3::new(0.2, 0.2, 0.2)
            } else {
                Vec3::new(0.8, 0.8, 0.8)
            }
        });
        let colors = extract_color_palette_aharoni(&image, 8);
        assert!(colors.len() >= 2);
        assert!(colors.len() <= 8);
    }
}
