//! SLICO-style superpixel segmentation and the image regions it
//! produces for the stroke-based painter.

use std::collections::BTreeMap;
use std::ops::{Add, Mul};

use impasto_core::color::ColorConverter;
use impasto_core::mat::{Mat, border_reflect};
use impasto_core::vec::{Vec2, Vec2i, Vec3};
use tracing::debug;

/// A connected cluster of pixels with similar color and position.
#[derive(Debug, Clone)]
pub struct ImageRegion {
    label: i32,
    points: Vec<Vec2i>,
    active: bool,
}

impl ImageRegion {
    pub fn new(label: i32, points: Vec<Vec2i>) -> Self {
        Self {
            label,
            points,
            active: true,
        }
    }

    pub fn label(&self) -> i32 {
        self.label
    }

    pub fn set_label(&mut self, label: i32) {
        self.label = label;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn points(&self) -> &[Vec2i] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Mean of a field over the region's pixels.
    pub fn mean<T>(&self, data: &Mat<T>) -> T
    where
        T: Copy + Default + Add<Output = T> + Mul<f64, Output = T>,
    {
        if self.points.is_empty() {
            return T::default();
        }
        let mut acc = T::default();
        for p in &self.points {
            acc = acc + data[(p.y as usize, p.x as usize)];
        }
        acc * (1.0 / self.points.len() as f64)
    }

    /// Root mean square of a scalar field over the region.
    pub fn rms(&self, diff: &Mat<f64>) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        let mut s = 0.0;
        for p in &self.points {
            let v = diff[(p.y as usize, p.x as usize)];
            s += v * v;
        }
        (s / self.points.len() as f64).sqrt()
    }

    /// Write a value into a map at every region pixel.
    pub fn fill<T: Copy + Default>(&self, map: &mut Mat<T>, value: T) {
        for p in &self.points {
            map[(p.y as usize, p.x as usize)] = value;
        }
    }

    pub fn spatial_mean(&self) -> Vec2 {
        if self.points.is_empty() {
            return Vec2::ZERO;
        }
        let mut mean = Vec2::ZERO;
        for p in &self.points {
            mean += Vec2::new(p.x as f64, p.y as f64);
        }
        mean / self.points.len() as f64
    }

    /// Axis-aligned bounding rectangle `(x, y, width, height)`.
    pub fn bounding_rect(&self) -> (i32, i32, i32, i32) {
        if self.points.is_empty() {
            return (0, 0, 0, 0);
        }
        let mut min = self.points[0];
        let mut max = self.points[0];
        for p in &self.points {
            min = min.min(*p);
            max = max.max(*p);
        }
        (min.x, min.y, max.x - min.x + 1, max.y - min.y + 1)
    }

    /// Center and radius of the largest disk that fits inside the
    /// region, via an L1 distance transform over the padded bounding
    /// box.
    pub fn inscribed_circle(&self) -> (Vec2, f64) {
        if self.points.is_empty() {
            return (Vec2::ZERO, 0.0);
        }
        const PAD: i32 = 10;
        let (bx, by, bw, bh) = self.bounding_rect();
        let (ox, oy) = (bx - PAD, by - PAD);
        let (w, h) = ((bw + 2 * PAD) as usize, (bh + 2 * PAD) as usize);

        let distances = self.distance_transform(ox, oy, w, h);

        let mut incenter = Vec2::new(self.points[0].x as f64, self.points[0].y as f64);
        let mut max_dist = 0.0;
        for p in &self.points {
            let d = distances[((p.y - oy) as usize, (p.x - ox) as usize)];
            if d > max_dist {
                max_dist = d;
                incenter = Vec2::new(p.x as f64, p.y as f64);
            }
        }

        // radius: closest outside cell, euclidean, minus the one pixel
        // overshoot of hitting an exterior cell
        let im_p = Vec2::new(incenter.x - ox as f64, incenter.y - oy as f64);
        let mut min_dist = f64::MAX;
        for y in 0..h {
            for x in 0..w {
                if distances[(y, x)] <= 0.0 {
                    let d = (im_p - Vec2::new(x as f64, y as f64)).length();
                    if d < min_dist {
                        min_dist = d;
                    }
                }
            }
        }
        (incenter, min_dist - 1.0)
    }

    fn distance_transform(&self, ox: i32, oy: i32, w: usize, h: usize) -> Mat<f64> {
        const INF: f64 = 1e18;
        let mut dist = Mat::filled(h, w, 0.0);
        for p in &self.points {
            dist[((p.y - oy) as usize, (p.x - ox) as usize)] = INF;
        }
        // two-pass chamfer scan, L1 metric
        for y in 0..h {
            for x in 0..w {
                let mut d = dist[(y, x)];
                if y > 0 {
                    d = d.min(dist[(y - 1, x)] + 1.0);
                }
                if x > 0 {
                    d = d.min(dist[(y, x - 1)] + 1.0);
                }
                dist[(y, x)] = d;
            }
        }
        for y in (0..h).rev() {
            for x in (0..w).rev() {
                let mut d = dist[(y, x)];
                if y + 1 < h {
                    d = d.min(dist[(y + 1, x)] + 1.0);
                }
                if x + 1 < w {
                    d = d.min(dist[(y, x + 1)] + 1.0);
                }
                dist[(y, x)] = d;
            }
        }
        dist
    }
}

/// How cluster seeds are placed before the SLICO iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedingStrategy {
    /// Uniform grid at the nominal cell spacing.
    Grid,
    /// Coarse grid cells with randomized sub-cells, labeled directly
    /// without clustering iterations.
    JitteredGrid,
    /// Poisson-disk seeds drawn from the difference-energy map.
    #[default]
    PoissonWeighted,
}

#[derive(Debug, Clone)]
struct SuperPixel {
    center: Vec2,
    center_t: Vec2,
    mean_color: Vec3,
    mean_color_t: Vec3,
    mean_diff: f64,
    mean_diff_t: f64,
    area: i32,
    max_spatial: f64,
    max_spatial_t: f64,
    max_color: f64,
    max_color_t: f64,
    max_diff: f64,
    max_diff_t: f64,
}

impl SuperPixel {
    fn new(center: Vec2, mean_color: Vec3) -> Self {
        Self {
            center,
            center_t: Vec2::ZERO,
            mean_color,
            mean_color_t: Vec3::ZERO,
            mean_diff: 0.0,
            mean_diff_t: 0.0,
            area: 0,
            max_spatial: 1.0,
            max_spatial_t: 0.0001,
            max_color: 1.0,
            max_color_t: 0.0001,
            max_diff: 0.001,
            max_diff_t: 0.0001,
        }
    }

    fn reset(&mut self) {
        self.center_t = Vec2::ZERO;
        self.mean_color_t = Vec3::ZERO;
        self.mean_diff_t = 0.0;
        self.max_color_t = 0.0001;
        self.max_diff_t = 0.0001;
        self.max_spatial_t = 0.0001;
        self.area = 0;
    }
}

/// SLICO clustering of a target image in CIELab + (x, y), optionally
/// weighted by the per-pixel difference to the current canvas.
pub struct SuperpixelSegmentation {
    strategy: SeedingStrategy,
    use_diff_weight: bool,
    seed: u64,
    clusters: Vec<SuperPixel>,
    target_lab: Mat<Vec3>,
    difference: Mat<f64>,
    mask: Mat<f64>,
    labels: Mat<i32>,
    num_labels: i32,
}

impl Default for SuperpixelSegmentation {
    fn default() -> Self {
        Self::new()
    }
}

impl SuperpixelSegmentation {
    pub fn new() -> Self {
        Self {
            strategy: SeedingStrategy::default(),
            use_diff_weight: true,
            seed: 0,
            clusters: Vec::new(),
            target_lab: Mat::new(0, 0),
            difference: Mat::new(0, 0),
            mask: Mat::new(0, 0),
            labels: Mat::new(0, 0),
            num_labels: 0,
        }
    }

    pub fn set_strategy(&mut self, strategy: SeedingStrategy) {
        self.strategy = strategy;
    }

    pub fn set_use_diff_weight(&mut self, use_diff_weight: bool) {
        self.use_diff_weight = use_diff_weight;
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    pub fn labels(&self) -> &Mat<i32> {
        &self.labels
    }

    /// Cluster `target_lab` into superpixels of roughly
    /// `cell_size x cell_size` pixels. `canvas_lab` provides the
    /// per-pixel difference channel; masked-out pixels (mask < 1)
    /// receive label -1.
    pub fn extract(
        &mut self,
        target_lab: &Mat<Vec3>,
        canvas_lab: &Mat<Vec3>,
        mask: Option<&Mat<f64>>,
        cell_size: i32,
    ) {
        let (rows, cols) = (target_lab.rows(), target_lab.cols());
        self.target_lab = target_lab.clone();
        self.mask = match mask {
            Some(m) => m.clone(),
            None => Mat::filled(rows, cols, 1.0),
        };
        self.difference = Mat::from_fn(rows, cols, |r, c| {
            ColorConverter::color_difference(target_lab[(r, c)], canvas_lab[(r, c)])
        });

        let n = (rows * cols) as f64;
        let k = (n / (cell_size as f64).powi(2)).max(1.0) as i32;
        let s = ((n / k as f64).sqrt() as i32).max(1);
        debug!(k, s, strategy = ?self.strategy, "superpixel extraction");

        self.clusters.clear();
        match self.strategy {
            SeedingStrategy::PoissonWeighted => self.seed_poisson_weighted(k, s),
            SeedingStrategy::Grid => self.seed_grid(s),
            SeedingStrategy::JitteredGrid => {
                self.seed_jittered_grid(s);
                // jittered cells are already a labeling
                let mut labels = self.labels.clone();
                self.compute_stats(&mut labels);
                self.num_labels = self.clusters.len() as i32;
                return;
            }
        }

        self.perturb_cluster_centers();

        let mut new_labels = Mat::filled(rows, cols, -1_i32);
        let mut distances = Mat::filled(rows, cols, f64::MAX);

        let mut error = f64::MAX;
        let mut iteration = 0;
        while error > 0.001 && iteration < 100 {
            iteration += 1;
            for c in &mut self.clusters {
                c.reset();
            }

            let window = 2 * s;
            for i in 0..self.clusters.len() {
                let center = self.clusters[i].center;
                let x0 = center.x as i32 - window;
                let x1 = center.x as i32 + window;
                let y0 = center.y as i32 - window;
                let y1 = center.y as i32 + window;
                for x in x0..=x1 {
                    for y in y0..=y1 {
                        if x < 0 || y < 0 || y >= rows as i32 || x >= cols as i32 {
                            continue;
                        }
                        let (yu, xu) = (y as usize, x as usize);
                        if self.mask[(yu, xu)] < 1.0 || self.difference[(yu, xu)] <= 0.0 {
                            new_labels[(yu, xu)] = -1;
                            distances[(yu, xu)] = f64::MAX;
                            continue;
                        }
                        let ndist = self.distance(i, Vec2i::new(x, y));
                        if ndist < distances[(yu, xu)] {
                            distances[(yu, xu)] = ndist;
                            new_labels[(yu, xu)] = i as i32;
                        }
                    }
                }
            }
            error = self.compute_stats(&mut new_labels);
        }

        let expected = (n / (s * s) as f64) as i32;
        let (labels, num_labels) = enforce_label_connectivity(&new_labels, expected.max(1));
        self.labels = labels;
        self.num_labels = num_labels;

        // masked pixels never belong to a region
        for i in 0..self.labels.len() {
            if self.mask.at_index(i) < 1.0 {
                *self.labels.at_index_mut(i) = -1;
            }
        }
    }

    /// Collect the final regions, shuffled and relabeled sequentially.
    /// Returns the label map matching the new labels.
    pub fn regions(&mut self, regions: &mut BTreeMap<i32, ImageRegion>) -> Mat<i32> {
        let (rows, cols) = (self.labels.rows(), self.labels.cols());

        let mut points: Vec<Vec<Vec2i>> = vec![Vec::new(); self.num_labels.max(0) as usize];
        for y in 0..rows {
            for x in 0..cols {
                let label = self.labels[(y, x)];
                if label >= 0 && (label as usize) < points.len() {
                    points[label as usize].push(Vec2i::new(x as i32, y as i32));
                }
            }
        }

        let mut collected: Vec<ImageRegion> = points
            .into_iter()
            .enumerate()
            .filter(|(_, pts)| !pts.is_empty())
            .map(|(label, pts)| ImageRegion::new(label as i32, pts))
            .collect();

        let mut rng = fastrand::Rng::with_seed(self.seed);
        rng.shuffle(&mut collected);

        regions.clear();
        for (new_label, mut region) in collected.into_iter().enumerate() {
            let new_label = new_label as i32;
            region.set_label(new_label);
            region.fill(&mut self.labels, new_label);
            regions.insert(new_label, region);
        }
        self.labels.clone()
    }

    /// Draw segment contours into a background image (debug output).
    pub fn outline(&self, background: &mut Mat<Vec3>, color: Vec3) {
        let (rows, cols) = (self.labels.rows(), self.labels.cols());
        let dx8 = [-1, -1, 0, 1, 1, 1, 0, -1];
        let dy8 = [0, -1, -1, -1, 0, 1, 1, 1];
        let mut taken = vec![false; rows * cols];

        for j in 0..rows as i32 {
            for k in 0..cols as i32 {
                let mut np = 0;
                for i in 0..8 {
                    let x = k + dx8[i];
                    let y = j + dy8[i];
                    if x >= 0 && x < cols as i32 && y >= 0 && y < rows as i32 {
                        let index = (y as usize) * cols + x as usize;
                        if self.labels.at_index(index) < 0 {
                            continue;
                        }
                        if !taken[index]
                            && self.labels[(j as usize, k as usize)] != self.labels.at_index(index)
                        {
                            np += 1;
                        }
                    }
                }
                if np > 1 {
                    background[(j as usize, k as usize)] = color;
                    taken[(j as usize) * cols + k as usize] = true;
                }
            }
        }
    }

    fn seed_grid(&mut self, s: i32) {
        let (rows, cols) = (self.target_lab.rows() as i32, self.target_lab.cols() as i32);
        let mut x = s;
        while x < cols {
            let mut y = s;
            while y < rows {
                let sample = Vec2::new(x as f64, y as f64);
                self.clusters.push(SuperPixel::new(
                    sample,
                    self.target_lab[(y as usize, x as usize)],
                ));
                y += s;
            }
            x += s;
        }
    }

    fn seed_jittered_grid(&mut self, s: i32) {
        let (rows, cols) = (self.target_lab.rows() as i32, self.target_lab.cols() as i32);
        let mut rng = fastrand::Rng::with_seed(self.seed);
        self.labels = Mat::filled(rows as usize, cols as usize, 0_i32);

        let cell0 = (s as f64 * 1.5) as i32;
        let cell1 = s;
        let mut label = 0;

        let mut x = 0;
        while x < cols {
            let mut y = 0;
            while y < rows {
                let jitter = (cell0 - cell1).max(1);
                let xs = (x + rng.i32(0..jitter)).clamp(0, cols - 1);
                let ys = (y + rng.i32(0..jitter)).clamp(0, rows - 1);
                let xs2 = (xs + cell1).min(cols - 1);
                let ys2 = (ys + cell1).min(rows - 1);

                let sample = Vec2::new(
                    (x as f64 + 0.5 * s as f64).min(cols as f64 - 1.0),
                    (y as f64 + 0.5 * s as f64).min(rows as f64 - 1.0),
                );
                self.clusters.push(SuperPixel::new(
                    sample,
                    self.target_lab[(sample.y as usize, sample.x as usize)],
                ));
                for i in ys..ys2 {
                    for j in xs..xs2 {
                        self.labels[(i as usize, j as usize)] = label;
                    }
                }
                label += 1;
                y += cell0;
            }
            x += cell0;
        }
        self.num_labels = label;
    }

    fn seed_poisson_weighted(&mut self, k: i32, s: i32) {
        let (rows, cols) = (self.difference.rows(), self.difference.cols());
        let mut p = self.difference.clone();
        let mut rng = fastrand::Rng::with_seed(self.seed);

        // cumulative distribution over the original energies
        let mut cumulative = Vec::with_capacity(p.len());
        let mut total = 0.0;
        for &v in p.data() {
            total += v.max(0.0);
            cumulative.push(total);
        }
        if total <= 0.0 {
            // degenerate difference map: fall back to the plain grid
            self.seed_grid(s);
            return;
        }

        let mut samples: Vec<Vec2> = Vec::with_capacity(k as usize);
        'outer: for _ in 0..k {
            let mut chosen = None;
            for _ in 0..1000 {
                let r = rng.f64() * total;
                let candidate = cumulative.partition_point(|&c| c < r).min(p.len() - 1);
                if p.at_index(candidate) > 0.0 {
                    chosen = Some(candidate);
                    break;
                }
            }
            let Some(index) = chosen else {
                break 'outer;
            };
            let sample = Vec2::new((index % cols) as f64, (index / cols) as f64);
            if self.mask.at_index(index) == 1.0 {
                // suppress a disk around the accepted sample
                let radius = s / 2;
                let (cx, cy) = (sample.x as i32, sample.y as i32);
                for y in (cy - radius).max(0)..=(cy + radius).min(rows as i32 - 1) {
                    for x in (cx - radius).max(0)..=(cx + radius).min(cols as i32 - 1) {
                        let d = Vec2::new((x - cx) as f64, (y - cy) as f64).length();
                        if d <= radius as f64 {
                            p[(y as usize, x as usize)] = 0.0;
                        }
                    }
                }
                samples.push(sample);
            }
        }

        for sample in samples {
            self.clusters.push(SuperPixel::new(
                sample,
                self.target_lab[(sample.y as usize, sample.x as usize)],
            ));
        }
    }

    /// Move each seed to the lowest-gradient position in its 3x3
    /// neighborhood, away from edges.
    fn perturb_cluster_centers(&mut self) {
        let (rows, cols) = (self.target_lab.rows(), self.target_lab.cols());
        for cluster in &mut self.clusters {
            cluster.area = 0;
            let mut min_g = f64::MAX;
            let o = cluster.center;
            for x_ in (o.x as i32 - 1)..=(o.x as i32 + 1) {
                for y_ in (o.y as i32 - 1)..=(o.y as i32 + 1) {
                    if x_ < 0 || y_ < 0 || x_ >= cols as i32 || y_ >= rows as i32 {
                        continue;
                    }
                    if self.mask[(y_ as usize, x_ as usize)] < 1.0 {
                        continue;
                    }
                    let x = x_ as usize;
                    let y = y_ as usize;
                    let px = border_reflect(x as i64 - 1, cols);
                    let nx = border_reflect(x as i64 + 1, cols);
                    let py = border_reflect(y as i64 - 1, rows);
                    let ny = border_reflect(y as i64 + 1, rows);

                    let g = (self.target_lab[(y, nx)] - self.target_lab[(y, px)]).length()
                        + (self.target_lab[(ny, x)] - self.target_lab[(py, x)]).length();
                    if g < min_g {
                        min_g = g;
                        cluster.center = Vec2::new(x as f64, y as f64);
                        cluster.mean_color = self.target_lab[(y, x)];
                    }
                }
            }
        }
    }

    /// Accumulate per-cluster statistics from a label map and return
    /// the mean center + color movement.
    fn compute_stats(&mut self, labels: &mut Mat<i32>) -> f64 {
        let (rows, cols) = (labels.rows(), labels.cols());
        for y in 0..rows {
            for x in 0..cols {
                let id = labels[(y, x)];
                if self.mask[(y, x)] < 1.0 || id == -1 {
                    continue;
                }
                let cluster = &mut self.clusters[id as usize];
                cluster.mean_color_t += self.target_lab[(y, x)];
                cluster.mean_diff_t += self.difference[(y, x)];
                cluster.center_t += Vec2::new(x as f64, y as f64);
                cluster.area += 1;
            }
        }

        let mut error = 0.0;
        for cluster in &mut self.clusters {
            if cluster.area == 0 {
                continue;
            }
            let f = 1.0 / cluster.area as f64;
            cluster.mean_color_t *= f;
            cluster.mean_diff_t *= f;
            cluster.center_t *= f;

            error += (cluster.center_t - cluster.center).length()
                + (cluster.mean_color - cluster.mean_color_t).length();

            cluster.center = cluster.center_t;
            cluster.mean_color = cluster.mean_color_t;
            cluster.mean_diff = cluster.mean_diff_t;
            cluster.max_color = cluster.max_color_t;
            cluster.max_diff = cluster.max_diff_t;
            cluster.max_spatial = cluster.max_spatial_t;
        }
        if self.clusters.is_empty() {
            0.0
        } else {
            error / self.clusters.len() as f64
        }
    }

    /// SLICO distance with per-cluster adaptive normalization.
    fn distance(&mut self, cluster_index: usize, pos: Vec2i) -> f64 {
        let (y, x) = (pos.y as usize, pos.x as usize);
        let lab = self.target_lab[(y, x)];
        let diff = self.difference[(y, x)];
        let cluster = &mut self.clusters[cluster_index];

        let dc = (cluster.mean_color - lab).length();
        let ds = (cluster.center - Vec2::new(pos.x as f64, pos.y as f64)).length();

        cluster.max_color_t = cluster.max_color_t.max(dc);
        cluster.max_spatial_t = cluster.max_spatial_t.max(ds);

        if self.use_diff_weight {
            let dd = (cluster.mean_diff - diff).abs();
            cluster.max_diff_t = cluster.max_diff_t.max(dd);
            ((dc / cluster.max_color).powi(2)
                + (dd / cluster.max_diff).powi(2)
                + (ds / cluster.max_spatial).powi(2))
            .sqrt()
        } else {
            ((dc / cluster.max_color).powi(2) + (ds / cluster.max_spatial).powi(2)).sqrt()
        }
    }
}

/// Relabel into 4-connected components, absorbing components smaller
/// than a quarter of the nominal superpixel size into an adjacent
/// label. Returns the new labels and the label count.
fn enforce_label_connectivity(labels: &Mat<i32>, k: i32) -> (Mat<i32>, i32) {
    let (rows, cols) = (labels.rows(), labels.cols());
    let sz = rows * cols;
    let sup_sz = (sz as i32 / k).max(1);

    let xn4 = [-1_i32, 0, 1, 0];
    let yn4 = [0_i32, -1, 0, 1];

    let mut nlabels = Mat::filled(rows, cols, -1_i32);
    let mut label = 0;
    let mut xs = vec![0_i32; sz];
    let mut ys = vec![0_i32; sz];
    let mut adjlabel = 0;

    for j in 0..rows as i32 {
        for k_ in 0..cols as i32 {
            let oindex = (j as usize, k_ as usize);
            if nlabels[oindex] >= 0 {
                continue;
            }
            nlabels[oindex] = label;
            xs[0] = k_;
            ys[0] = j;

            // remember a neighboring label for possible absorption
            for n in 0..4 {
                let x = xs[0] + xn4[n];
                let y = ys[0] + yn4[n];
                if x >= 0 && x < cols as i32 && y >= 0 && y < rows as i32 {
                    let nl = nlabels[(y as usize, x as usize)];
                    if nl >= 0 {
                        adjlabel = nl;
                    }
                }
            }

            let mut count = 1;
            let mut c = 0;
            while c < count {
                for n in 0..4 {
                    let x = xs[c] + xn4[n];
                    let y = ys[c] + yn4[n];
                    if x >= 0 && x < cols as i32 && y >= 0 && y < rows as i32 {
                        let nindex = (y as usize, x as usize);
                        if nlabels[nindex] < 0 && labels[oindex] == labels[nindex] {
                            xs[count] = x;
                            ys[count] = y;
                            nlabels[nindex] = label;
                            count += 1;
                        }
                    }
                }
                c += 1;
            }

            if count <= (sup_sz >> 2) as usize {
                for c in 0..count {
                    nlabels[(ys[c] as usize, xs[c] as usize)] = adjlabel;
                }
                label -= 1;
            }
            label += 1;
        }
    }
    (nlabels, label)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tone_lab(rows: usize, cols: usize) -> Mat<Vec3> {
        Mat::from_fn(rows, cols, |_, c| {
            if c < cols / 2 {
                Vec3::new(30.0, 10.0, 10.0)
            } else {
                Vec3::new(80.0, -10.0, -10.0)
            }
        })
    }

    #[test]
    fn test_region_mean_and_rms() {
        let data = Mat::from_vec(1, 4, vec![1.0, 2.0, 3.0, 4.0]);
        let region = ImageRegion::new(
            0,
            vec![Vec2i::new(0, 0), Vec2i::new(1, 0), Vec2i::new(2, 0), Vec2i::new(3, 0)],
        );
        assert!((region.mean(&data) - 2.5).abs() < 1e-12);
        let expected_rms = ((1.0 + 4.0 + 9.0 + 16.0) / 4.0_f64).sqrt();
        assert!((region.rms(&data) - expected_rms).abs() < 1e-12);
    }

    #[test]
    fn test_region_bounding_rect_and_spatial_mean() {
        let region = ImageRegion::new(0, vec![Vec2i::new(2, 3), Vec2i::new(5, 7)]);
        assert_eq!(region.bounding_rect(), (2, 3, 4, 5));
        let mean = region.spatial_mean();
        assert!((mean - Vec2::new(3.5, 5.0)).length() < 1e-12);
    }

    #[test]
    fn test_inscribed_circle_of_square() {
        let mut points = Vec::new();
        for y in 10..30 {
            for x in 10..30 {
                points.push(Vec2i::new(x, y));
            }
        }
        let region = ImageRegion::new(0, points);
        let (center, radius) = region.inscribed_circle();
        // a 20x20 square fits a disk of radius ~9 at its center
        assert!((center.x - 19.5).abs() <= 1.5);
        assert!((center.y - 19.5).abs() <= 1.5);
        assert!(radius > 7.0 && radius < 11.0, "radius = {radius}");
    }

    #[test]
    fn test_segmentation_is_partition() {
        let target = two_tone_lab(48, 48);
        let canvas = Mat::filled(48, 48, Vec3::new(100.0, 0.0, 0.0));
        let mut seg = SuperpixelSegmentation::new();
        seg.set_strategy(SeedingStrategy::Grid);
        seg.extract(&target, &canvas, None, 12);

        let mut regions = BTreeMap::new();
        let labels = seg.regions(&mut regions);

        // every labeled pixel belongs to exactly the region holding it
        for (label, region) in &regions {
            for p in region.points() {
                assert_eq!(labels[(p.y as usize, p.x as usize)], *label);
            }
        }
        let labeled: usize = regions.values().map(|r| r.points().len()).sum();
        let non_negative = labels.data().iter().filter(|&&l| l >= 0).count();
        assert_eq!(labeled, non_negative);
        assert!(!regions.is_empty());
    }

    #[test]
    fn test_regions_are_connected() {
        let target = two_tone_lab(40, 40);
        let canvas = Mat::filled(40, 40, Vec3::ZERO);
        let mut seg = SuperpixelSegmentation::new();
        seg.set_strategy(SeedingStrategy::Grid);
        seg.extract(&target, &canvas, None, 10);
        let mut regions = BTreeMap::new();
        let _ = seg.regions(&mut regions);

        for region in regions.values() {
            if region.points().len() < 2 {
                continue;
            }
            // flood from the first point must reach every point
            let pts: std::collections::HashSet<(i32, i32)> =
                region.points().iter().map(|p| (p.x, p.y)).collect();
            let mut seen = std::collections::HashSet::new();
            let mut stack = vec![(region.points()[0].x, region.points()[0].y)];
            seen.insert(stack[0]);
            while let Some((x, y)) = stack.pop() {
                for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                    let q = (x + dx, y + dy);
                    if pts.contains(&q) && seen.insert(q) {
                        stack.push(q);
                    }
                }
            }
            assert_eq!(seen.len(), pts.len(), "region {} not 4-connected", region.label());
        }
    }

    #[test]
    fn test_masked_pixels_unlabeled() {
        let target = two_tone_lab(32, 32);
        let canvas = Mat::filled(32, 32, Vec3::ZERO);
        let mask = Mat::from_fn(32, 32, |r, _| if r < 16 { 1.0 } else { 0.0 });
        let mut seg = SuperpixelSegmentation::new();
        seg.set_strategy(SeedingStrategy::Grid);
        seg.extract(&target, &canvas, Some(&mask), 8);
        let mut regions = BTreeMap::new();
        let _ = seg.regions(&mut regions);
        for region in regions.values() {
            for p in region.points() {
                assert!(p.y < 16, "masked pixel labeled: {p:?}");
            }
        }
    }

    #[test]
    fn test_poisson_seeding_runs() {
        let target = two_tone_lab(40, 40);
        let canvas = Mat::filled(40, 40, Vec3::ZERO);
        let mut seg = SuperpixelSegmentation::new();
        seg.set_strategy(SeedingStrategy::PoissonWeighted);
        seg.set_seed(11);
        seg.extract(&target, &canvas, None, 10);
        let mut regions = BTreeMap::new();
        let _ = seg.regions(&mut regions);
        assert!(!regions.is_empty());
    }
}
