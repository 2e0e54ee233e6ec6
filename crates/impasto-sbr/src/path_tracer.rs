//! Streamline tracing through a structure tensor field.
//!
//! Paths grow forward and backward from a seed, following the edge
//! tangent flow, bounded by a frame, a point budget and a per-position
//! predicate.

use std::collections::VecDeque;

use impasto_core::mat::Mat;
use impasto_core::vec::{Vec2, Vec3};
use impasto_image::tensor::min_eigenvector;

/// Verdict of the per-position predicate at each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathEval {
    /// Keep growing.
    Continue,
    /// Stop here once the minimum length is reached.
    StopNext,
    /// Stop immediately; the position is not added.
    StopNow,
}

/// Axis-aligned bounding rectangle in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x < self.x + self.width && p.y >= self.y && p.y < self.y + self.height
    }
}

struct Stepper {
    p: Vec2,
    t: Vec2,
    w: f64,
    dw: f64,
}

/// Generates bounded-length streamlines of the edge tangent field.
pub struct PathTracer {
    tensor_field: Mat<Vec3>,
    max_len: u32,
    min_len: u32,
    frame: Rect,
    step: f64,
    fc: f64,
}

impl PathTracer {
    pub fn new(tensor_field: Mat<Vec3>) -> Self {
        let frame = Rect::new(
            0.0,
            0.0,
            tensor_field.cols() as f64,
            tensor_field.rows() as f64,
        );
        Self {
            tensor_field,
            max_len: 12,
            min_len: 2,
            frame,
            step: 1.0,
            fc: 1.0,
        }
    }

    pub fn set_tensor_field(&mut self, tensor_field: Mat<Vec3>) {
        self.tensor_field = tensor_field;
    }

    pub fn max_len(&self) -> u32 {
        self.max_len
    }

    pub fn set_max_len(&mut self, max_len: u32) {
        self.max_len = max_len;
    }

    pub fn min_len(&self) -> u32 {
        self.min_len
    }

    pub fn set_min_len(&mut self, min_len: u32) {
        self.min_len = min_len;
    }

    pub fn frame(&self) -> Rect {
        self.frame
    }

    pub fn set_frame(&mut self, frame: Rect) {
        self.frame = frame;
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn set_step(&mut self, step: f64) {
        self.step = step;
    }

    /// Curvature blend: 1 follows the flow field exactly, 0 keeps the
    /// previous direction.
    pub fn curvature_blend(&self) -> f64 {
        self.fc
    }

    pub fn set_curvature_blend(&mut self, fc: f64) {
        self.fc = fc;
    }

    /// Trace with no constraint beyond the frame.
    pub fn trace(&self, seed: Vec2) -> Vec<Vec2> {
        self.trace_with(seed, |_| PathEval::Continue)
    }

    /// Trace a streamline seeded at `seed`, consulting `eval` at every
    /// candidate position. Backward points come first (reversed), then
    /// the forward points.
    pub fn trace_with(&self, seed: Vec2, eval: impl Fn(Vec2) -> PathEval) -> Vec<Vec2> {
        let mut path = VecDeque::new();

        if !self.frame.contains(seed) || eval(seed) == PathEval::StopNow {
            return Vec::new();
        }

        let t = self.field_direction(seed);
        let mut forward = Stepper {
            p: seed,
            t,
            w: 0.0,
            dw: 0.0,
        };
        let mut backward = Stepper {
            p: seed,
            t: -t,
            w: 0.0,
            dw: 0.0,
        };

        path.push_back(seed);
        forward.w += self.step;

        let mut grow_forward = true;
        let mut grow_backward = true;

        while ((forward.w + backward.w) / self.step) < self.max_len as f64
            && (grow_forward || grow_backward)
        {
            if grow_forward {
                self.step_next(&mut forward);
                if self.frame.contains(forward.p) {
                    match eval(forward.p) {
                        PathEval::StopNow => grow_forward = false,
                        verdict => {
                            if verdict != PathEval::Continue
                                && (forward.w + backward.w) / self.step >= self.min_len as f64
                            {
                                grow_forward = false;
                            } else if path.back() != Some(&forward.p) {
                                path.push_back(forward.p);
                            }
                        }
                    }
                } else {
                    grow_forward = false;
                }
            }

            if grow_backward {
                self.step_next(&mut backward);
                if self.frame.contains(backward.p) {
                    match eval(backward.p) {
                        PathEval::StopNow => grow_backward = false,
                        verdict => {
                            if verdict != PathEval::Continue
                                && (forward.w + backward.w) / self.step >= self.min_len as f64
                            {
                                grow_backward = false;
                            } else if path.front() != Some(&backward.p) {
                                path.push_front(backward.p);
                            }
                        }
                    }
                } else {
                    grow_backward = false;
                }
            }
        }

        path.into_iter().collect()
    }

    /// Normalized edge tangent at a position, vertical fallback.
    fn field_direction(&self, p: Vec2) -> Vec2 {
        let v = min_eigenvector(self.tensor_field.bilinear(p));
        v.normalize_or(Vec2::new(0.0, 1.0))
    }

    fn step_next(&self, s: &mut Stepper) {
        let mut t = self.field_direction(s.p);

        // keep heading: flip if the field points backwards
        if t.dot(s.t) < 0.0 {
            t = -t;
        }

        // blend with the previous direction
        if self.fc < 1.0 {
            let blended = t * self.fc + s.t * (1.0 - self.fc);
            t = blended.normalize_or(s.t);
        }
        s.t = t;

        s.dw = if self.step <= 1.0 {
            // sub-pixel stepping: advance to the next cell boundary
            let sign = |x: f64| if x <= 0.0 { -1.0 } else { 1.0 };
            if t.x.abs() >= t.y.abs() {
                (((s.p.x - s.p.x.floor()) - 0.5 - sign(t.x)) / t.x).abs()
            } else {
                (((s.p.y - s.p.y.floor()) - 0.5 - sign(t.y)) / t.y).abs()
            }
        } else {
            self.step
        };

        s.p += t * s.dw;
        s.w += s.dw;
    }
}
