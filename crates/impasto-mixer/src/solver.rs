//! Bounded Levenberg-Marquardt for the small dense least-squares
//! problems of the mixer.
//!
//! The residual callback fills a vector and may report an invalid
//! parameter point by returning false; such steps are rejected. Box
//! constraints are enforced by projecting every candidate onto the
//! bounds.

use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    pub max_iterations: usize,
    pub function_tolerance: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            function_tolerance: 1e-9,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolveResult {
    pub params: Vec<f64>,
    pub cost: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimize `0.5 * ||r(x)||^2` subject to `lower <= x <= upper`.
///
/// `residual(x, &mut r)` must fill `r` (its length fixes the residual
/// count) and return whether the point was evaluable.
pub fn levenberg_marquardt<F>(
    mut residual: F,
    initial: &[f64],
    lower: &[f64],
    upper: &[f64],
    options: SolveOptions,
) -> SolveResult
where
    F: FnMut(&[f64], &mut Vec<f64>) -> bool,
{
    let n = initial.len();
    assert_eq!(lower.len(), n);
    assert_eq!(upper.len(), n);

    let clamp = |x: &mut [f64]| {
        for j in 0..n {
            x[j] = x[j].clamp(lower[j], upper[j]);
        }
    };

    let mut x: Vec<f64> = initial.to_vec();
    clamp(&mut x);

    let mut r = Vec::new();
    if !residual(&x, &mut r) || r.is_empty() {
        debug!("residual not evaluable at the initial point");
        return SolveResult {
            params: x,
            cost: f64::INFINITY,
            iterations: 0,
            converged: false,
        };
    }
    let m = r.len();
    let mut cost = 0.5 * norm_sq(&r);

    let mut lambda = 1e-3;
    let mut converged = false;
    let mut iterations = 0;

    let mut jacobian = vec![0.0; m * n];
    let mut r_probe = Vec::with_capacity(m);

    while iterations < options.max_iterations {
        iterations += 1;

        // forward-difference Jacobian, flipped near the upper bound
        let mut evaluable = true;
        for j in 0..n {
            let h = (1e-8 * x[j].abs()).max(1e-10);
            let forward = x[j] + h <= upper[j];
            let mut probe = x.clone();
            probe[j] = if forward { x[j] + h } else { x[j] - h };
            if !residual(&probe, &mut r_probe) || r_probe.len() != m {
                evaluable = false;
                break;
            }
            let sign = if forward { 1.0 } else { -1.0 };
            for i in 0..m {
                jacobian[i * n + j] = sign * (r_probe[i] - r[i]) / h;
            }
        }
        if !evaluable {
            break;
        }

        // normal equations: (J^T J + lambda diag(J^T J)) delta = -J^T r
        let mut jtj = vec![0.0; n * n];
        let mut jtr = vec![0.0; n];
        for i in 0..m {
            for a in 0..n {
                let ja = jacobian[i * n + a];
                jtr[a] += ja * r[i];
                for b in a..n {
                    jtj[a * n + b] += ja * jacobian[i * n + b];
                }
            }
        }
        for a in 0..n {
            for b in 0..a {
                jtj[a * n + b] = jtj[b * n + a];
            }
        }

        let grad_norm = jtr.iter().map(|v| v.abs()).fold(0.0, f64::max);
        if grad_norm < 1e-12 {
            converged = true;
            break;
        }

        let mut improved = false;
        for _ in 0..16 {
            let mut damped = jtj.clone();
            for a in 0..n {
                let d = damped[a * n + a];
                damped[a * n + a] = d + lambda * d.max(1e-12);
            }
            let rhs: Vec<f64> = jtr.iter().map(|v| -v).collect();
            let Some(delta) = solve_linear(&mut damped, &rhs, n) else {
                lambda *= 10.0;
                continue;
            };

            let mut candidate: Vec<f64> = (0..n).map(|j| x[j] + delta[j]).collect();
            clamp(&mut candidate);

            if !residual(&candidate, &mut r_probe) || r_probe.len() != m {
                lambda *= 10.0;
                continue;
            }
            let candidate_cost = 0.5 * norm_sq(&r_probe);
            if candidate_cost < cost {
                let relative_drop = (cost - candidate_cost) / cost.max(1e-300);
                x = candidate;
                std::mem::swap(&mut r, &mut r_probe);
                cost = candidate_cost;
                lambda = (lambda * 0.3).max(1e-12);
                improved = true;
                if relative_drop < options.function_tolerance {
                    converged = true;
                }
                break;
            }
            lambda *= 10.0;
        }

        if !improved || converged {
            converged = converged || !improved && cost.is_finite() && grad_norm < 1e-6;
            break;
        }
    }

    debug!(iterations, cost, converged, "lm solve finished");
    SolveResult {
        params: x,
        cost,
        iterations,
        converged,
    }
}

fn norm_sq(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

/// Gaussian elimination with partial pivoting; `a` is n x n row-major
/// and is consumed as scratch. Returns None for a singular system.
fn solve_linear(a: &mut [f64], b: &[f64], n: usize) -> Option<Vec<f64>> {
    let mut x: Vec<f64> = b.to_vec();

    for col in 0..n {
        // pivot
        let mut pivot = col;
        for row in col + 1..n {
            if a[row * n + col].abs() > a[pivot * n + col].abs() {
                pivot = row;
            }
        }
        if a[pivot * n + col].abs() < 1e-300 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap(col * n + k, pivot * n + k);
            }
            x.swap(col, pivot);
        }

        let inv = 1.0 / a[col * n + col];
        for row in col + 1..n {
            let factor = a[row * n + col] * inv;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row * n + k] -= factor * a[col * n + k];
            }
            x[row] -= factor * x[col];
        }
    }

    for col in (0..n).rev() {
        let mut acc = x[col];
        for k in col + 1..n {
            acc -= a[col * n + k] * x[k];
        }
        x[col] = acc / a[col * n + col];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solves_1d_quadratic() {
        // r(x) = x - 3, minimum at x = 3
        let result = levenberg_marquardt(
            |x, r| {
                r.clear();
                r.push(x[0] - 3.0);
                true
            },
            &[0.0],
            &[-10.0],
            &[10.0],
            SolveOptions::default(),
        );
        assert!((result.params[0] - 3.0).abs() < 1e-6);
        assert!(result.converged);
    }

    #[test]
    fn test_respects_bounds() {
        // unconstrained minimum at 5, but upper bound is 2
        let result = levenberg_marquardt(
            |x, r| {
                r.clear();
                r.push(x[0] - 5.0);
                true
            },
            &[0.0],
            &[0.0],
            &[2.0],
            SolveOptions::default(),
        );
        assert!(result.params[0] <= 2.0 + 1e-12);
        assert!((result.params[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_rosenbrock_descends() {
        let start_cost = {
            let r = [1.0 - (-1.2), 10.0 * (1.0 - (-1.2_f64).powi(2))];
            0.5 * (r[0] * r[0] + r[1] * r[1])
        };
        let result = levenberg_marquardt(
            |x, r| {
                r.clear();
                r.push(1.0 - x[0]);
                r.push(10.0 * (x[1] - x[0] * x[0]));
                true
            },
            &[-1.2, 1.0],
            &[-10.0, -10.0],
            &[10.0, 10.0],
            SolveOptions {
                max_iterations: 500,
                function_tolerance: 1e-12,
            },
        );
        assert!(result.cost < start_cost * 1e-3);
        assert!((result.params[0] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_invalid_initial_point() {
        let result = levenberg_marquardt(
            |_, _| false,
            &[1.0],
            &[0.0],
            &[2.0],
            SolveOptions::default(),
        );
        assert!(!result.converged);
        assert!(result.cost.is_infinite());
    }

    #[test]
    fn test_linear_solve() {
        // [2 1; 1 3] x = [5; 10] -> x = [1; 3]
        let mut a = vec![2.0, 1.0, 1.0, 3.0];
        let x = solve_linear(&mut a, &[5.0, 10.0], 2).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
    }
}
