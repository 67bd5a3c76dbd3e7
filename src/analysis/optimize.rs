//! Bounded nonlinear least squares (projected Levenberg-Marquardt).
//!
//! Small, dense problems only: the airflow fit has three parameters and at
//! most a few hundred residuals. The Jacobian is estimated with forward
//! differences, steps are projected back into the parameter box.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    #[error("bounds and initial guess have different dimensions")]
    DimensionMismatch,

    #[error("lower bound {lower} exceeds upper bound {upper} for parameter {index}")]
    InvalidBounds { index: usize, lower: f64, upper: f64 },

    #[error("no residuals to minimise")]
    NoResiduals,

    #[error("residual function returned a non-finite value at the starting point")]
    NonFinite,

    #[error("normal equations are singular")]
    Singular,
}

/// Box constraints on the parameters
#[derive(Clone, Debug, PartialEq)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self { lower, upper }
    }

    fn clamp(&self, x: &mut [f64]) {
        for ((v, lo), hi) in x.iter_mut().zip(&self.lower).zip(&self.upper) {
            *v = v.clamp(*lo, *hi);
        }
    }
}

#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// Cap on residual-function evaluations (Jacobian columns included)
    pub max_evaluations: usize,
    /// Stop when a step reduces the cost by less than this fraction
    pub cost_tolerance: f64,
    /// Stop when the projected gradient falls below this
    pub gradient_tolerance: f64,
    pub initial_damping: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_evaluations: 5000,
            cost_tolerance: 1e-12,
            gradient_tolerance: 1e-14,
            initial_damping: 1e-3,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    pub params: Vec<f64>,
    /// Half the sum of squared residuals at `params`
    pub cost: f64,
    pub evaluations: usize,
    pub converged: bool,
}

const MAX_DAMPING: f64 = 1e12;

/// Minimise `0.5 * Σ residuals(x)²` subject to `bounds`.
pub fn least_squares<F>(
    residuals: F,
    x0: &[f64],
    bounds: &Bounds,
    config: &SolverConfig,
) -> Result<Solution, OptimizeError>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n = x0.len();
    if bounds.lower.len() != n || bounds.upper.len() != n {
        return Err(OptimizeError::DimensionMismatch);
    }
    for (index, (&lower, &upper)) in bounds.lower.iter().zip(&bounds.upper).enumerate() {
        if !(lower <= upper) {
            return Err(OptimizeError::InvalidBounds {
                index,
                lower,
                upper,
            });
        }
    }

    let mut x = x0.to_vec();
    bounds.clamp(&mut x);

    let mut r = residuals(&x);
    let mut evaluations = 1;
    if r.is_empty() {
        return Err(OptimizeError::NoResiduals);
    }
    if r.iter().any(|v| !v.is_finite()) {
        return Err(OptimizeError::NonFinite);
    }
    let mut cost = half_sum_squares(&r);
    let mut damping = config.initial_damping;
    let mut converged = false;

    'outer: while evaluations < config.max_evaluations {
        if cost == 0.0 {
            converged = true;
            break;
        }

        let jac = forward_jacobian(&residuals, &x, &r, bounds);
        evaluations += n;

        // Normal equations: (JᵀJ) δ = -Jᵀr
        let mut jtj = vec![vec![0.0; n]; n];
        let mut jtr = vec![0.0; n];
        for (i, ri) in r.iter().enumerate() {
            for a in 0..n {
                jtr[a] += jac[a][i] * ri;
                for b in 0..n {
                    jtj[a][b] += jac[a][i] * jac[b][i];
                }
            }
        }

        if projected_gradient_norm(&x, &jtr, bounds) < config.gradient_tolerance {
            converged = true;
            break;
        }

        loop {
            if evaluations >= config.max_evaluations {
                break 'outer;
            }

            let mut damped = jtj.clone();
            for (a, row) in damped.iter_mut().enumerate() {
                let diag = row[a];
                row[a] = diag + damping * diag.max(1e-9);
            }
            let rhs: Vec<f64> = jtr.iter().map(|g| -g).collect();

            let step = match solve_linear(damped, rhs) {
                Some(step) => step,
                None => {
                    damping *= 10.0;
                    if damping > MAX_DAMPING {
                        if evaluations <= 1 + n {
                            return Err(OptimizeError::Singular);
                        }
                        break 'outer;
                    }
                    continue;
                }
            };

            let mut candidate: Vec<f64> = x.iter().zip(&step).map(|(xi, s)| xi + s).collect();
            bounds.clamp(&mut candidate);

            let moved = candidate
                .iter()
                .zip(&x)
                .map(|(c, xi)| (c - xi).abs())
                .fold(0.0, f64::max);
            if moved == 0.0 {
                converged = true;
                break 'outer;
            }

            let r_new = residuals(&candidate);
            evaluations += 1;
            let cost_new = if r_new.iter().all(|v| v.is_finite()) {
                half_sum_squares(&r_new)
            } else {
                f64::INFINITY
            };

            if cost_new < cost {
                let reduction = (cost - cost_new) / cost;
                x = candidate;
                r = r_new;
                cost = cost_new;
                damping = (damping / 10.0).max(1e-12);

                if reduction < config.cost_tolerance {
                    converged = true;
                    break 'outer;
                }
                break;
            }

            damping *= 10.0;
            if damping > MAX_DAMPING {
                // No downhill direction left at this point
                converged = true;
                break 'outer;
            }
        }
    }

    Ok(Solution {
        params: x,
        cost,
        evaluations,
        converged,
    })
}

fn half_sum_squares(r: &[f64]) -> f64 {
    0.5 * r.iter().map(|v| v * v).sum::<f64>()
}

/// Column-major Jacobian: `jac[param][residual]`
fn forward_jacobian<F>(residuals: &F, x: &[f64], r: &[f64], bounds: &Bounds) -> Vec<Vec<f64>>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let eps = f64::EPSILON.sqrt();
    (0..x.len())
        .map(|j| {
            let mut h = eps * x[j].abs().max(1.0);
            // Step inward when the forward step would leave the box
            if x[j] + h > bounds.upper[j] {
                h = -h;
            }
            let mut probe = x.to_vec();
            probe[j] += h;
            let r_probe = residuals(&probe);
            r_probe
                .iter()
                .zip(r)
                .map(|(rp, r0)| {
                    let d = (rp - r0) / h;
                    if d.is_finite() {
                        d
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

/// Gradient norm ignoring components that push against an active bound
fn projected_gradient_norm(x: &[f64], grad: &[f64], bounds: &Bounds) -> f64 {
    x.iter()
        .zip(grad)
        .enumerate()
        .map(|(i, (xi, g))| {
            let at_lower = *xi <= bounds.lower[i] && *g > 0.0;
            let at_upper = *xi >= bounds.upper[i] && *g < 0.0;
            if at_lower || at_upper {
                0.0
            } else {
                g.abs()
            }
        })
        .fold(0.0, f64::max)
}

/// Gaussian elimination with partial pivoting
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| {
            a[i][col]
                .abs()
                .partial_cmp(&a[j][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot][col].abs() < 1e-300 || !a[pivot][col].is_finite() {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let f = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= f * a[col][k];
            }
            b[row] -= f * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    x.iter().all(|v| v.is_finite()).then_some(x)
}
