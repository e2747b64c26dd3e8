//! Arctan model fitting for completeness curves.
//!
//! The detection fraction of stars versus magnitude is modelled as
//!
//! ```text
//! f(m) = 0.5 - atan(A * m + B) / pi
//! ```
//!
//! which falls from 1 to 0 and crosses 0.5 at `m = -B / A`. Fitting minimises
//! chi-square against the measured fraction with per-bin uncertainties.

use log::debug;
use nalgebra::{Matrix2, Vector2};
use std::f64::consts::PI;
use thiserror::Error;
use viz::completeness::arctan_model;

#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("Need at least {needed} points with nonzero uncertainty, got {got}")]
    TooFewPoints { needed: usize, got: usize },

    #[error("Input slices differ in length")]
    MismatchedLengths,

    #[error("Normal equations are singular")]
    Singular,

    #[error("Did not converge after {0} iterations")]
    NoConvergence(usize),

    #[error("Fitted parameters are not usable: A={a}, B={b}")]
    BadParameters { a: f64, b: f64 },

    #[error("Model crossing {crossing} lies outside the fitted range [{min}, {max}]")]
    CrossingOutOfRange { crossing: f64, min: f64, max: f64 },
}

/// Parameters of a fitted completeness model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArctanFit {
    pub a: f64,
    pub b: f64,
    pub chi2: f64,
    pub iterations: usize,
}

impl ArctanFit {
    /// Magnitude where the model crosses 0.5.
    pub fn crossing(&self) -> f64 {
        -self.b / self.a
    }

    pub fn evaluate(&self, m: f64) -> f64 {
        arctan_model(self.a, self.b, m)
    }
}

/// Fits the completeness model to a sampled detection fraction.
///
/// `x` are bin centres, `y` the detection fraction and `dy` its uncertainty
/// (all entries nonzero). `start` is the initial `(A, B)`.
pub trait DepthFitter: std::fmt::Debug {
    fn fit(
        &self,
        x: &[f64],
        y: &[f64],
        dy: &[f64],
        start: (f64, f64),
    ) -> Result<ArctanFit, FitError>;
}

/// Damped Gauss-Newton minimiser for the two-parameter arctan model
#[derive(Debug, Clone)]
pub struct LevenbergMarquardt {
    pub max_iterations: usize,
    /// Stop once the relative chi-square improvement falls below this
    pub tolerance: f64,
    pub initial_lambda: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
        }
    }
}

const MIN_LAMBDA: f64 = 1e-12;
const MAX_LAMBDA: f64 = 1e12;

fn chi2(x: &[f64], y: &[f64], dy: &[f64], a: f64, b: f64) -> f64 {
    x.iter()
        .zip(y)
        .zip(dy)
        .map(|((&x, &y), &dy)| {
            let r = (arctan_model(a, b, x) - y) / dy;
            r * r
        })
        .sum()
}

/// `J^T J` and `J^T r` for the weighted residuals at `(a, b)`.
fn normal_equations(
    x: &[f64],
    y: &[f64],
    dy: &[f64],
    a: f64,
    b: f64,
) -> (Matrix2<f64>, Vector2<f64>) {
    let mut jtj = Matrix2::zeros();
    let mut jtr = Vector2::zeros();
    for ((&x, &y), &dy) in x.iter().zip(y).zip(dy) {
        let u = a * x + b;
        let common = -1.0 / (PI * (1.0 + u * u) * dy);
        let j = Vector2::new(common * x, common);
        let r = (arctan_model(a, b, x) - y) / dy;
        jtj += j * j.transpose();
        jtr += j * r;
    }
    (jtj, jtr)
}

impl DepthFitter for LevenbergMarquardt {
    fn fit(
        &self,
        x: &[f64],
        y: &[f64],
        dy: &[f64],
        start: (f64, f64),
    ) -> Result<ArctanFit, FitError> {
        if x.len() != y.len() || x.len() != dy.len() {
            return Err(FitError::MismatchedLengths);
        }
        // Two free parameters plus one degree of freedom
        if x.len() < 3 {
            return Err(FitError::TooFewPoints {
                needed: 3,
                got: x.len(),
            });
        }

        let (mut a, mut b) = start;
        let mut lambda = self.initial_lambda;
        let mut current = chi2(x, y, dy, a, b);
        let mut converged = false;
        let mut iterations = 0;

        for iter in 0..self.max_iterations {
            iterations = iter + 1;
            let (jtj, jtr) = normal_equations(x, y, dy, a, b);

            let mut damped = jtj;
            for i in 0..2 {
                damped[(i, i)] *= 1.0 + lambda;
            }
            let delta = damped.lu().solve(&(-jtr)).ok_or(FitError::Singular)?;

            let (new_a, new_b) = (a + delta[0], b + delta[1]);
            let candidate = chi2(x, y, dy, new_a, new_b);

            if candidate.is_finite() && candidate <= current {
                let improvement = current - candidate;
                a = new_a;
                b = new_b;
                current = candidate;
                lambda = (lambda * self.lambda_down).max(MIN_LAMBDA);
                if improvement <= self.tolerance * current.max(f64::MIN_POSITIVE) {
                    converged = true;
                    break;
                }
            } else {
                lambda *= self.lambda_up;
                if lambda > MAX_LAMBDA {
                    // Every direction increases chi2; we are at the minimum
                    converged = true;
                    break;
                }
            }
        }

        if !converged {
            return Err(FitError::NoConvergence(iterations));
        }

        debug!("arctan fit A={a:.4} B={b:.4} chi2={current:.3} after {iterations} iterations");

        Ok(ArctanFit {
            a,
            b,
            chi2: current,
            iterations,
        })
    }
}

/// Check that a fit yields a usable depth inside the magnitudes it was fitted on.
pub fn validated_crossing(fit: &ArctanFit, x: &[f64]) -> Result<f64, FitError> {
    if !(fit.a > 0.0) || !fit.b.is_finite() || !fit.a.is_finite() {
        return Err(FitError::BadParameters { a: fit.a, b: fit.b });
    }
    let crossing = fit.crossing();
    let min = x.iter().copied().fold(f64::INFINITY, f64::min);
    let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !crossing.is_finite() || crossing < min || crossing > max {
        return Err(FitError::CrossingOutOfRange { crossing, min, max });
    }
    Ok(crossing)
}
