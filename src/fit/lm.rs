//! Levenberg-Marquardt over a generic residual function.
//!
//! Given:
//! - a residual map `r(x)` that never fails (infeasible points return a penalty)
//! - an admissibility predicate on `x`
//! - a starting point `x0`
//!
//! each iteration:
//! - forms a central finite-difference Jacobian `J` at the current point
//! - solves `(JᵀJ + λ·diag(JᵀJ)) δ = −Jᵀr`
//! - halves `δ` until `x + δ` is admissible
//! - accepts the step if `Σr²` decreases, otherwise raises `λ` and retries
//!
//! `λ` follows Nielsen's update: on acceptance it shrinks by
//! `max(1/3, 1 − (2ρ − 1)³)` where `ρ` is the gain ratio; on rejection it grows
//! by a doubling factor `ν`.
//!
//! The variables are expected to be scaled to order one by the caller, so step
//! and finite-difference tolerances are relative to `max(1, |x|)`.

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

use crate::domain::{FitConfig, FitControl, Termination};
use crate::error::AdsaError;
use crate::fit::jacobian::finite_difference_jacobian;
use crate::math::solve_damped_step;

/// A nonlinear least-squares objective `Σ rᵢ(x)²`.
///
/// Implementations must be pure: identical `x` gives identical residuals.
pub trait LeastSquaresProblem: Sync {
    /// Residuals at `x`, always of the same length.
    fn residuals(&self, x: &[f64]) -> Vec<f64>;

    /// Whether `x` lies in the admissible domain.
    fn is_admissible(&self, x: &[f64]) -> bool {
        x.iter().all(|v| v.is_finite())
    }
}

/// Engine settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmConfig {
    pub max_iterations: usize,
    pub objective_tolerance: f64,
    pub step_tolerance: f64,
    /// Objective at or below which the fit counts as exact.
    pub objective_floor: f64,
    pub initial_damping: f64,
    pub max_damping: f64,
    pub fd_step: f64,
    pub max_projection_attempts: usize,
    pub parallel: bool,
}

impl LmConfig {
    pub fn from_fit_config(config: &FitConfig, objective_floor: f64) -> Self {
        Self {
            max_iterations: config.max_iterations,
            objective_tolerance: config.objective_tolerance,
            step_tolerance: config.step_tolerance,
            objective_floor,
            initial_damping: config.initial_damping,
            max_damping: config.max_damping,
            fd_step: config.fd_step,
            max_projection_attempts: config.max_projection_attempts,
            parallel: config.parallel,
        }
    }
}

/// State reported to the observer after each accepted iteration.
#[derive(Debug, Clone, Copy)]
pub struct LmIterate<'a> {
    pub iteration: usize,
    pub x: &'a [f64],
    pub objective: f64,
    pub damping: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LmOutcome {
    pub x: Vec<f64>,
    pub residuals: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
    pub termination: Termination,
    pub damping: f64,
}

#[derive(Debug, Clone)]
pub struct LevenbergMarquardt {
    config: LmConfig,
}

fn sum_sq(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

impl LevenbergMarquardt {
    pub fn new(config: LmConfig) -> Self {
        Self { config }
    }

    fn small_step(&self, delta: &[f64], x: &[f64]) -> bool {
        let xtol = self.config.step_tolerance;
        norm(delta) <= xtol * (norm(x) + xtol)
    }

    /// Minimise `Σ r(x)²` from `x0`.
    ///
    /// Fails with `NonPhysicalGuess` when `x0` is inadmissible or a step cannot
    /// be pulled back into the admissible domain.
    pub fn minimize<P, F>(
        &self,
        problem: &P,
        x0: Vec<f64>,
        mut observer: F,
    ) -> Result<LmOutcome, AdsaError>
    where
        P: LeastSquaresProblem,
        F: FnMut(&LmIterate<'_>) -> FitControl,
    {
        let cfg = self.config;
        if !problem.is_admissible(&x0) {
            return Err(AdsaError::non_physical(
                "initial guess lies outside the admissible domain",
            ));
        }

        let mut x = x0;
        let mut r = problem.residuals(&x);
        let mut f = sum_sq(&r);
        let mut lambda = cfg.initial_damping;
        let mut nu = 2.0;

        let outcome = |x: Vec<f64>, r: Vec<f64>, f: f64, iterations: usize, termination, lambda| {
            LmOutcome {
                x,
                residuals: r,
                objective: f,
                iterations,
                termination,
                damping: lambda,
            }
        };

        if f <= cfg.objective_floor {
            return Ok(outcome(x, r, f, 0, Termination::ZeroResidual, lambda));
        }

        for iteration in 1..=cfg.max_iterations {
            let jac = finite_difference_jacobian(problem, &x, cfg.fd_step, cfg.parallel);
            let rv = DVector::from_column_slice(&r);
            let jtj: DMatrix<f64> = jac.transpose() * &jac;
            let jtr: DVector<f64> = jac.transpose() * &rv;
            // A flat objective is not a minimum.
            if jtj.trace() == 0.0 {
                warn!("lm iteration {iteration}: Jacobian vanishes, stopping");
                return Ok(outcome(x, r, f, iteration - 1, Termination::Stalled, lambda));
            }

            loop {
                let Some(step) = solve_damped_step(&jtj, &jtr, lambda) else {
                    lambda *= nu;
                    nu *= 2.0;
                    if lambda > cfg.max_damping {
                        return Ok(outcome(x, r, f, iteration - 1, Termination::Stalled, lambda));
                    }
                    continue;
                };

                let mut delta: Vec<f64> = step.iter().copied().collect();
                let mut trial: Vec<f64> = x.iter().zip(&delta).map(|(a, d)| a + d).collect();
                let mut attempts = 0;
                while !problem.is_admissible(&trial) {
                    attempts += 1;
                    if attempts > cfg.max_projection_attempts {
                        return Err(AdsaError::non_physical(format!(
                            "no admissible step after {} halvings",
                            cfg.max_projection_attempts
                        )));
                    }
                    delta.iter_mut().for_each(|d| *d *= 0.5);
                    trial = x.iter().zip(&delta).map(|(a, d)| a + d).collect();
                }

                let r_trial = problem.residuals(&trial);
                let f_trial = sum_sq(&r_trial);
                let small = self.small_step(&delta, &x);

                if f_trial.is_finite() && f_trial < f {
                    let dv = DVector::from_column_slice(&delta);
                    let predicted = -(2.0 * dv.dot(&jtr) + dv.dot(&(&jtj * &dv)));
                    let rho = if predicted > 0.0 { (f - f_trial) / predicted } else { 0.0 };
                    lambda *= (1.0 - (2.0 * rho - 1.0).powi(3)).max(1.0 / 3.0);
                    lambda = lambda.max(f64::EPSILON);
                    nu = 2.0;

                    let relative_decrease = (f - f_trial) / f;
                    x = trial;
                    r = r_trial;
                    f = f_trial;
                    debug!(
                        "lm iteration {iteration}: objective={f:.6e} \
                         damping={lambda:.3e} gain={rho:.3}"
                    );

                    let progress = LmIterate {
                        iteration,
                        x: &x,
                        objective: f,
                        damping: lambda,
                    };
                    if observer(&progress) == FitControl::Abort {
                        return Ok(outcome(x, r, f, iteration, Termination::Aborted, lambda));
                    }
                    if f <= cfg.objective_floor {
                        return Ok(outcome(x, r, f, iteration, Termination::ZeroResidual, lambda));
                    }
                    if relative_decrease <= cfg.objective_tolerance && small {
                        return Ok(outcome(x, r, f, iteration, Termination::SmallStep, lambda));
                    }
                    break;
                }

                // A negligible step that cannot lower the objective means we are
                // at the minimum to working precision.
                if small {
                    return Ok(outcome(x, r, f, iteration - 1, Termination::SmallStep, lambda));
                }
                lambda *= nu;
                nu *= 2.0;
                if lambda > cfg.max_damping {
                    return Ok(outcome(x, r, f, iteration - 1, Termination::Stalled, lambda));
                }
            }
        }

        Ok(outcome(x, r, f, cfg.max_iterations, Termination::MaxIterations, lambda))
    }
}
