//! Shape fitting entry points.
//!
//! Given:
//! - observed boundary points `(x, y)`
//! - an initial parameter guess (which also carries Δρ, g and orientation)
//! - a fit configuration with the free/fixed mask
//!
//! we:
//! - drop non-finite points and check that the fit is determined
//! - minimise the summed squared point-to-meridian distance with
//!   Levenberg-Marquardt over the free parameters
//! - re-evaluate the best parameters for residuals, correspondence and metrics

use log::{debug, warn};

use crate::domain::{
    BoundaryPoint, DropMetrics, FitConfig, FitControl, FitProgress, FitQuality, FitResult,
    PhysicalParameters, Termination,
};
use crate::error::AdsaError;
use crate::fit::lm::{LeastSquaresProblem, LevenbergMarquardt, LmConfig, LmOutcome};
use crate::fit::residuals::ShapeProblem;

/// Fit `initial` to `points`.
///
/// Fails with `InvalidConfig` for a bad `config`, `NonPhysicalGuess` when
/// `initial` is unphysical or produces no meridian, and `UnderdeterminedFit`
/// when fewer finite points than free parameters plus one remain.
pub fn fit_shape(
    points: &[BoundaryPoint],
    initial: &PhysicalParameters,
    config: &FitConfig,
) -> Result<FitResult, AdsaError> {
    fit_shape_with_observer(points, initial, config, |_| FitControl::Continue)
}

/// Fit `initial` to `points`, calling `observer` after every iteration.
///
/// Returning [`FitControl::Abort`] stops the search and yields the best
/// parameters so far with [`Termination::Aborted`]. Errors are those of
/// [`fit_shape`].
pub fn fit_shape_with_observer<F>(
    points: &[BoundaryPoint],
    initial: &PhysicalParameters,
    config: &FitConfig,
    mut observer: F,
) -> Result<FitResult, AdsaError>
where
    F: FnMut(&FitProgress) -> FitControl,
{
    config.validate()?;
    initial.validate()?;

    let finite: Vec<BoundaryPoint> = points.iter().filter(|p| p.is_finite()).copied().collect();
    if finite.len() < points.len() {
        warn!("ignoring {} non-finite boundary points", points.len() - finite.len());
    }

    let n_free = config.mask.count();
    let required = n_free + 1;
    if finite.len() < required {
        return Err(AdsaError::UnderdeterminedFit {
            points: finite.len(),
            required,
        });
    }

    let problem = ShapeProblem::new(&finite, initial, config);
    // Starting on the penalty plateau leaves nothing to descend.
    if let Err(e) = problem.evaluate(initial) {
        return Err(AdsaError::non_physical(format!(
            "initial guess does not produce a meridian: {e}"
        )));
    }
    let x0 = problem.encode(initial);

    if n_free == 0 {
        let residuals = problem.residuals(&x0);
        let objective = residuals.iter().map(|r| r * r).sum();
        let outcome = LmOutcome {
            x: x0,
            residuals,
            objective,
            iterations: 0,
            termination: Termination::FixedParameters,
            damping: 0.0,
        };
        return Ok(finish(&problem, outcome, config));
    }

    let floor = finite.len() as f64 * (config.residual_floor * problem.data_scale()).powi(2);
    let engine = LevenbergMarquardt::new(LmConfig::from_fit_config(config, floor));
    debug!(
        "fitting {} points over {:?} (data scale {:.6e})",
        finite.len(),
        problem.free_parameters(),
        problem.data_scale()
    );

    let outcome = engine.minimize(&problem, x0, |it| {
        observer(&FitProgress {
            iteration: it.iteration,
            objective: it.objective,
            damping: it.damping,
            parameters: problem.decode(it.x),
        })
    })?;

    debug!(
        "fit finished after {} iterations: {:?}, objective={:.6e}",
        outcome.iterations, outcome.termination, outcome.objective
    );
    Ok(finish(&problem, outcome, config))
}

fn finish(problem: &ShapeProblem<'_>, outcome: LmOutcome, config: &FitConfig) -> FitResult {
    let parameters = problem.decode(&outcome.x);
    let n = outcome.residuals.len();

    let (correspondence, metrics) = match problem.evaluate(&parameters) {
        Ok(eval) => {
            let reach = eval.correspondence.iter().map(|c| c.s).fold(0.0, f64::max);
            let metrics: DropMetrics = eval.profile.truncated(reach).metrics(&parameters);
            (Some(eval.correspondence), Some(metrics))
        }
        Err(e) => {
            warn!("best parameters do not produce a profile: {e}");
            (None, None)
        }
    };

    let quality = FitQuality {
        sse: outcome.objective,
        rmse: if n > 0 { (outcome.objective / n as f64).sqrt() } else { 0.0 },
        max_abs_residual: outcome.residuals.iter().map(|r| r.abs()).fold(0.0, f64::max),
        n_points: n,
        n_free: problem.free_parameters().len(),
    };

    FitResult {
        parameters,
        objective: outcome.objective,
        iterations: outcome.iterations,
        converged: outcome.termination.is_converged(),
        termination: outcome.termination,
        residuals: outcome.residuals,
        quality,
        metrics,
        correspondence: if config.record_correspondence { correspondence } else { None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{sample_boundary, SyntheticConfig};
    use crate::domain::{IntegrationSpan, IntegratorConfig, Orientation, ParameterMask};

    fn water_drop() -> PhysicalParameters {
        PhysicalParameters::new(0.072, 1000.0, 9.81, 500.0)
            .with_orientation(Orientation::Sessile)
            .with_apex(1e-3, 4e-3)
    }

    fn boundary(params: &PhysicalParameters) -> Vec<BoundaryPoint> {
        let span = IntegrationSpan::arc_length(0.1).with_max_angle(2.0);
        sample_boundary(params, &span, &SyntheticConfig::default()).unwrap()
    }

    #[test]
    fn too_few_points_is_underdetermined() {
        let p = water_drop();
        let points = vec![BoundaryPoint::new(0.0, 0.0); 5];
        let err = fit_shape(&points, &p, &FitConfig::default()).unwrap_err();
        assert_eq!(err, AdsaError::UnderdeterminedFit { points: 5, required: 6 });
    }

    #[test]
    fn non_finite_points_do_not_count() {
        let p = water_drop();
        let mut points = vec![BoundaryPoint::new(f64::NAN, 0.0); 10];
        points.extend([BoundaryPoint::new(1.0, 1.0); 4]);
        let config = FitConfig::default().with_mask(ParameterMask::symmetric());
        let err = fit_shape(&points, &p, &config).unwrap_err();
        assert_eq!(err, AdsaError::UnderdeterminedFit { points: 4, required: 5 });
    }

    #[test]
    fn fixed_mask_evaluates_initial_guess() {
        let p = water_drop();
        let points = boundary(&p);
        let mask = ParameterMask {
            surface_tension: false,
            apex_curvature: false,
            tilt: false,
            apex_x: false,
            apex_y: false,
        };
        let result = fit_shape(&points, &p, &FitConfig::default().with_mask(mask)).unwrap();
        assert_eq!(result.termination, Termination::FixedParameters);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.parameters, p);
        assert!(result.quality.rmse < 1e-9 * 5e-3, "rmse={}", result.quality.rmse);
        let metrics = result.metrics.unwrap();
        assert!((metrics.end_angle - 2.0).abs() < 1e-2, "end angle {}", metrics.end_angle);
    }

    #[test]
    fn recovers_perturbed_apex_curvature() {
        let truth = water_drop();
        let points = boundary(&truth);
        let mut guess = truth;
        guess.apex_curvature *= 1.05;
        guess.surface_tension *= 0.97;
        let config = FitConfig::default().with_mask(ParameterMask::symmetric());
        let result = fit_shape(&points, &guess, &config).unwrap();
        assert!(result.converged, "{:?}", result.termination);
        let rel = |a: f64, b: f64| ((a - b) / b).abs();
        let fitted = result.parameters;
        assert!(rel(fitted.apex_curvature, 500.0) < 1e-6, "b={}", fitted.apex_curvature);
        assert!(rel(fitted.surface_tension, 0.072) < 1e-6, "σ={}", fitted.surface_tension);
        assert_eq!(result.correspondence.as_ref().map(Vec::len), Some(points.len()));
    }

    #[test]
    fn observer_can_abort() {
        let truth = water_drop();
        let points = boundary(&truth);
        let mut guess = truth;
        guess.apex_curvature *= 1.2;
        let config = FitConfig::default().with_mask(ParameterMask::symmetric());
        let mut seen = Vec::new();
        let result = fit_shape_with_observer(&points, &guess, &config, |progress| {
            seen.push(progress.objective);
            FitControl::Abort
        })
        .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(result.termination, Termination::Aborted);
        assert!(!result.converged);
        assert_eq!(result.objective, seen[0]);
    }

    #[test]
    fn guess_without_a_meridian_is_rejected() {
        let p = water_drop();
        let points = boundary(&p);
        let config = FitConfig {
            integrator: IntegratorConfig {
                max_steps: 2,
                ..IntegratorConfig::default()
            },
            ..FitConfig::default()
        };
        let err = fit_shape(&points, &p, &config).unwrap_err();
        assert!(matches!(err, AdsaError::NonPhysicalGuess { .. }), "{err:?}");
        assert_eq!(err.exit_code(), 4);
    }
}
