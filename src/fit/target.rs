//! Apex curvature for a prescribed drop volume or height.
//!
//! A sessile drop with a known contact angle is fully determined by one more
//! scalar. We solve for the apex curvature `b` whose meridian, integrated up to
//! the contact angle, matches the target, using the same Levenberg-Marquardt
//! engine as the shape fitter on the single relative residual
//! `(measure(b) − target) / target`. The spherical cap with the same contact
//! angle supplies the starting point and the curvature scale.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::domain::{
    FitConfig, FitControl, IntegrationSpan, IntegratorConfig, PhysicalParameters, Termination,
};
use crate::error::AdsaError;
use crate::fit::lm::{LeastSquaresProblem, LevenbergMarquardt, LmConfig};
use crate::profile::{generate_profile, spherical_cap, spherical_cap_for_volume, Profile};

/// Dimensionless arc length allowed before the contact angle must be reached.
const MAX_ARC_APEX_RADII: f64 = 100.0;
const PENALTY: f64 = 1e3;

/// Result of a targeted apex solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSolution {
    pub parameters: PhysicalParameters,
    pub profile: Profile,
    /// Measured value (volume or height) of `profile`.
    pub achieved: f64,
    pub iterations: usize,
    pub converged: bool,
    pub termination: Termination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Measure {
    Volume,
    Height,
}

impl Measure {
    fn of(self, profile: &Profile) -> f64 {
        match self {
            Measure::Volume => profile.volume(),
            Measure::Height => profile.height(),
        }
    }
}

struct ApexTarget {
    template: PhysicalParameters,
    contact_angle: f64,
    target: f64,
    measure: Measure,
    curvature_scale: f64,
    integrator: IntegratorConfig,
}

impl ApexTarget {
    fn parameters(&self, x: &[f64]) -> PhysicalParameters {
        PhysicalParameters {
            apex_curvature: x[0] * self.curvature_scale,
            ..self.template
        }
    }

    fn profile(&self, params: &PhysicalParameters) -> Result<Profile, AdsaError> {
        let span = IntegrationSpan::arc_length(MAX_ARC_APEX_RADII / params.apex_curvature)
            .with_max_angle(self.contact_angle);
        generate_profile(params, &span, &self.integrator)
    }
}

impl LeastSquaresProblem for ApexTarget {
    fn residuals(&self, x: &[f64]) -> Vec<f64> {
        match self.profile(&self.parameters(x)) {
            Ok(profile) => vec![(self.measure.of(&profile) - self.target) / self.target],
            Err(e) => {
                warn!("apex curvature {:.6e} has no profile: {e}", x[0] * self.curvature_scale);
                vec![PENALTY]
            }
        }
    }

    fn is_admissible(&self, x: &[f64]) -> bool {
        x[0].is_finite() && x[0] > 0.0
    }
}

fn solve(
    template: &PhysicalParameters,
    contact_angle: f64,
    target: f64,
    measure: Measure,
    apex_radius_guess: f64,
    path_length: f64,
    config: &FitConfig,
) -> Result<TargetSolution, AdsaError> {
    config.validate()?;
    let seed = PhysicalParameters {
        apex_curvature: 1.0 / apex_radius_guess,
        ..*template
    };
    seed.validate()?;

    let problem = ApexTarget {
        template: *template,
        contact_angle,
        target,
        measure,
        curvature_scale: seed.apex_curvature,
        integrator: IntegratorConfig {
            sample_spacing: Some(path_length / config.profile_resolution as f64),
            ..config.integrator
        },
    };

    let floor = config.residual_floor * config.residual_floor;
    let engine = LevenbergMarquardt::new(LmConfig {
        parallel: false,
        ..LmConfig::from_fit_config(config, floor)
    });
    let outcome = engine.minimize(&problem, vec![1.0], |_| FitControl::Continue)?;

    let parameters = problem.parameters(&outcome.x);
    let profile = problem.profile(&parameters)?;
    let achieved = measure.of(&profile);
    debug!(
        "{measure:?} target {target:.6e}: b={:.6e} achieved {achieved:.6e} after {} iterations",
        parameters.apex_curvature, outcome.iterations
    );

    Ok(TargetSolution {
        parameters,
        profile,
        achieved,
        iterations: outcome.iterations,
        converged: outcome.termination.is_converged(),
        termination: outcome.termination,
    })
}

fn check_target(name: &str, value: f64) -> Result<(), AdsaError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(AdsaError::InvalidConfig(format!(
            "target {name} must be finite and > 0 (got {value})"
        )));
    }
    Ok(())
}

/// Apex curvature of the drop with `contact_angle` holding `target_volume`.
///
/// `template` supplies σ, Δρ, g and orientation; its apex curvature is ignored.
pub fn solve_apex_for_volume(
    template: &PhysicalParameters,
    contact_angle: f64,
    target_volume: f64,
    config: &FitConfig,
) -> Result<TargetSolution, AdsaError> {
    check_target("volume", target_volume)?;
    let cap = spherical_cap_for_volume(target_volume, contact_angle)?;
    solve(
        template,
        contact_angle,
        target_volume,
        Measure::Volume,
        cap.apex_radius,
        cap.path_length,
        config,
    )
}

/// Apex curvature of the drop with `contact_angle` reaching `target_height`.
pub fn solve_apex_for_height(
    template: &PhysicalParameters,
    contact_angle: f64,
    target_height: f64,
    config: &FitConfig,
) -> Result<TargetSolution, AdsaError> {
    check_target("height", target_height)?;
    // Cap of unit radius scaled to the target height.
    let unit = spherical_cap(1.0, contact_angle)?;
    let cap = spherical_cap(target_height / unit.height, contact_angle)?;
    solve(
        template,
        contact_angle,
        target_height,
        Measure::Height,
        cap.apex_radius,
        cap.path_length,
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Orientation;

    fn water() -> PhysicalParameters {
        PhysicalParameters::new(0.072, 1000.0, 9.81, 1.0).with_orientation(Orientation::Sessile)
    }

    fn reference(b: f64, angle: f64) -> Profile {
        let params = PhysicalParameters {
            apex_curvature: b,
            ..water()
        };
        let config = IntegratorConfig {
            sample_spacing: Some(1e-6),
            ..IntegratorConfig::default()
        };
        let span = IntegrationSpan::arc_length(1.0).with_max_angle(angle);
        generate_profile(&params, &span, &config).unwrap()
    }

    #[test]
    fn volume_solve_recovers_apex_curvature() {
        let angle = 1.4;
        let volume = reference(600.0, angle).volume();
        let solution =
            solve_apex_for_volume(&water(), angle, volume, &FitConfig::default()).unwrap();
        assert!(solution.converged, "{:?}", solution.termination);
        let b = solution.parameters.apex_curvature;
        assert!((b / 600.0 - 1.0).abs() < 1e-4, "b={b}");
        assert!((solution.achieved / volume - 1.0).abs() < 1e-6);
        assert!((solution.profile.end_angle() - angle).abs() < 1e-9);
    }

    #[test]
    fn height_solve_recovers_apex_curvature() {
        let angle = 2.0;
        let height = reference(300.0, angle).height();
        let solution =
            solve_apex_for_height(&water(), angle, height, &FitConfig::default()).unwrap();
        let b = solution.parameters.apex_curvature;
        assert!((b / 300.0 - 1.0).abs() < 1e-4, "b={b}");
    }

    #[test]
    fn rejects_non_positive_target() {
        let err = solve_apex_for_volume(&water(), 1.0, -1.0, &FitConfig::default()).unwrap_err();
        assert!(matches!(err, AdsaError::InvalidConfig(_)));
    }
}
