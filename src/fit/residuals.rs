//! Geometric residuals between observed boundary points and a candidate meridian.
//!
//! For one parameter vector we:
//! - integrate the meridian on a fixed arc-length grid
//! - map every observed point into the drop frame `(|u|, v)`
//! - find its closest point on the meridian (every local minimum of the sample
//!   distances is refined on the Hermite reconstruction)
//! - report the signed distance as the residual
//!
//! The grid spacing and integration span are fixed once per fit, so the
//! residuals vary smoothly with the parameters and the finite-difference
//! Jacobian is not polluted by resampling noise. The span also stops at
//! `max_tangent_angle`; past it a sessile meridian loops back over the data.

use std::f64::consts::FRAC_PI_2;

use log::warn;
use rayon::prelude::*;

use crate::domain::{
    BoundaryPoint, Correspondence, FitConfig, FreeParameter, IntegrationSpan, IntegratorConfig,
    PhysicalParameters,
};
use crate::error::AdsaError;
use crate::fit::lm::LeastSquaresProblem;
use crate::math::{closest_on_meridian, to_drop_frame, SegmentHit};
use crate::profile::{generate_profile, Profile};

/// Residuals and correspondence for one parameter set.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub residuals: Vec<f64>,
    pub correspondence: Vec<Correspondence>,
    pub profile: Profile,
}

/// Extent of the observed data: the larger side of its bounding box.
pub fn data_scale(points: &[BoundaryPoint]) -> f64 {
    let (mut x_lo, mut x_hi) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y_lo, mut y_hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in points {
        x_lo = x_lo.min(p.x);
        x_hi = x_hi.max(p.x);
        y_lo = y_lo.min(p.y);
        y_hi = y_hi.max(p.y);
    }
    (x_hi - x_lo).max(y_hi - y_lo).max(0.0)
}

/// The shape-fitting objective over the free parameters of a template.
///
/// Free parameters are scaled to order one: σ and b by their initial values,
/// the apex offset by the data extent, tilt in radians.
#[derive(Debug, Clone)]
pub struct ShapeProblem<'a> {
    points: &'a [BoundaryPoint],
    template: PhysicalParameters,
    free: Vec<FreeParameter>,
    scales: Vec<f64>,
    span: IntegrationSpan,
    integrator: IntegratorConfig,
    data_scale: f64,
    penalty: f64,
    parallel: bool,
}

impl<'a> ShapeProblem<'a> {
    pub fn new(
        points: &'a [BoundaryPoint],
        initial: &PhysicalParameters,
        config: &FitConfig,
    ) -> Self {
        let extent = data_scale(points);
        let scale = if extent > 0.0 { extent } else { initial.apex_radius() };

        let reach = points
            .iter()
            .map(|p| {
                let (u, v) = to_drop_frame(p.x, p.y, initial.apex_x, initial.apex_y, initial.tilt);
                u.hypot(v)
            })
            .fold(0.0, f64::max)
            .max(scale);
        // An arc from the apex is at most π/2 times its chord on a circle.
        let span = IntegrationSpan::arc_length(config.span_margin * FRAC_PI_2 * reach)
            .with_max_angle(config.max_tangent_angle);

        let integrator = IntegratorConfig {
            sample_spacing: Some(scale / config.profile_resolution as f64),
            ..config.integrator
        };

        let free = config.mask.free_parameters();
        let scales = free
            .iter()
            .map(|&param| match param {
                FreeParameter::SurfaceTension | FreeParameter::ApexCurvature => {
                    initial.get(param).abs()
                }
                FreeParameter::ApexX | FreeParameter::ApexY => scale,
                FreeParameter::Tilt => 1.0,
            })
            .collect();

        Self {
            points,
            template: *initial,
            free,
            scales,
            span,
            integrator,
            data_scale: scale,
            penalty: config.penalty_factor * scale,
            parallel: config.parallel,
        }
    }

    pub fn data_scale(&self) -> f64 {
        self.data_scale
    }

    pub fn free_parameters(&self) -> &[FreeParameter] {
        &self.free
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Scaled free-parameter vector for `params`.
    pub fn encode(&self, params: &PhysicalParameters) -> Vec<f64> {
        self.free
            .iter()
            .zip(&self.scales)
            .map(|(&param, scale)| params.get(param) / scale)
            .collect()
    }

    /// Full parameter set for the scaled vector `x`.
    pub fn decode(&self, x: &[f64]) -> PhysicalParameters {
        let mut params = self.template;
        for ((&param, scale), value) in self.free.iter().zip(&self.scales).zip(x) {
            params.set(param, value * scale);
        }
        params
    }

    /// Integrate and correspond every point for `params`.
    pub fn evaluate(&self, params: &PhysicalParameters) -> Result<Evaluation, AdsaError> {
        let profile = generate_profile(params, &self.span, &self.integrator)?;
        let samples = profile.samples();

        let locate = |(i, p): (usize, &BoundaryPoint)| -> Result<Correspondence, AdsaError> {
            let (u, v) = to_drop_frame(p.x, p.y, params.apex_x, params.apex_y, params.tilt);
            let hit: SegmentHit = closest_on_meridian(samples, (u.abs(), v))
                .ok_or_else(|| AdsaError::divergence(0.0, "empty meridian"))?;
            Ok(Correspondence {
                point_index: i,
                s: hit.s,
                r: hit.r,
                z: hit.z,
                phi: hit.phi,
                distance: hit.signed,
            })
        };

        let correspondence: Vec<Correspondence> = if self.parallel {
            self.points.par_iter().enumerate().map(locate).collect::<Result<_, _>>()?
        } else {
            self.points.iter().enumerate().map(locate).collect::<Result<_, _>>()?
        };

        if correspondence.iter().any(|c| !c.distance.is_finite()) {
            return Err(AdsaError::divergence(
                profile.arc_length(),
                "non-finite point-to-curve distance",
            ));
        }

        Ok(Evaluation {
            residuals: correspondence.iter().map(|c| c.distance).collect(),
            correspondence,
            profile,
        })
    }

    fn penalty_residuals(&self) -> Vec<f64> {
        vec![self.penalty; self.points.len()]
    }
}

impl LeastSquaresProblem for ShapeProblem<'_> {
    fn residuals(&self, x: &[f64]) -> Vec<f64> {
        let params = self.decode(x);
        match self.evaluate(&params) {
            Ok(eval) => eval.residuals,
            Err(e) if e.is_recoverable() => {
                warn!(
                    "penalising divergent trial (σ={:.6e}, b={:.6e}): {e}",
                    params.surface_tension, params.apex_curvature
                );
                self.penalty_residuals()
            }
            Err(e) => {
                warn!("penalising inadmissible trial: {e}");
                self.penalty_residuals()
            }
        }
    }

    fn is_admissible(&self, x: &[f64]) -> bool {
        x.iter().all(|v| v.is_finite())
            && self
                .free
                .iter()
                .zip(x)
                .all(|(param, value)| !param.is_positive() || *value > 0.0)
    }
}
