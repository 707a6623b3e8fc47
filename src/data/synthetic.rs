//! Synthetic boundary points sampled from an integrated meridian.
//!
//! Points are evenly spaced in arc length, taken directly from the
//! integrator's uniform-grid output, mirrored onto both halves of the drop if
//! requested, mapped into the observed frame and optionally perturbed with
//! seeded Gaussian noise.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::domain::{BoundaryPoint, IntegrationSpan, IntegratorConfig, PhysicalParameters};
use crate::error::AdsaError;
use crate::math::from_drop_frame;
use crate::profile::generate_profile;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Total number of points (split evenly between the halves when mirrored).
    pub n_points: usize,
    /// Sample both halves of the silhouette.
    pub both_sides: bool,
    /// Standard deviation of the additive noise on x and y (0 = exact).
    pub noise_std: f64,
    pub seed: u64,
    pub integrator: IntegratorConfig,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_points: 50,
            both_sides: true,
            noise_std: 0.0,
            seed: 7,
            integrator: IntegratorConfig::default(),
        }
    }
}

/// Sample `config.n_points` boundary points from the meridian of `params`.
///
/// The first point of each half sits one spacing away from the apex and the
/// last one on the span's terminal sample.
pub fn sample_boundary(
    params: &PhysicalParameters,
    span: &IntegrationSpan,
    config: &SyntheticConfig,
) -> Result<Vec<BoundaryPoint>, AdsaError> {
    let sides = if config.both_sides { 2 } else { 1 };
    if config.n_points < sides {
        return Err(AdsaError::InvalidConfig("n_points must cover every sampled side.".into()));
    }
    if !(config.noise_std.is_finite() && config.noise_std >= 0.0) {
        return Err(AdsaError::InvalidConfig("noise_std must be finite and >= 0.".into()));
    }
    let per_side = config.n_points / sides;

    let extent = generate_profile(params, span, &config.integrator)?.arc_length();
    if !(extent > 0.0) {
        return Err(AdsaError::divergence(0.0, "meridian has no length"));
    }
    let grid = IntegratorConfig {
        sample_spacing: Some(extent / per_side as f64),
        ..config.integrator
    };
    let profile = generate_profile(params, span, &grid)?;
    let half: Vec<_> = profile.samples().iter().skip(1).take(per_side).copied().collect();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, config.noise_std)
        .map_err(|e| AdsaError::InvalidConfig(format!("noise distribution error: {e}")))?;

    let mut points = Vec::with_capacity(per_side * sides);
    for sign in [1.0, -1.0].into_iter().take(sides) {
        for s in &half {
            let (x, y) =
                from_drop_frame(sign * s.r, s.z, params.apex_x, params.apex_y, params.tilt);
            let (dx, dy) = if config.noise_std > 0.0 {
                (normal.sample(&mut rng), normal.sample(&mut rng))
            } else {
                (0.0, 0.0)
            };
            points.push(BoundaryPoint::new(x + dx, y + dy));
        }
    }
    Ok(points)
}
