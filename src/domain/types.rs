//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed between the integrator and the fitter without conversion
//! - handed to an outer application for export or display
//! - rebuilt from a saved run for comparisons

use serde::{Deserialize, Serialize};

use crate::error::AdsaError;

/// Which way gravity acts relative to the meridian's height coordinate.
///
/// The height `z` always grows from the apex along the profile, so the sign of
/// the hydrostatic term depends on whether the drop hangs or rests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Hanging from a needle, apex at the bottom:
    /// `dφ/ds = 2b − (Δρ·g/σ)·z − sin φ / r`.
    #[default]
    Pendant,
    /// Resting on a substrate, apex at the top:
    /// `dφ/ds = 2b + (Δρ·g/σ)·z − sin φ / r`.
    Sessile,
}

impl Orientation {
    /// Sign applied to the hydrostatic term `(Δρ·g/σ)·z`.
    pub fn gravity_sign(self) -> f64 {
        match self {
            Orientation::Pendant => -1.0,
            Orientation::Sessile => 1.0,
        }
    }
}

/// A parameter the shape fitter can adjust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreeParameter {
    SurfaceTension,
    ApexCurvature,
    Tilt,
    ApexX,
    ApexY,
}

impl FreeParameter {
    pub const ALL: [FreeParameter; 5] = [
        FreeParameter::SurfaceTension,
        FreeParameter::ApexCurvature,
        FreeParameter::Tilt,
        FreeParameter::ApexX,
        FreeParameter::ApexY,
    ];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            FreeParameter::SurfaceTension => "surface tension",
            FreeParameter::ApexCurvature => "apex curvature",
            FreeParameter::Tilt => "tilt",
            FreeParameter::ApexX => "apex x",
            FreeParameter::ApexY => "apex y",
        }
    }

    /// Parameters that must stay strictly positive.
    pub fn is_positive(self) -> bool {
        matches!(self, FreeParameter::SurfaceTension | FreeParameter::ApexCurvature)
    }
}

/// Physical description of one droplet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalParameters {
    /// Surface tension σ (> 0).
    pub surface_tension: f64,
    /// Density difference Δρ between the liquid and the surrounding phase (> 0).
    pub delta_rho: f64,
    /// Gravitational acceleration g (> 0).
    pub gravity: f64,
    /// Curvature at the apex b = 1/R0 (> 0).
    pub apex_curvature: f64,
    /// Rotation ω (radians) of the drop axis relative to the observed frame.
    pub tilt: f64,
    /// Apex position in the observed frame.
    pub apex_x: f64,
    pub apex_y: f64,
    pub orientation: Orientation,
    /// Tolman length δ for curvature-dependent surface tension; 0 disables it.
    #[serde(default)]
    pub tolman_length: f64,
}

impl PhysicalParameters {
    /// Untilted pendant drop with its apex at the origin.
    pub fn new(surface_tension: f64, delta_rho: f64, gravity: f64, apex_curvature: f64) -> Self {
        Self {
            surface_tension,
            delta_rho,
            gravity,
            apex_curvature,
            tilt: 0.0,
            apex_x: 0.0,
            apex_y: 0.0,
            orientation: Orientation::Pendant,
            tolman_length: 0.0,
        }
    }

    pub fn with_apex(mut self, x: f64, y: f64) -> Self {
        self.apex_x = x;
        self.apex_y = y;
        self
    }

    pub fn with_tilt(mut self, tilt: f64) -> Self {
        self.tilt = tilt;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_tolman_length(mut self, delta: f64) -> Self {
        self.tolman_length = delta;
        self
    }

    /// Reject values that would make the Young-Laplace system meaningless.
    pub fn validate(&self) -> Result<(), AdsaError> {
        let positives = [
            ("surface tension", self.surface_tension),
            ("density difference", self.delta_rho),
            ("gravity", self.gravity),
            ("apex curvature", self.apex_curvature),
        ];
        for (name, value) in positives {
            if !(value.is_finite() && value > 0.0) {
                return Err(AdsaError::non_physical(format!(
                    "{name} must be finite and > 0 (got {value})"
                )));
            }
        }
        for (name, value) in [
            ("tilt", self.tilt),
            ("apex x", self.apex_x),
            ("apex y", self.apex_y),
        ] {
            if !value.is_finite() {
                return Err(AdsaError::non_physical(format!("{name} is not finite")));
            }
        }
        let alpha = self.tolman_ratio();
        if !(alpha.is_finite() && 1.0 + 2.0 * alpha > 0.0) {
            return Err(AdsaError::non_physical(format!(
                "Tolman length {} must exceed -R0/2",
                self.tolman_length
            )));
        }
        Ok(())
    }

    /// Capillary constant `c = Δρ·g/σ` (inverse squared length).
    pub fn capillary_constant(&self) -> f64 {
        self.delta_rho * self.gravity / self.surface_tension
    }

    /// Bond number `β = Δρ·g·R0²/σ` at the apex.
    pub fn bond_number(&self) -> f64 {
        self.capillary_constant() / (self.apex_curvature * self.apex_curvature)
    }

    pub fn apex_radius(&self) -> f64 {
        1.0 / self.apex_curvature
    }

    /// Tolman length in apex radii, `α = δ·b`.
    pub fn tolman_ratio(&self) -> f64 {
        self.tolman_length * self.apex_curvature
    }

    pub fn get(&self, param: FreeParameter) -> f64 {
        match param {
            FreeParameter::SurfaceTension => self.surface_tension,
            FreeParameter::ApexCurvature => self.apex_curvature,
            FreeParameter::Tilt => self.tilt,
            FreeParameter::ApexX => self.apex_x,
            FreeParameter::ApexY => self.apex_y,
        }
    }

    pub fn set(&mut self, param: FreeParameter, value: f64) {
        match param {
            FreeParameter::SurfaceTension => self.surface_tension = value,
            FreeParameter::ApexCurvature => self.apex_curvature = value,
            FreeParameter::Tilt => self.tilt = value,
            FreeParameter::ApexX => self.apex_x = value,
            FreeParameter::ApexY => self.apex_y = value,
        }
    }
}

/// Which parameters the fitter may move.
///
/// Whether tilt and apex offset are free is a property of the experiment, so
/// callers choose explicitly via [`ParameterMask::all`] or
/// [`ParameterMask::symmetric`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterMask {
    pub surface_tension: bool,
    pub apex_curvature: bool,
    pub tilt: bool,
    pub apex_x: bool,
    pub apex_y: bool,
}

impl ParameterMask {
    /// Every parameter free.
    pub fn all() -> Self {
        Self {
            surface_tension: true,
            apex_curvature: true,
            tilt: true,
            apex_x: true,
            apex_y: true,
        }
    }

    /// Tilt held at its initial value (ideal axisymmetric setups).
    pub fn symmetric() -> Self {
        Self {
            tilt: false,
            ..Self::all()
        }
    }

    pub fn with(mut self, param: FreeParameter, free: bool) -> Self {
        match param {
            FreeParameter::SurfaceTension => self.surface_tension = free,
            FreeParameter::ApexCurvature => self.apex_curvature = free,
            FreeParameter::Tilt => self.tilt = free,
            FreeParameter::ApexX => self.apex_x = free,
            FreeParameter::ApexY => self.apex_y = free,
        }
        self
    }

    pub fn is_free(&self, param: FreeParameter) -> bool {
        match param {
            FreeParameter::SurfaceTension => self.surface_tension,
            FreeParameter::ApexCurvature => self.apex_curvature,
            FreeParameter::Tilt => self.tilt,
            FreeParameter::ApexX => self.apex_x,
            FreeParameter::ApexY => self.apex_y,
        }
    }

    /// Free parameters in canonical order.
    pub fn free_parameters(&self) -> Vec<FreeParameter> {
        FreeParameter::ALL
            .into_iter()
            .filter(|p| self.is_free(*p))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.free_parameters().len()
    }
}

impl Default for ParameterMask {
    fn default() -> Self {
        Self::all()
    }
}

/// One point on the meridian, in physical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeridianSample {
    /// Arc length from the apex.
    pub s: f64,
    /// Radial coordinate (distance from the symmetry axis).
    pub r: f64,
    /// Height coordinate measured from the apex along the axis.
    pub z: f64,
    /// Tangent angle (radians) against the radial direction.
    pub phi: f64,
}

/// An observed coordinate on the droplet edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryPoint {
    pub x: f64,
    pub y: f64,
}

impl BoundaryPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Where the integrator stops. All lengths are physical.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSpan {
    pub max_arc_length: f64,
    pub max_radius: Option<f64>,
    pub max_height: Option<f64>,
    /// Tangent-angle limit; for a sessile drop this is the contact angle.
    pub max_angle: Option<f64>,
}

impl IntegrationSpan {
    pub fn arc_length(max_arc_length: f64) -> Self {
        Self {
            max_arc_length,
            max_radius: None,
            max_height: None,
            max_angle: None,
        }
    }

    pub fn with_max_radius(mut self, r: f64) -> Self {
        self.max_radius = Some(r);
        self
    }

    pub fn with_max_height(mut self, z: f64) -> Self {
        self.max_height = Some(z);
        self
    }

    pub fn with_max_angle(mut self, phi: f64) -> Self {
        self.max_angle = Some(phi);
        self
    }

    pub fn validate(&self) -> Result<(), AdsaError> {
        if !(self.max_arc_length.is_finite() && self.max_arc_length > 0.0) {
            return Err(AdsaError::InvalidConfig(format!(
                "max_arc_length must be finite and > 0 (got {})",
                self.max_arc_length
            )));
        }
        for (name, value) in [
            ("max_radius", self.max_radius),
            ("max_height", self.max_height),
            ("max_angle", self.max_angle),
        ] {
            if let Some(v) = value {
                if !(v.is_finite() && v > 0.0) {
                    return Err(AdsaError::InvalidConfig(format!(
                        "{name} must be finite and > 0 (got {v})"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Step-size control and output options for the profile integrator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegratorConfig {
    /// Absolute tolerance on the dimensionless state (lengths in units of 1/b).
    pub abs_tol: f64,
    pub rel_tol: f64,
    /// Step budget, rejected trial steps included.
    pub max_steps: usize,
    /// Optional cap on the physical step length.
    pub max_step: Option<f64>,
    /// Emit samples on a uniform physical arc-length grid instead of at every step.
    pub sample_spacing: Option<f64>,
    /// `|r|` or `|z|` beyond `divergence_bound / b` counts as divergence.
    pub divergence_bound: f64,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            abs_tol: 1e-12,
            rel_tol: 1e-10,
            max_steps: 100_000,
            max_step: None,
            sample_spacing: None,
            divergence_bound: 1e6,
        }
    }
}

impl IntegratorConfig {
    pub fn validate(&self) -> Result<(), AdsaError> {
        if !(self.abs_tol.is_finite() && self.abs_tol > 0.0) {
            return Err(AdsaError::InvalidConfig("abs_tol must be > 0.".into()));
        }
        if !(self.rel_tol.is_finite() && self.rel_tol > 0.0) {
            return Err(AdsaError::InvalidConfig("rel_tol must be > 0.".into()));
        }
        if self.max_steps == 0 {
            return Err(AdsaError::InvalidConfig("max_steps must be >= 1.".into()));
        }
        if let Some(h) = self.max_step {
            if !(h.is_finite() && h > 0.0) {
                return Err(AdsaError::InvalidConfig("max_step must be > 0.".into()));
            }
        }
        if let Some(ds) = self.sample_spacing {
            if !(ds.is_finite() && ds > 0.0) {
                return Err(AdsaError::InvalidConfig("sample_spacing must be > 0.".into()));
            }
        }
        if !(self.divergence_bound.is_finite() && self.divergence_bound > 1.0) {
            return Err(AdsaError::InvalidConfig("divergence_bound must be > 1.".into()));
        }
        Ok(())
    }
}

/// Shape fitter settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    pub mask: ParameterMask,
    pub max_iterations: usize,
    /// Relative decrease of the objective below which a step counts as stalled.
    pub objective_tolerance: f64,
    /// Relative parameter step below which the search has converged.
    pub step_tolerance: f64,
    /// RMS residual (relative to the data extent) treated as an exact fit.
    pub residual_floor: f64,
    pub initial_damping: f64,
    pub max_damping: f64,
    /// Relative finite-difference step for Jacobian columns.
    pub fd_step: f64,
    /// Residual assigned to every point when a trial profile diverges,
    /// in units of the data extent.
    pub penalty_factor: f64,
    /// Approximate number of profile samples across the data extent.
    pub profile_resolution: usize,
    /// How far past the observed extent the profile is integrated.
    pub span_margin: f64,
    /// Tangent angle (radians) at which the fitted meridian is cut, so the
    /// curve never wraps back over the data.
    pub max_tangent_angle: f64,
    /// Step halvings tried to keep σ and b positive.
    pub max_projection_attempts: usize,
    pub parallel: bool,
    pub record_correspondence: bool,
    pub integrator: IntegratorConfig,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            mask: ParameterMask::all(),
            max_iterations: 100,
            objective_tolerance: 1e-10,
            step_tolerance: 1e-8,
            residual_floor: 1e-12,
            initial_damping: 1e-3,
            max_damping: 1e16,
            fd_step: 1e-6,
            penalty_factor: 1e3,
            profile_resolution: 1000,
            span_margin: 1.5,
            max_tangent_angle: 1.25 * std::f64::consts::PI,
            max_projection_attempts: 30,
            parallel: true,
            record_correspondence: true,
            integrator: IntegratorConfig::default(),
        }
    }
}

impl FitConfig {
    pub fn with_mask(mut self, mask: ParameterMask) -> Self {
        self.mask = mask;
        self
    }

    pub fn validate(&self) -> Result<(), AdsaError> {
        if self.max_iterations == 0 {
            return Err(AdsaError::InvalidConfig("max_iterations must be >= 1.".into()));
        }
        let positives = [
            ("objective_tolerance", self.objective_tolerance),
            ("step_tolerance", self.step_tolerance),
            ("residual_floor", self.residual_floor),
            ("initial_damping", self.initial_damping),
            ("max_damping", self.max_damping),
            ("fd_step", self.fd_step),
            ("penalty_factor", self.penalty_factor),
        ];
        for (name, value) in positives {
            if !(value.is_finite() && value > 0.0) {
                return Err(AdsaError::InvalidConfig(format!(
                    "{name} must be finite and > 0 (got {value})"
                )));
            }
        }
        if self.max_damping <= self.initial_damping {
            return Err(AdsaError::InvalidConfig(
                "max_damping must exceed initial_damping.".into(),
            ));
        }
        if self.profile_resolution < 10 {
            return Err(AdsaError::InvalidConfig("profile_resolution must be >= 10.".into()));
        }
        if !(self.span_margin.is_finite() && self.span_margin >= 1.0) {
            return Err(AdsaError::InvalidConfig("span_margin must be >= 1.".into()));
        }
        if !(self.max_tangent_angle.is_finite() && self.max_tangent_angle > 0.0) {
            return Err(AdsaError::InvalidConfig(format!(
                "max_tangent_angle must be finite and > 0 (got {})",
                self.max_tangent_angle
            )));
        }
        self.integrator.validate()
    }
}

/// Settings for the automatic initial-guess estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Bond-number range scanned for the surface tension.
    pub bond_min: f64,
    pub bond_max: f64,
    pub bond_steps: usize,
    /// Fraction of the axial extent (from the apex) used for the circle fit.
    pub apex_fraction: f64,
    pub min_apex_points: usize,
    /// Score the Bond-number candidates on the rayon pool.
    pub parallel: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            bond_min: 1e-3,
            bond_max: 1e2,
            bond_steps: 16,
            apex_fraction: 0.2,
            min_apex_points: 5,
            parallel: true,
        }
    }
}

impl SeedConfig {
    pub fn validate(&self) -> Result<(), AdsaError> {
        if !(self.bond_min.is_finite() && self.bond_min > 0.0 && self.bond_max > self.bond_min) {
            return Err(AdsaError::InvalidConfig(format!(
                "bond range must satisfy 0 < bond_min < bond_max (got {}..{})",
                self.bond_min, self.bond_max
            )));
        }
        if self.bond_steps == 0 {
            return Err(AdsaError::InvalidConfig("bond_steps must be >= 1.".into()));
        }
        if !(self.apex_fraction > 0.0 && self.apex_fraction <= 1.0) {
            return Err(AdsaError::InvalidConfig("apex_fraction must lie in (0, 1].".into()));
        }
        if self.min_apex_points < 3 {
            return Err(AdsaError::InvalidConfig("min_apex_points must be >= 3.".into()));
        }
        Ok(())
    }
}

/// Nearest point on the fitted meridian for one observed point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub point_index: usize,
    pub s: f64,
    pub r: f64,
    pub z: f64,
    pub phi: f64,
    /// Signed distance (positive on the left of the tangent direction).
    pub distance: f64,
}

/// Why the fitter stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Relative objective decrease and parameter step both below tolerance.
    SmallStep,
    /// Residuals at the floor (exact data).
    ZeroResidual,
    /// Nothing to fit; the guess was evaluated as-is.
    FixedParameters,
    MaxIterations,
    /// Damping exhausted without a negligible step.
    Stalled,
    /// Stopped by the caller between iterations.
    Aborted,
}

impl Termination {
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            Termination::SmallStep | Termination::ZeroResidual | Termination::FixedParameters
        )
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub max_abs_residual: f64,
    pub n_points: usize,
    pub n_free: usize,
}

/// Derived physical quantities of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DropMetrics {
    pub volume: f64,
    pub surface_area: f64,
    pub height: f64,
    pub max_radius: f64,
    /// Tangent angle at the end of the profile (contact angle for sessile drops).
    pub end_angle: f64,
    pub apex_radius: f64,
    pub bond_number: f64,
    pub capillary_length: f64,
}

/// Output of one `fit_shape` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub parameters: PhysicalParameters,
    /// Signed point-to-curve distances, one per finite input point.
    pub residuals: Vec<f64>,
    /// Sum of squared residuals.
    pub objective: f64,
    pub iterations: usize,
    pub converged: bool,
    pub termination: Termination,
    pub quality: FitQuality,
    pub metrics: Option<DropMetrics>,
    pub correspondence: Option<Vec<Correspondence>>,
}

/// Snapshot handed to a fit observer after each iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitProgress {
    pub iteration: usize,
    pub objective: f64,
    pub damping: f64,
    pub parameters: PhysicalParameters,
}

/// Observer verdict between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitControl {
    Continue,
    Abort,
}
