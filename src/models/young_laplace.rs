//! Young-Laplace right-hand side for the axisymmetric meridian.
//!
//! The integrator relies on two primitive operations:
//! - the dimensionless derivative `d[X, Z, φ]/dS` (for stepping)
//! - the scaling between dimensionless and physical coordinates
//!
//! The physical system
//!
//! ```text
//! dr/ds = cos φ,  dz/ds = sin φ,  dφ/ds = 2b ± (Δρ·g/σ)·z − sin φ / r
//! ```
//!
//! becomes, with `S = b·s`, `X = b·r`, `Z = b·z` and `k = ±Δρ·g/(σ·b²)`,
//!
//! ```text
//! dX/dS = cos φ,  dZ/dS = sin φ,  dφ/dS = 2 + k·Z − sin φ / X
//! ```
//!
//! A non-zero Tolman length `δ` (`α = δ·b`) makes the surface tension depend on
//! curvature. The pressure term then becomes `P / (1 − α·P)` with
//! `P = 2/(1 + 2α) + k·Z`, which still equals 2 at the apex.

use crate::domain::{MeridianSample, PhysicalParameters};

/// Below this `|X|` the `sin φ / X` term is replaced by its on-axis limit.
const AXIS_EPS: f64 = 1e-12;

/// The dimensionless meridian ODE for one parameter set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoungLaplace {
    /// Signed Bond number `k`.
    k: f64,
    /// Tolman length in apex radii.
    alpha: f64,
    /// Apex curvature `b` used to restore physical units.
    b: f64,
}

impl YoungLaplace {
    pub fn from_parameters(params: &PhysicalParameters) -> Self {
        Self {
            k: params.orientation.gravity_sign() * params.bond_number(),
            alpha: params.tolman_ratio(),
            b: params.apex_curvature,
        }
    }

    pub fn coefficient(&self) -> f64 {
        self.k
    }

    /// `dQ/dZ` at the apex, where `Q` is the pressure term; equals `k` when `α = 0`.
    pub fn series_coefficient(&self) -> f64 {
        self.k * (1.0 + 2.0 * self.alpha).powi(2)
    }

    pub fn apex_curvature(&self) -> f64 {
        self.b
    }

    fn pressure(&self, z: f64) -> f64 {
        if self.alpha == 0.0 {
            return 2.0 + self.k * z;
        }
        let p = 2.0 / (1.0 + 2.0 * self.alpha) + self.k * z;
        p / (1.0 - self.alpha * p)
    }

    /// `d[X, Z, φ]/dS`.
    pub fn rhs(&self, y: &[f64; 3]) -> [f64; 3] {
        let [x, z, phi] = *y;
        let (sin, cos) = phi.sin_cos();
        let pressure = self.pressure(z);
        // On the axis sin φ / X → dφ/dS, so dφ/dS = Q / 2.
        let dphi = if x.abs() < AXIS_EPS {
            0.5 * pressure
        } else {
            pressure - sin / x
        };
        [cos, sin, dphi]
    }

    /// Convert a dimensionless state at arc length `s_dimless` to physical units.
    pub fn to_sample(&self, s_dimless: f64, y: &[f64; 3]) -> MeridianSample {
        MeridianSample {
            s: s_dimless / self.b,
            r: y[0] / self.b,
            z: y[1] / self.b,
            phi: y[2],
        }
    }
}

/// Physical-unit derivative `(dr/ds, dz/ds, dφ/ds)` at one point of the meridian.
pub fn meridian_rhs(params: &PhysicalParameters, r: f64, z: f64, phi: f64) -> [f64; 3] {
    let system = YoungLaplace::from_parameters(params);
    let b = params.apex_curvature;
    let [dr, dz, dphi] = system.rhs(&[r * b, z * b, phi]);
    [dr, dz, dphi * b]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Orientation;

    #[test]
    fn apex_derivative_uses_axis_limit() {
        let p = PhysicalParameters::new(0.072, 1000.0, 9.81, 400.0);
        let [dr, dz, dphi] = meridian_rhs(&p, 0.0, 0.0, 0.0);
        assert_eq!((dr, dz), (1.0, 0.0));
        // dφ/ds = b at the apex (half of the 2b mean-curvature term).
        assert!((dphi - 400.0).abs() < 1e-9);
    }

    #[test]
    fn orientation_flips_hydrostatic_term() {
        let base = PhysicalParameters::new(0.072, 1000.0, 9.81, 400.0);
        let pendant = YoungLaplace::from_parameters(&base);
        let sessile = YoungLaplace::from_parameters(&base.with_orientation(Orientation::Sessile));
        assert!(pendant.coefficient() < 0.0);
        assert!((pendant.coefficient() + sessile.coefficient()).abs() < 1e-12);

        let y = [0.5, 0.2, 0.4];
        let dp = pendant.rhs(&y)[2];
        let ds = sessile.rhs(&y)[2];
        assert!(ds > dp);
    }

    #[test]
    fn physical_rhs_matches_formula_off_axis() {
        let p = PhysicalParameters::new(0.07, 1000.0, 9.8, 300.0);
        let (r, z, phi): (f64, f64, f64) = (1e-3, 2e-4, 0.6);
        let c = p.capillary_constant();
        let expected = 2.0 * 300.0 - c * z - phi.sin() / r;
        let got = meridian_rhs(&p, r, z, phi)[2];
        assert!((got - expected).abs() < 1e-9 * expected.abs(), "got {got}, expected {expected}");
    }

    #[test]
    fn tolman_length_keeps_apex_curvature() {
        let p = PhysicalParameters::new(0.072, 1000.0, 9.81, 400.0)
            .with_orientation(Orientation::Sessile)
            .with_tolman_length(2e-4);
        let system = YoungLaplace::from_parameters(&p);
        assert!((system.rhs(&[0.0, 0.0, 0.0])[2] - 1.0).abs() < 1e-12);

        // With k > 0 the pressure term grows faster than without δ.
        let plain = YoungLaplace::from_parameters(&p.with_tolman_length(0.0));
        let y = [0.3, 0.05, 0.3];
        assert!(system.rhs(&y)[2] > plain.rhs(&y)[2]);
    }

    #[test]
    fn tolman_series_coefficient() {
        let p = PhysicalParameters::new(0.072, 1000.0, 9.81, 400.0).with_tolman_length(1e-4);
        let system = YoungLaplace::from_parameters(&p);
        let alpha: f64 = 0.04;
        let expected = system.coefficient() * (1.0 + 2.0 * alpha).powi(2);
        assert!((system.series_coefficient() - expected).abs() < 1e-12 * expected.abs());
        // dQ/dZ by central difference agrees.
        let h = 1e-6;
        let slope = (system.pressure(h) - system.pressure(-h)) / (2.0 * h);
        assert!((slope - expected).abs() < 1e-6 * expected.abs(), "slope={slope}");
    }
}
