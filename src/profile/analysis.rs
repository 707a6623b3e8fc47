//! Derived quantities of an integrated meridian.
//!
//! Integrals use the trapezoid rule over the emitted samples, so their accuracy
//! follows the sample spacing. The Rekhviashvili–Sokurov volume correlation and
//! the spherical-cap formulas are closed-form estimates used for seeding.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::domain::{DropMetrics, MeridianSample, PhysicalParameters};
use crate::error::AdsaError;
use crate::math::HermiteSegment;

/// A collected meridian, apex first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    samples: Vec<MeridianSample>,
}

impl Profile {
    pub fn new(samples: Vec<MeridianSample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[MeridianSample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<MeridianSample> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&MeridianSample> {
        self.samples.last()
    }

    /// Total arc length covered.
    pub fn arc_length(&self) -> f64 {
        self.last().map_or(0.0, |p| p.s)
    }

    /// `π ∫ r² dz`, the volume enclosed between the apex and the last sample's plane.
    pub fn volume(&self) -> f64 {
        PI * self
            .samples
            .windows(2)
            .map(|w| 0.5 * (w[0].r * w[0].r + w[1].r * w[1].r) * (w[1].z - w[0].z))
            .sum::<f64>()
    }

    /// `2π ∫ r ds`, the lateral area of the surface of revolution.
    pub fn surface_area(&self) -> f64 {
        2.0 * PI
            * self
                .samples
                .windows(2)
                .map(|w| 0.5 * (w[0].r + w[1].r) * (w[1].s - w[0].s))
                .sum::<f64>()
    }

    /// Largest axial distance from the apex.
    pub fn height(&self) -> f64 {
        self.samples.iter().map(|p| p.z.abs()).fold(0.0, f64::max)
    }

    pub fn max_radius(&self) -> f64 {
        self.samples.iter().map(|p| p.r).fold(0.0, f64::max)
    }

    /// Tangent angle at the last sample.
    pub fn end_angle(&self) -> f64 {
        self.last().map_or(0.0, |p| p.phi)
    }

    /// Profile cut at arc length `s_end`, with an interpolated end sample.
    pub fn truncated(&self, s_end: f64) -> Profile {
        let n = self.samples.partition_point(|p| p.s <= s_end);
        let mut samples = self.samples[..n].to_vec();
        if n > 0 && n < self.samples.len() {
            let (a, b) = (self.samples[n - 1], self.samples[n]);
            if s_end > a.s {
                let t = (s_end - a.s) / (b.s - a.s);
                let (r, z) = HermiteSegment::new(a, b).point(t);
                samples.push(MeridianSample {
                    s: s_end,
                    r,
                    z,
                    phi: a.phi + (b.phi - a.phi) * t,
                });
            }
        }
        Profile::new(samples)
    }

    /// Volume, area and shape measures together with the parameter-derived numbers.
    pub fn metrics(&self, params: &PhysicalParameters) -> DropMetrics {
        DropMetrics {
            volume: self.volume(),
            surface_area: self.surface_area(),
            height: self.height(),
            max_radius: self.max_radius(),
            end_angle: self.end_angle(),
            apex_radius: params.apex_radius(),
            bond_number: params.bond_number(),
            capillary_length: capillary_length(
                params.delta_rho,
                params.gravity,
                params.surface_tension,
            ),
        }
    }
}

/// `λc = √(σ / (Δρ·g))`.
pub fn capillary_length(delta_rho: f64, gravity: f64, surface_tension: f64) -> f64 {
    (surface_tension / (delta_rho * gravity)).sqrt()
}

/// `(L / λc)²` for a characteristic length `L`.
pub fn bond_number(length: f64, capillary_length: f64) -> f64 {
    (length / capillary_length).powi(2)
}

/// Gravity-free estimate of a sessile drop with a given contact angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphericalCap {
    pub height: f64,
    pub apex_radius: f64,
    pub volume: f64,
    /// Meridian arc length from the apex to the contact line.
    pub path_length: f64,
    pub contact_angle: f64,
}

fn cap_shape_factor(contact_angle: f64) -> f64 {
    let c = contact_angle.cos();
    c * c * c - 3.0 * c + 2.0
}

fn check_contact_angle(contact_angle: f64) -> Result<(), AdsaError> {
    if !(contact_angle.is_finite() && contact_angle > 0.0 && contact_angle <= PI) {
        return Err(AdsaError::InvalidConfig(format!(
            "contact angle must lie in (0, π] (got {contact_angle})"
        )));
    }
    Ok(())
}

/// Spherical cap of radius `apex_radius` cut at `contact_angle`.
pub fn spherical_cap(apex_radius: f64, contact_angle: f64) -> Result<SphericalCap, AdsaError> {
    check_contact_angle(contact_angle)?;
    if !(apex_radius.is_finite() && apex_radius > 0.0) {
        return Err(AdsaError::non_physical(format!(
            "apex radius must be finite and > 0 (got {apex_radius})"
        )));
    }
    Ok(SphericalCap {
        height: apex_radius * (1.0 - contact_angle.cos()),
        apex_radius,
        volume: PI / 3.0 * apex_radius.powi(3) * cap_shape_factor(contact_angle),
        path_length: apex_radius * contact_angle,
        contact_angle,
    })
}

/// Spherical cap holding `volume` at `contact_angle`.
pub fn spherical_cap_for_volume(
    volume: f64,
    contact_angle: f64,
) -> Result<SphericalCap, AdsaError> {
    check_contact_angle(contact_angle)?;
    if !(volume.is_finite() && volume > 0.0) {
        return Err(AdsaError::non_physical(format!(
            "volume must be finite and > 0 (got {volume})"
        )));
    }
    let radius = (3.0 * volume / (PI * cap_shape_factor(contact_angle))).cbrt();
    spherical_cap(radius, contact_angle)
}

/// Empirical drop volume for Bond number `beta`, apex radius `apex_radius`
/// and Tolman ratio `alpha = δ/R0` (Rekhviashvili & Sokurov, 2018).
pub fn estimate_volume(beta: f64, apex_radius: f64, alpha: f64) -> f64 {
    4.73 * apex_radius.powi(3) / (beta.powf(0.941) + 1.028) * tolman_factor(beta, alpha)
}

/// Inverse of [`estimate_volume`] for the apex radius.
pub fn estimate_apex_radius(beta: f64, volume: f64, alpha: f64) -> f64 {
    (volume * (beta.powf(0.941) + 1.028) / (4.73 * tolman_factor(beta, alpha))).cbrt()
}

fn tolman_factor(beta: f64, alpha: f64) -> f64 {
    (-2.513 * beta.powf(0.398) * alpha).exp()
}

/// Surface-of-revolution point cloud: `n_theta` azimuths per meridian sample.
pub fn revolve_profile(profile: &Profile, n_theta: usize) -> Vec<[f64; 3]> {
    let azimuths: Vec<(f64, f64)> = (0..n_theta)
        .map(|j| (2.0 * PI * j as f64 / n_theta as f64).sin_cos())
        .collect();
    profile
        .samples()
        .iter()
        .flat_map(|p| azimuths.iter().map(move |&(sin, cos)| [p.r * cos, p.r * sin, p.z]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hemisphere(radius: f64, n: usize) -> Profile {
        Profile::new(
            (0..=n)
                .map(|i| {
                    let phi = 0.5 * PI * i as f64 / n as f64;
                    MeridianSample {
                        s: radius * phi,
                        r: radius * phi.sin(),
                        z: radius * (1.0 - phi.cos()),
                        phi,
                    }
                })
                .collect(),
        )
    }

    #[test]
    fn hemisphere_volume_and_area() {
        let r = 2.0;
        let profile = hemisphere(r, 2000);
        let volume = 2.0 / 3.0 * PI * r.powi(3);
        let area = 2.0 * PI * r * r;
        assert!((profile.volume() - volume).abs() < 1e-5 * volume, "V={}", profile.volume());
        let a = profile.surface_area();
        assert!((a - area).abs() < 1e-5 * area, "A={a}");
        assert!((profile.height() - r).abs() < 1e-12);
        assert!((profile.max_radius() - r).abs() < 1e-12);
        assert!((profile.end_angle() - 0.5 * PI).abs() < 1e-12);
    }

    #[test]
    fn truncation_interpolates_end_point() {
        let r = 1.0;
        let profile = hemisphere(r, 50);
        let cut = profile.truncated(0.5);
        let end = cut.last().unwrap();
        assert_eq!(end.s, 0.5);
        assert!((end.r - 0.5_f64.sin()).abs() < 1e-7, "r={}", end.r);
        assert!(cut.samples().windows(2).all(|w| w[1].s > w[0].s));
        assert_eq!(profile.truncated(10.0).len(), profile.len());
    }

    #[test]
    fn spherical_cap_hemisphere() {
        let cap = spherical_cap(1.5, 0.5 * PI).unwrap();
        assert!((cap.height - 1.5).abs() < 1e-12);
        assert!((cap.volume - 2.0 / 3.0 * PI * 1.5_f64.powi(3)).abs() < 1e-12);
        assert!((cap.path_length - 0.75 * PI).abs() < 1e-12);

        let back = spherical_cap_for_volume(cap.volume, 0.5 * PI).unwrap();
        assert!((back.apex_radius - 1.5).abs() < 1e-12);
    }

    #[test]
    fn spherical_cap_rejects_bad_angle() {
        assert!(matches!(spherical_cap(1.0, 0.0), Err(AdsaError::InvalidConfig(_))));
        assert!(matches!(spherical_cap(1.0, 4.0), Err(AdsaError::InvalidConfig(_))));
    }

    #[test]
    fn volume_estimate_inverts() {
        let v = estimate_volume(0.4, 1.3e-3, 0.0);
        assert!((estimate_apex_radius(0.4, v, 0.0) - 1.3e-3).abs() < 1e-15);
        let shrunk = estimate_volume(0.4, 1.3e-3, 0.05);
        assert!(shrunk < v);
        assert!((estimate_apex_radius(0.4, shrunk, 0.05) - 1.3e-3).abs() < 1e-15);
    }

    #[test]
    fn capillary_length_of_water() {
        let lc = capillary_length(998.0, 9.81, 0.0728);
        assert!((lc - 2.727e-3).abs() < 1e-5, "λc={lc}");
        assert!((bond_number(lc, lc) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn revolve_emits_full_rings() {
        let profile = hemisphere(1.0, 10);
        let cloud = revolve_profile(&profile, 8);
        assert_eq!(cloud.len(), 11 * 8);
        let ring = &cloud[8 * 10..];
        assert!(ring
            .iter()
            .all(|p| (p[0].hypot(p[1]) - 1.0).abs() < 1e-12 && (p[2] - 1.0).abs() < 1e-12));
    }
}
