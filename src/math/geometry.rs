//! Planar geometry for point-to-meridian correspondence.
//!
//! The meridian is stored as discrete samples `(s, r, z, φ)`. Between two
//! samples the curve is reconstructed as a cubic Hermite polynomial in arc
//! length, using the exact unit tangents `(cos φ, sin φ)` at both ends. This
//! keeps the interpolation error at `O(h⁴)` so the sample spacing only has to
//! localise the nearest point, not resolve it.

use crate::domain::MeridianSample;

/// Newton iterations for the closest point on one segment.
const NEWTON_ITERS: usize = 12;

/// Scalar cubic Hermite interpolation on `[0, h]` at fraction `t ∈ [0, 1]`.
pub fn hermite(y0: f64, d0: f64, y1: f64, d1: f64, h: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    h00 * y0 + h10 * h * d0 + h01 * y1 + h11 * h * d1
}

/// Derivative of [`hermite`] with respect to `t`.
fn hermite_dt(y0: f64, d0: f64, y1: f64, d1: f64, h: f64, t: f64) -> f64 {
    let t2 = t * t;
    (6.0 * t2 - 6.0 * t) * y0
        + (3.0 * t2 - 4.0 * t + 1.0) * h * d0
        + (-6.0 * t2 + 6.0 * t) * y1
        + (3.0 * t2 - 2.0 * t) * h * d1
}

/// Second derivative of [`hermite`] with respect to `t`.
fn hermite_dtt(y0: f64, d0: f64, y1: f64, d1: f64, h: f64, t: f64) -> f64 {
    (12.0 * t - 6.0) * y0
        + (6.0 * t - 4.0) * h * d0
        + (-12.0 * t + 6.0) * y1
        + (6.0 * t - 2.0) * h * d1
}

/// Map an observed point into the drop frame `(u, v)`.
///
/// `v` runs along the symmetry axis from the apex, `u` across it.
pub fn to_drop_frame(x: f64, y: f64, apex_x: f64, apex_y: f64, tilt: f64) -> (f64, f64) {
    let (sin, cos) = tilt.sin_cos();
    let dx = x - apex_x;
    let dy = y - apex_y;
    (cos * dx + sin * dy, -sin * dx + cos * dy)
}

/// Inverse of [`to_drop_frame`].
pub fn from_drop_frame(u: f64, v: f64, apex_x: f64, apex_y: f64, tilt: f64) -> (f64, f64) {
    let (sin, cos) = tilt.sin_cos();
    (apex_x + cos * u - sin * v, apex_y + sin * u + cos * v)
}

/// Cubic Hermite reconstruction of the meridian between two samples.
#[derive(Debug, Clone, Copy)]
pub struct HermiteSegment {
    a: MeridianSample,
    b: MeridianSample,
    h: f64,
}

/// Closest point on a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHit {
    pub s: f64,
    pub r: f64,
    pub z: f64,
    pub phi: f64,
    /// Squared Euclidean distance to the query point.
    pub dist2: f64,
    /// Signed distance: positive when the query lies left of the tangent.
    pub signed: f64,
}

impl HermiteSegment {
    pub fn new(a: MeridianSample, b: MeridianSample) -> Self {
        Self { a, b, h: b.s - a.s }
    }

    pub fn point(&self, t: f64) -> (f64, f64) {
        let (a, b, h) = (&self.a, &self.b, self.h);
        (
            hermite(a.r, a.phi.cos(), b.r, b.phi.cos(), h, t),
            hermite(a.z, a.phi.sin(), b.z, b.phi.sin(), h, t),
        )
    }

    fn first(&self, t: f64) -> (f64, f64) {
        let (a, b, h) = (&self.a, &self.b, self.h);
        (
            hermite_dt(a.r, a.phi.cos(), b.r, b.phi.cos(), h, t),
            hermite_dt(a.z, a.phi.sin(), b.z, b.phi.sin(), h, t),
        )
    }

    fn second(&self, t: f64) -> (f64, f64) {
        let (a, b, h) = (&self.a, &self.b, self.h);
        (
            hermite_dtt(a.r, a.phi.cos(), b.r, b.phi.cos(), h, t),
            hermite_dtt(a.z, a.phi.sin(), b.z, b.phi.sin(), h, t),
        )
    }

    fn dist2(&self, t: f64, q: (f64, f64)) -> f64 {
        let (r, z) = self.point(t);
        (r - q.0).powi(2) + (z - q.1).powi(2)
    }

    /// Closest point to `q = (r, z)` on this segment.
    pub fn closest(&self, q: (f64, f64)) -> SegmentHit {
        // Start from the chord projection, then polish with Newton on
        // d/dt |H(t) − q|² = 0. End points are always candidates.
        let (r0, z0) = (self.a.r, self.a.z);
        let (cr, cz) = (self.b.r - r0, self.b.z - z0);
        let chord2 = cr * cr + cz * cz;
        let mut t = if chord2 > 0.0 {
            (((q.0 - r0) * cr + (q.1 - z0) * cz) / chord2).clamp(0.0, 1.0)
        } else {
            0.0
        };

        for _ in 0..NEWTON_ITERS {
            let (pr, pz) = self.point(t);
            let (dr, dz) = self.first(t);
            let (ddr, ddz) = self.second(t);
            let (er, ez) = (pr - q.0, pz - q.1);
            let g = er * dr + ez * dz;
            let gp = dr * dr + dz * dz + er * ddr + ez * ddz;
            if !(gp.is_finite() && gp > 0.0) {
                break;
            }
            let next = (t - g / gp).clamp(0.0, 1.0);
            if (next - t).abs() < 1e-14 {
                t = next;
                break;
            }
            t = next;
        }

        let mut best_t = t;
        let mut best = self.dist2(t, q);
        for end in [0.0, 1.0] {
            let d = self.dist2(end, q);
            if d < best {
                best = d;
                best_t = end;
            }
        }

        let (r, z) = self.point(best_t);
        let phi = self.a.phi + (self.b.phi - self.a.phi) * best_t;
        let (tr, tz) = (phi.cos(), phi.sin());
        let cross = tr * (q.1 - z) - tz * (q.0 - r);
        let dist = best.sqrt();
        SegmentHit {
            s: self.a.s + self.h * best_t,
            r,
            z,
            phi,
            dist2: best,
            signed: if cross < 0.0 { -dist } else { dist },
        }
    }
}

/// Closest point on a sampled meridian.
///
/// Every sample whose distance to `q` is a local minimum along the curve seeds
/// a Hermite refinement on its two neighbouring segments, so a curve that
/// folds back near `q` still yields the global nearest point.
///
/// Returns `None` for an empty sample list.
pub fn closest_on_meridian(samples: &[MeridianSample], q: (f64, f64)) -> Option<SegmentHit> {
    let n = samples.len();
    if n == 0 {
        return None;
    }
    let dist2: Vec<f64> = samples
        .iter()
        .map(|p| (p.r - q.0).powi(2) + (p.z - q.1).powi(2))
        .collect();

    if n == 1 {
        let p = samples[0];
        return Some(SegmentHit {
            s: p.s,
            r: p.r,
            z: p.z,
            phi: p.phi,
            dist2: dist2[0],
            signed: dist2[0].sqrt(),
        });
    }

    let mut best: Option<SegmentHit> = None;
    for i in 0..n {
        let left = if i > 0 { dist2[i - 1] } else { f64::INFINITY };
        let right = if i + 1 < n { dist2[i + 1] } else { f64::INFINITY };
        if dist2[i] > left || dist2[i] > right {
            continue;
        }
        for seg_start in [i.saturating_sub(1), i] {
            if seg_start + 1 >= n {
                continue;
            }
            let hit = HermiteSegment::new(samples[seg_start], samples[seg_start + 1]).closest(q);
            if best.map_or(true, |b| hit.dist2 < b.dist2) {
                best = Some(hit);
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle(n: usize, radius: f64) -> Vec<MeridianSample> {
        (0..n)
            .map(|i| {
                let phi = std::f64::consts::PI * i as f64 / (n as f64 - 1.0);
                MeridianSample {
                    s: radius * phi,
                    r: radius * phi.sin(),
                    z: radius * (1.0 - phi.cos()),
                    phi,
                }
            })
            .collect()
    }

    #[test]
    fn frame_round_trip() {
        let (u, v) = to_drop_frame(3.0, -1.0, 1.0, 2.0, 0.3);
        let (x, y) = from_drop_frame(u, v, 1.0, 2.0, 0.3);
        assert!((x - 3.0).abs() < 1e-12 && (y + 1.0).abs() < 1e-12);
    }

    #[test]
    fn hermite_reproduces_cubic() {
        // y = t³ on [0, 2]: y0=0, d0=0, y1=8, d1=12.
        let h = 2.0;
        let v = hermite(0.0, 0.0, 8.0, 12.0, h, 0.5);
        assert!((v - 1.0).abs() < 1e-12);
    }

    #[test]
    fn closest_point_on_sampled_circle_is_accurate() {
        let radius = 2.0;
        let samples = circle(40, radius);
        // Query outside the circle along the 60° direction from its centre (0, R).
        let ang = std::f64::consts::PI / 3.0;
        let q = (1.5 * radius * ang.sin(), radius - 1.5 * radius * ang.cos());
        let hit = closest_on_meridian(&samples, q).unwrap();
        assert!((hit.dist2.sqrt() - 0.5 * radius).abs() < 1e-6, "dist={}", hit.dist2.sqrt());
        assert!((hit.s - radius * ang).abs() < 1e-5, "s={}", hit.s);
        // Outside the circle lies to the right of the counter-clockwise tangent.
        assert!(hit.signed < 0.0);
    }

    #[test]
    fn inside_and_outside_have_opposite_signs() {
        let samples = circle(30, 1.0);
        let inside = closest_on_meridian(&samples, (0.5, 1.0)).unwrap();
        let outside = closest_on_meridian(&samples, (1.5, 1.0)).unwrap();
        assert!(inside.signed * outside.signed < 0.0);
        assert!((inside.signed.abs() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn folded_curve_picks_the_nearer_branch() {
        // Hairpin: out along z = 0, up the side, back along z = 0.2. Both legs
        // have a local minimum near the query; the return leg is closer.
        let sample = |s: f64, r: f64, z: f64, phi: f64| MeridianSample { s, r, z, phi };
        let mut samples: Vec<MeridianSample> =
            (0..=20).map(|i| sample(0.05 * i as f64, 0.05 * i as f64, 0.0, 0.0)).collect();
        samples.push(sample(1.1, 1.0, 0.1, std::f64::consts::FRAC_PI_2));
        samples.extend((0..=20).map(|i| {
            let r = 1.0 - 0.05 * i as f64;
            sample(1.2 + 0.05 * i as f64, r, 0.2, std::f64::consts::PI)
        }));

        let hit = closest_on_meridian(&samples, (0.5, 0.15)).unwrap();
        assert!((hit.dist2.sqrt() - 0.05).abs() < 1e-9, "dist={}", hit.dist2.sqrt());
        assert!((hit.z - 0.2).abs() < 1e-9 && (hit.r - 0.5).abs() < 1e-9);
        assert!((hit.s - 1.7).abs() < 1e-9, "s={}", hit.s);
    }
}
