//! Adaptive integration of the Young-Laplace meridian.
//!
//! Given:
//! - physical parameters (σ, Δρ, g, b, orientation)
//! - a span (arc length, radius, height, tangent-angle limits)
//! - tolerances and a step budget
//!
//! we produce, lazily, the samples `(s, r, z, φ)` of one meridian half:
//! - a series bootstrap covers the removable singularity at the apex
//! - Dormand–Prince 5(4) with its 4th-order dense output covers the rest
//! - limits hit inside a step are located by bisection on the dense output
//!
//! Integration runs on the dimensionless system (lengths in units of `1/b`) so
//! the tolerances do not depend on the caller's length unit.

use std::collections::VecDeque;

use log::trace;

use crate::domain::{IntegrationSpan, IntegratorConfig, MeridianSample, PhysicalParameters};
use crate::error::AdsaError;
use crate::math::{apex_series, apex_series_step};
use crate::models::YoungLaplace;
use crate::profile::analysis::Profile;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;
/// Smallest step relative to `max(1, S)` before giving up.
const MIN_STEP_REL: f64 = 1e-14;
const BISECTION_ITERS: usize = 64;

// Dormand–Prince 5(4) tableau.
const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;
// Dense output (Hairer & Wanner, contd5).
const D1: f64 = -12715105075.0 / 11282082432.0;
const D3: f64 = 87487479700.0 / 32700410799.0;
const D4: f64 = -10690763975.0 / 1880347072.0;
const D5: f64 = 701980252875.0 / 199316789632.0;
const D6: f64 = -1453857185.0 / 822651844.0;
const D7: f64 = 69997945.0 / 29380423.0;

/// Accepted integrator state.
#[derive(Debug, Clone, Copy)]
struct Node {
    s: f64,
    y: [f64; 3],
    f: [f64; 3],
}

/// Continuous representation of the solution across one accepted step.
#[derive(Debug, Clone, Copy)]
enum Segment {
    /// Apex series on `[0, s_end]`.
    Series { k: f64, s_end: f64 },
    /// Dormand–Prince dense output on `[s0, s0 + h]`.
    Dense { s0: f64, h: f64, rcont: [[f64; 3]; 5] },
}

impl Segment {
    fn start(&self) -> f64 {
        match self {
            Segment::Series { .. } => 0.0,
            Segment::Dense { s0, .. } => *s0,
        }
    }

    fn length(&self) -> f64 {
        match self {
            Segment::Series { s_end, .. } => *s_end,
            Segment::Dense { h, .. } => *h,
        }
    }

    /// State at fraction `theta ∈ [0, 1]` of the segment.
    fn state(&self, theta: f64) -> [f64; 3] {
        match self {
            Segment::Series { k, s_end } => apex_series(theta * s_end, *k),
            Segment::Dense { rcont, .. } => {
                let t1 = 1.0 - theta;
                let mut y = [0.0; 3];
                for (i, yi) in y.iter_mut().enumerate() {
                    *yi = rcont[0][i]
                        + theta
                            * (rcont[1][i]
                                + t1 * (rcont[2][i] + theta * (rcont[3][i] + t1 * rcont[4][i])));
                }
                y
            }
        }
    }
}

/// Which span limit ended the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Limit {
    ArcLength,
    Radius,
    Height,
    Angle,
    Axis,
}

/// Lazy meridian generator returned by [`integrate_profile`].
///
/// Yields samples in strictly increasing arc length, starting at the apex.
/// After an error is yielded the iterator is exhausted.
#[derive(Debug, Clone)]
pub struct ProfileIter {
    system: YoungLaplace,
    config: IntegratorConfig,
    s_max: f64,
    x_max: Option<f64>,
    z_max: Option<f64>,
    phi_max: Option<f64>,
    h_max: f64,
    spacing: Option<f64>,
    node: Node,
    h: f64,
    steps: usize,
    bootstrapped: bool,
    next_grid: usize,
    last_emitted: f64,
    pending: VecDeque<MeridianSample>,
    finished: bool,
}

/// Integrate the meridian for `params` over `span`.
///
/// Parameter, span and configuration checks happen up front: a bad
/// parameter set is `NonPhysicalGuess`, a bad span or integrator config is
/// `InvalidConfig`. Numerical failures surface lazily as
/// `Err(NumericalDivergence)` items.
pub fn integrate_profile(
    params: &PhysicalParameters,
    span: &IntegrationSpan,
    config: &IntegratorConfig,
) -> Result<ProfileIter, AdsaError> {
    params.validate()?;
    span.validate()?;
    config.validate()?;
    Ok(ProfileIter::new(params, span, config))
}

/// Integrate and collect the whole meridian.
///
/// Fails with `NonPhysicalGuess` or `InvalidConfig` before integrating, as
/// [`integrate_profile`] does, and with `NumericalDivergence` when the step
/// budget runs out or the state stops being finite.
pub fn generate_profile(
    params: &PhysicalParameters,
    span: &IntegrationSpan,
    config: &IntegratorConfig,
) -> Result<Profile, AdsaError> {
    integrate_profile(params, span, config)?.collect_profile()
}

impl ProfileIter {
    fn new(params: &PhysicalParameters, span: &IntegrationSpan, config: &IntegratorConfig) -> Self {
        let system = YoungLaplace::from_parameters(params);
        let b = params.apex_curvature;
        let s_max = span.max_arc_length * b;
        let apex = [0.0; 3];
        let node = Node {
            s: 0.0,
            y: apex,
            f: system.rhs(&apex),
        };

        let mut pending = VecDeque::new();
        pending.push_back(system.to_sample(0.0, &apex));

        Self {
            system,
            config: *config,
            s_max,
            x_max: span.max_radius.map(|r| r * b),
            z_max: span.max_height.map(|z| z * b),
            phi_max: span.max_angle,
            h_max: config.max_step.map(|h| h * b).unwrap_or(s_max),
            spacing: config.sample_spacing.map(|ds| ds * b),
            node,
            h: 0.0,
            steps: 0,
            bootstrapped: false,
            next_grid: 1,
            last_emitted: 0.0,
            pending,
            finished: false,
        }
    }

    /// Drain the iterator into a [`Profile`], failing on the first error.
    pub fn collect_profile(self) -> Result<Profile, AdsaError> {
        let samples = self.collect::<Result<Vec<_>, _>>()?;
        Ok(Profile::new(samples))
    }

    /// Accepted Dormand–Prince steps taken so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    fn divergence(&self, s: f64, reason: impl Into<String>) -> AdsaError {
        AdsaError::divergence(s / self.system.apex_curvature(), reason)
    }

    /// Advance by one accepted step (or the apex bootstrap) and queue samples.
    fn advance(&mut self) -> Result<(), AdsaError> {
        let prev = self.node;
        let min_step = MIN_STEP_REL * prev.s.max(1.0);
        if self.s_max - prev.s <= min_step {
            self.finish(prev);
            return Ok(());
        }

        let (next, segment) = if self.bootstrapped {
            self.dormand_prince_step(&prev)?
        } else {
            self.bootstrap()
        };
        self.check_sane(&next)?;

        match self.find_limit(&prev, &next, &segment) {
            Some((theta, limit)) => {
                let y = segment.state(theta);
                let stop = Node {
                    s: segment.start() + theta * segment.length(),
                    y,
                    f: self.system.rhs(&y),
                };
                trace!("profile limit {limit:?} reached at S={:.6e}", stop.s);
                self.emit_grid(&segment, stop.s);
                self.finish(stop);
            }
            None => {
                self.emit_grid(&segment, next.s);
                if self.spacing.is_none() {
                    self.push_node(&next);
                }
                self.node = next;
            }
        }
        Ok(())
    }

    fn bootstrap(&mut self) -> (Node, Segment) {
        self.bootstrapped = true;
        let k = self.system.series_coefficient();
        let s_end = apex_series_step(k).min(self.s_max);
        let y = apex_series(s_end, k);
        self.h = (10.0 * s_end).min(self.h_max);
        (
            Node {
                s: s_end,
                y,
                f: self.system.rhs(&y),
            },
            Segment::Series { k, s_end },
        )
    }

    fn dormand_prince_step(&mut self, prev: &Node) -> Result<(Node, Segment), AdsaError> {
        let cfg = self.config;
        let min_step = MIN_STEP_REL * prev.s.max(1.0);
        let y0 = prev.y;
        let k1 = prev.f;

        loop {
            if self.steps >= cfg.max_steps {
                return Err(self.divergence(
                    prev.s,
                    format!("step budget of {} exhausted", cfg.max_steps),
                ));
            }
            let h = self.h.min(self.h_max).min(self.s_max - prev.s);
            if !(h.is_finite() && h >= min_step) {
                return Err(self.divergence(prev.s, format!("step size underflow (h={h:.3e})")));
            }
            self.steps += 1;

            let stage = |coeffs: &[(f64, &[f64; 3])]| -> [f64; 3] {
                let mut y = y0;
                for (c, k) in coeffs {
                    for i in 0..3 {
                        y[i] += h * c * k[i];
                    }
                }
                y
            };

            let k2 = self.system.rhs(&stage(&[(A21, &k1)]));
            let k3 = self.system.rhs(&stage(&[(A31, &k1), (A32, &k2)]));
            let k4 = self.system.rhs(&stage(&[(A41, &k1), (A42, &k2), (A43, &k3)]));
            let k5 = self
                .system
                .rhs(&stage(&[(A51, &k1), (A52, &k2), (A53, &k3), (A54, &k4)]));
            let k6 = self.system.rhs(&stage(&[
                (A61, &k1),
                (A62, &k2),
                (A63, &k3),
                (A64, &k4),
                (A65, &k5),
            ]));
            let y1 = stage(&[(B1, &k1), (B3, &k3), (B4, &k4), (B5, &k5), (B6, &k6)]);
            let k7 = self.system.rhs(&y1);

            let mut err_sq = 0.0;
            let mut finite = true;
            for i in 0..3 {
                let e = h
                    * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
                let sc = cfg.abs_tol + cfg.rel_tol * y0[i].abs().max(y1[i].abs());
                finite &= e.is_finite() && y1[i].is_finite() && k7[i].is_finite();
                err_sq += (e / sc).powi(2);
            }
            let err = (err_sq / 3.0).sqrt();

            if !finite || !err.is_finite() {
                trace!("non-finite trial step at S={:.6e} (h={h:.3e})", prev.s);
                self.h = h * MIN_FACTOR;
                continue;
            }

            if err <= 1.0 {
                let factor = if err == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
                };
                self.h = h * factor;

                let mut rcont = [[0.0; 3]; 5];
                for i in 0..3 {
                    let ydiff = y1[i] - y0[i];
                    let bspl = h * k1[i] - ydiff;
                    rcont[0][i] = y0[i];
                    rcont[1][i] = ydiff;
                    rcont[2][i] = bspl;
                    rcont[3][i] = ydiff - h * k7[i] - bspl;
                    rcont[4][i] = h
                        * (D1 * k1[i]
                            + D3 * k3[i]
                            + D4 * k4[i]
                            + D5 * k5[i]
                            + D6 * k6[i]
                            + D7 * k7[i]);
                }
                let s1 = if h == self.s_max - prev.s {
                    self.s_max
                } else {
                    prev.s + h
                };
                return Ok((
                    Node { s: s1, y: y1, f: k7 },
                    Segment::Dense { s0: prev.s, h, rcont },
                ));
            }

            trace!("rejected step at S={:.6e} (h={h:.3e}, err={err:.3e})", prev.s);
            self.h = h * (SAFETY * err.powf(-0.2)).max(MIN_FACTOR);
        }
    }

    fn check_sane(&self, node: &Node) -> Result<(), AdsaError> {
        if node.y.iter().any(|v| !v.is_finite()) {
            return Err(self.divergence(node.s, "non-finite meridian state"));
        }
        let bound = self.config.divergence_bound;
        if node.y[0].abs() > bound || node.y[1].abs() > bound {
            return Err(self.divergence(
                node.s,
                format!("meridian left the sane region (|r|,|z| > {bound} apex radii)"),
            ));
        }
        Ok(())
    }

    /// Earliest limit crossed inside `[prev, next]`, as a segment fraction.
    fn find_limit(&self, prev: &Node, next: &Node, segment: &Segment) -> Option<(f64, Limit)> {
        let mut best: Option<(f64, Limit)> = None;
        let mut consider = |theta: f64, limit: Limit| {
            if best.map_or(true, |(t, _)| theta < t) {
                best = Some((theta, limit));
            }
        };

        if next.s >= self.s_max {
            consider(1.0, Limit::ArcLength);
        }
        if let Some(x_max) = self.x_max {
            if next.y[0] >= x_max {
                consider(bisect(segment, |y| y[0] - x_max), Limit::Radius);
            }
        }
        if let Some(z_max) = self.z_max {
            if next.y[1] >= z_max {
                consider(bisect(segment, |y| y[1] - z_max), Limit::Height);
            }
        }
        if let Some(phi_max) = self.phi_max {
            if next.y[2] >= phi_max {
                consider(bisect(segment, |y| y[2] - phi_max), Limit::Angle);
            }
        }
        if prev.s > 0.0 && next.y[0] <= 0.0 {
            consider(bisect(segment, |y| -y[0]), Limit::Axis);
        }
        best
    }

    /// Queue uniform-grid samples up to and including `s_end`.
    fn emit_grid(&mut self, segment: &Segment, s_end: f64) {
        let Some(ds) = self.spacing else {
            return;
        };
        let s0 = segment.start();
        let len = segment.length();
        loop {
            let s = self.next_grid as f64 * ds;
            if s > s_end || len <= 0.0 {
                break;
            }
            let theta = ((s - s0) / len).clamp(0.0, 1.0);
            let y = segment.state(theta);
            self.pending.push_back(self.system.to_sample(s, &y));
            self.last_emitted = s;
            self.next_grid += 1;
        }
    }

    fn push_node(&mut self, node: &Node) {
        if node.s > self.last_emitted {
            self.pending.push_back(self.system.to_sample(node.s, &node.y));
            self.last_emitted = node.s;
        }
    }

    fn finish(&mut self, stop: Node) {
        let tol = 1e-12 * stop.s.max(1e-300);
        if stop.s > self.last_emitted + tol {
            self.push_node(&stop);
        }
        self.node = stop;
        self.finished = true;
    }
}

/// Locate the zero of `g` along `segment`, given `g(start) < 0 ≤ g(end)`.
fn bisect(segment: &Segment, g: impl Fn(&[f64; 3]) -> f64) -> f64 {
    let (mut lo, mut hi) = (0.0, 1.0);
    if g(&segment.state(0.0)) >= 0.0 {
        return 0.0;
    }
    for _ in 0..BISECTION_ITERS {
        let mid = 0.5 * (lo + hi);
        if g(&segment.state(mid)) >= 0.0 {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    hi
}

impl Iterator for ProfileIter {
    type Item = Result<MeridianSample, AdsaError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(sample) = self.pending.pop_front() {
                return Some(Ok(sample));
            }
            if self.finished {
                return None;
            }
            if let Err(e) = self.advance() {
                self.finished = true;
                self.pending.clear();
                return Some(Err(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn weightless(b: f64) -> PhysicalParameters {
        // Negligible gravity: the meridian is a circle of radius 1/b.
        PhysicalParameters::new(1e6, 1.0, 1e-9, b)
    }

    #[test]
    fn starts_at_apex_and_increases_strictly() {
        let p = PhysicalParameters::new(0.072, 1000.0, 9.81, 400.0);
        let span = IntegrationSpan::arc_length(0.01);
        let samples: Vec<_> = integrate_profile(&p, &span, &IntegratorConfig::default())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        let first = samples[0];
        assert_eq!((first.s, first.r, first.z, first.phi), (0.0, 0.0, 0.0, 0.0));
        assert!(samples.windows(2).all(|w| w[1].s > w[0].s));
        let last = samples[samples.len() - 1];
        assert!((last.s - 0.01).abs() < 1e-12, "last s={}", last.s);
    }

    #[test]
    fn weightless_drop_is_a_circle() {
        let b = 250.0;
        let span = IntegrationSpan::arc_length(10.0).with_max_angle(FRAC_PI_2);
        let profile =
            generate_profile(&weightless(b), &span, &IntegratorConfig::default()).unwrap();
        let end = profile.samples()[profile.len() - 1];
        let radius = 1.0 / b;
        assert!((end.phi - FRAC_PI_2).abs() < 1e-9);
        assert!((end.r - radius).abs() < 1e-4 * radius, "r={} R={radius}", end.r);
        assert!((end.z - radius).abs() < 1e-4 * radius);
        for s in profile.samples() {
            let expected = (b * s.s).sin() / b;
            assert!((s.r - expected).abs() < 1e-8 * radius);
        }
    }

    #[test]
    fn uniform_grid_spacing() {
        let b = 100.0;
        let ds = 1e-4;
        let config = IntegratorConfig {
            sample_spacing: Some(ds),
            ..IntegratorConfig::default()
        };
        let span = IntegrationSpan::arc_length(2.5e-3);
        let profile = generate_profile(&weightless(b), &span, &config).unwrap();
        assert_eq!(profile.len(), 26);
        for (j, s) in profile.samples().iter().enumerate() {
            assert!((s.s - j as f64 * ds).abs() < 1e-12, "j={j} s={}", s.s);
        }
    }

    #[test]
    fn sphere_closes_on_axis() {
        let b = 250.0;
        let span = IntegrationSpan::arc_length(1.0);
        let profile =
            generate_profile(&weightless(b), &span, &IntegratorConfig::default()).unwrap();
        let end = profile.samples()[profile.len() - 1];
        assert!(end.r.abs() < 1e-9 / b, "profile should end on the axis, r={}", end.r);
        assert!((end.s - PI / b).abs() < 1e-8 / b, "s={}", end.s);
        assert!((end.phi - PI).abs() < 1e-6);
    }

    #[test]
    fn tolman_length_leaves_weightless_sphere_unchanged() {
        let b = 250.0;
        let span = IntegrationSpan::arc_length(10.0).with_max_angle(FRAC_PI_2);
        let p = weightless(b).with_tolman_length(0.1 / b);
        let profile = generate_profile(&p, &span, &IntegratorConfig::default()).unwrap();
        let end = profile.samples()[profile.len() - 1];
        assert!((end.r - 1.0 / b).abs() < 1e-4 / b, "r={}", end.r);
    }

    #[test]
    fn positive_tolman_length_narrows_sessile_drop() {
        let p = PhysicalParameters::new(0.072, 1000.0, 9.81, 400.0)
            .with_orientation(crate::domain::Orientation::Sessile);
        let span = IntegrationSpan::arc_length(0.05).with_max_angle(FRAC_PI_2);
        let equator = |params: &PhysicalParameters| {
            let profile = generate_profile(params, &span, &IntegratorConfig::default()).unwrap();
            profile.samples()[profile.len() - 1].r
        };
        let plain = equator(&p);
        let corrected = equator(&p.with_tolman_length(0.05 / 400.0));
        assert!(corrected < plain, "plain={plain} corrected={corrected}");
    }

    #[test]
    fn step_budget_exhaustion_is_divergence() {
        let p = PhysicalParameters::new(0.072, 1000.0, 9.81, 400.0);
        let config = IntegratorConfig {
            max_steps: 3,
            ..IntegratorConfig::default()
        };
        let result = generate_profile(&p, &IntegrationSpan::arc_length(0.05), &config);
        assert!(matches!(result, Err(AdsaError::NumericalDivergence { .. })));
    }

    #[test]
    fn non_physical_parameters_are_rejected_up_front() {
        let p = PhysicalParameters::new(0.072, 1000.0, 9.81, -1.0);
        let span = IntegrationSpan::arc_length(1.0);
        let result = integrate_profile(&p, &span, &IntegratorConfig::default());
        assert!(matches!(result, Err(AdsaError::NonPhysicalGuess { .. })));
    }

    #[test]
    fn restart_reproduces_identical_samples() {
        let p = PhysicalParameters::new(0.05, 900.0, 9.81, 350.0);
        let span = IntegrationSpan::arc_length(0.008).with_max_angle(2.0);
        let a = generate_profile(&p, &span, &IntegratorConfig::default()).unwrap();
        let b = generate_profile(&p, &span, &IntegratorConfig::default()).unwrap();
        assert_eq!(a.samples(), b.samples());
    }
}
