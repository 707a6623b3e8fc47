//! Meridian integration against closed-form limits.

use std::f64::consts::{FRAC_PI_2, PI};

use drop_shape::profile::spherical_cap;
use drop_shape::{
    generate_profile, integrate_profile, IntegrationSpan, IntegratorConfig, PhysicalParameters,
};

mod common;
use common::{pendant_water, rel, sessile_water};

fn near_sphere() -> PhysicalParameters {
    PhysicalParameters::new(1e3, 1.0, 1e-6, 10.0)
}

#[test]
fn arc_length_starts_at_apex_and_increases() {
    for params in [sessile_water(), pendant_water()] {
        let span = IntegrationSpan::arc_length(0.01);
        let profile = generate_profile(&params, &span, &IntegratorConfig::default()).unwrap();
        let samples = profile.samples();
        let first = samples[0];
        assert_eq!((first.s, first.r, first.z, first.phi), (0.0, 0.0, 0.0, 0.0));
        assert!(samples.windows(2).all(|w| w[1].s > w[0].s));
        assert!((profile.arc_length() - 0.01).abs() < 1e-12);
    }
}

#[test]
fn near_zero_bond_drop_is_a_hemisphere() {
    let params = near_sphere();
    let span = IntegrationSpan::arc_length(1.0).with_max_angle(FRAC_PI_2);
    let config = IntegratorConfig {
        sample_spacing: Some(1e-4),
        ..IntegratorConfig::default()
    };
    let profile = generate_profile(&params, &span, &config).unwrap();
    let end = profile.last().unwrap();

    assert!((end.phi - FRAC_PI_2).abs() < 1e-9, "phi={}", end.phi);
    assert!((end.r - 0.1).abs() < 1e-4, "r={}", end.r);
    assert!((end.z - 0.1).abs() < 1e-4, "z={}", end.z);

    let cap = spherical_cap(0.1, FRAC_PI_2).unwrap();
    assert!(rel(profile.volume(), cap.volume) < 1e-4, "V={} cap={}", profile.volume(), cap.volume);
    assert!(rel(profile.surface_area(), 2.0 * PI * 0.01) < 1e-4);
}

#[test]
fn samples_are_produced_lazily() {
    let span = IntegrationSpan::arc_length(1.0);
    let mut iter =
        integrate_profile(&pendant_water(), &span, &IntegratorConfig::default()).unwrap();
    let head: Vec<_> = iter.by_ref().take(3).collect::<Result<_, _>>().unwrap();
    assert_eq!(head.len(), 3);
    assert!(iter.steps() < 5, "steps={}", iter.steps());
}

#[test]
fn radius_limit_stops_the_profile() {
    let span = IntegrationSpan::arc_length(0.1).with_max_radius(1e-3);
    let profile = generate_profile(&sessile_water(), &span, &IntegratorConfig::default()).unwrap();
    let end = profile.last().unwrap();
    assert!((end.r - 1e-3).abs() < 1e-12, "r={}", end.r);
    assert!(profile.samples().iter().all(|s| s.r <= 1e-3 + 1e-15));
}
