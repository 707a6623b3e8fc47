//! Shared drop fixtures for the integration tests.

#![allow(dead_code)]

use drop_shape::data::{sample_boundary, SyntheticConfig};
use drop_shape::{BoundaryPoint, IntegrationSpan, Orientation, PhysicalParameters};

/// Water on a plate, apex radius 2 mm.
pub fn sessile_water() -> PhysicalParameters {
    PhysicalParameters::new(0.072, 1000.0, 9.81, 500.0)
        .with_orientation(Orientation::Sessile)
        .with_apex(2e-3, -1e-3)
}

/// Water hanging from a needle, apex radius 1.25 mm.
pub fn pendant_water() -> PhysicalParameters {
    PhysicalParameters::new(0.072, 1000.0, 9.81, 800.0).with_apex(0.0, 5e-3)
}

pub fn boundary(
    params: &PhysicalParameters,
    max_angle: f64,
    config: &SyntheticConfig,
) -> Vec<BoundaryPoint> {
    let span = IntegrationSpan::arc_length(0.1).with_max_angle(max_angle);
    sample_boundary(params, &span, config).unwrap()
}

pub fn rel(a: f64, b: f64) -> f64 {
    ((a - b) / b).abs()
}
