//! `drop-shape` library crate.
//!
//! Axisymmetric drop shape analysis:
//!
//! - [`profile`] integrates the Young-Laplace meridian from the apex outward
//! - [`fit`] recovers surface tension, apex curvature, tilt and apex position
//!   from observed boundary points
//!
//! Image processing, units and presentation are left to the caller.

pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod math;
pub mod models;
pub mod profile;
pub mod report;

pub use domain::*;
pub use error::AdsaError;
pub use fit::{
    estimate_initial_guess, fit_shape, fit_shape_with_observer, solve_apex_for_height,
    solve_apex_for_volume,
};
pub use profile::{generate_profile, integrate_profile, Profile, ProfileIter};
