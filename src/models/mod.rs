//! Young-Laplace model of the droplet meridian.
//!
//! The model is a small, pure function of the physical parameters so that the
//! integrator and the fitter can stay generic.

pub mod young_laplace;

pub use young_laplace::*;
