//! Domain types used throughout the solver.
//!
//! This module defines:
//!
//! - physical inputs (`PhysicalParameters`, `Orientation`, `BoundaryPoint`)
//! - integrator and fitter settings (`IntegrationSpan`, `IntegratorConfig`, `FitConfig`)
//! - fit outputs (`FitResult`, `FitQuality`, `DropMetrics`, etc.)

pub mod types;

pub use types::*;
