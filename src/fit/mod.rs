//! Shape fitting.
//!
//! Responsibilities:
//!
//! - a generic Levenberg-Marquardt engine with finite-difference Jacobians
//! - the point-to-meridian residual with divergence penalties
//! - the fitter entry points, the initial-guess estimate and targeted apex solves

pub mod fitter;
pub mod jacobian;
pub mod lm;
pub mod residuals;
pub mod seed;
pub mod target;

pub use fitter::*;
pub use jacobian::*;
pub use lm::*;
pub use residuals::*;
pub use seed::*;
pub use target::*;
