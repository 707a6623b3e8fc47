//! Meridian generation and the quantities derived from it.

pub mod analysis;
pub mod integrator;

pub use analysis::*;
pub use integrator::*;
