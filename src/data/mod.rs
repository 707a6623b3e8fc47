//! Boundary data sources.

pub mod synthetic;

pub use synthetic::*;
