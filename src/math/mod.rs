//! Mathematical utilities: apex series, least squares, curve geometry, grids.

pub mod geometry;
pub mod grid;
pub mod ols;
pub mod series;

pub use geometry::*;
pub use grid::*;
pub use ols::*;
pub use series::*;
