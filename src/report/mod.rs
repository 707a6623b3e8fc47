//! Reporting utilities: per-point residuals and rankings.

pub mod format;

pub use format::*;

use crate::domain::FitResult;

/// One observed point's distance to the fitted meridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointResidual {
    pub point_index: usize,
    pub residual: f64,
    /// Arc length of the corresponding meridian point, when recorded.
    pub s: Option<f64>,
    pub phi: Option<f64>,
}

/// Residuals for each point, joined with the correspondence when available.
pub fn point_residuals(fit: &FitResult) -> Vec<PointResidual> {
    fit.residuals
        .iter()
        .enumerate()
        .map(|(i, &residual)| {
            let hit = fit.correspondence.as_ref().and_then(|c| c.get(i));
            PointResidual {
                point_index: i,
                residual,
                s: hit.map(|c| c.s),
                phi: hit.map(|c| c.phi),
            }
        })
        .collect()
}

/// The `top_n` points farthest from the fitted meridian, worst first.
pub fn rank_worst_points(fit: &FitResult, top_n: usize) -> Vec<PointResidual> {
    let mut sorted = point_residuals(fit);
    sorted.sort_by(|a, b| {
        b.residual
            .abs()
            .total_cmp(&a.residual.abs())
            .then(a.point_index.cmp(&b.point_index))
    });
    sorted.truncate(top_n);
    sorted
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_points_by_absolute_residual() {
        let fit = fixtures::fit_result();
        let worst = rank_worst_points(&fit, 2);
        assert_eq!(worst.len(), 2);
        assert_eq!(worst[0].point_index, 1);
        assert_eq!(worst[1].point_index, 2);
        assert_eq!(worst[0].phi, Some(0.5));
    }

    #[test]
    fn residuals_without_correspondence() {
        let mut fit = fixtures::fit_result();
        fit.correspondence = None;
        let rows = point_residuals(&fit);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.s.is_none()));
    }
}
