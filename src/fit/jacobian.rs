//! Finite-difference Jacobian of a [`LeastSquaresProblem`].
//!
//! Columns are independent pure evaluations, so they run on the rayon pool when
//! `parallel` is set. Collection preserves column order, which keeps the serial
//! and parallel results bit-identical.

use log::warn;
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::fit::lm::LeastSquaresProblem;

fn column<P: LeastSquaresProblem>(
    problem: &P,
    x: &[f64],
    j: usize,
    rel_step: f64,
) -> Option<Vec<f64>> {
    let h = rel_step * x[j].abs().max(1.0);
    let mut plus = x.to_vec();
    plus[j] += h;
    let mut minus = x.to_vec();
    minus[j] -= h;

    let col: Vec<f64> = match (problem.is_admissible(&plus), problem.is_admissible(&minus)) {
        (true, true) => {
            let rp = problem.residuals(&plus);
            let rm = problem.residuals(&minus);
            rp.iter().zip(&rm).map(|(a, b)| (a - b) / (2.0 * h)).collect()
        }
        // One-sided near the boundary of the admissible domain.
        (true, false) => {
            let rp = problem.residuals(&plus);
            let r0 = problem.residuals(x);
            rp.iter().zip(&r0).map(|(a, b)| (a - b) / h).collect()
        }
        (false, true) => {
            let rm = problem.residuals(&minus);
            let r0 = problem.residuals(x);
            r0.iter().zip(&rm).map(|(a, b)| (a - b) / h).collect()
        }
        (false, false) => return None,
    };

    col.iter().all(|v| v.is_finite()).then_some(col)
}

/// Central-difference Jacobian `∂rᵢ/∂xⱼ` at `x`.
///
/// A column that cannot be formed is left at zero, which the damped solve
/// treats as a parameter with no influence for this iteration.
pub fn finite_difference_jacobian<P: LeastSquaresProblem>(
    problem: &P,
    x: &[f64],
    rel_step: f64,
    parallel: bool,
) -> DMatrix<f64> {
    let m = x.len();
    let columns: Vec<Option<Vec<f64>>> = if parallel {
        (0..m).into_par_iter().map(|j| column(problem, x, j, rel_step)).collect()
    } else {
        (0..m).map(|j| column(problem, x, j, rel_step)).collect()
    };

    let n = columns.iter().flatten().map(|c| c.len()).next().unwrap_or(0);
    let mut jac = DMatrix::<f64>::zeros(n, m);
    for (j, col) in columns.into_iter().enumerate() {
        match col {
            Some(col) if col.len() == n => jac.set_column(j, &nalgebra::DVector::from_vec(col)),
            _ => warn!("jacobian column {j} could not be formed; treating it as zero"),
        }
    }
    jac
}
