//! Dense least-squares solves.
//!
//! Two shapes of problem show up in this crate:
//!
//! ```text
//! minimize ‖X β − y‖²                     (circle fit for the initial guess)
//! (JᵀJ + λ·D) δ = −Jᵀr                     (Levenberg-Marquardt step)
//! ```
//!
//! Implementation choices:
//! - Tall systems go through SVD so rank-deficient designs still return a
//!   minimum-norm answer instead of panicking.
//! - The damped normal equations are symmetric positive definite for λ > 0, so
//!   Cholesky is tried first and SVD is the fallback.
//! - `D` is the diagonal of `JᵀJ` floored away from zero (Marquardt scaling),
//!   which makes the step invariant to parameter units.

use nalgebra::{DMatrix, DVector};

/// Floor for the Marquardt scaling diagonal, relative to its largest entry.
const DIAG_FLOOR_REL: f64 = 1e-12;

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve `(JᵀJ + λ·D) δ = −Jᵀr` for the damped Gauss-Newton step.
pub fn solve_damped_step(
    jtj: &DMatrix<f64>,
    jtr: &DVector<f64>,
    lambda: f64,
) -> Option<DVector<f64>> {
    let m = jtj.nrows();
    if m == 0 || jtj.ncols() != m || jtr.len() != m {
        return None;
    }

    let diag_max = (0..m).map(|i| jtj[(i, i)].abs()).fold(0.0, f64::max);
    let floor = (diag_max * DIAG_FLOOR_REL).max(f64::MIN_POSITIVE);

    let mut a = jtj.clone();
    for i in 0..m {
        a[(i, i)] += lambda * jtj[(i, i)].abs().max(floor);
    }
    let rhs = -jtr.clone();

    if let Some(chol) = a.clone().cholesky() {
        let step = chol.solve(&rhs);
        if step.iter().all(|v| v.is_finite()) {
            return Some(step);
        }
    }

    solve_least_squares(&a, &rhs)
}
