//! Apex series expansion of the dimensionless Young-Laplace system.
//!
//! With lengths scaled by the apex radius (`S = b·s`, `X = b·r`, `Z = b·z`)
//! the meridian obeys:
//!
//! - `dX/dS = cos φ`
//! - `dZ/dS = sin φ`
//! - `dφ/dS = 2 + k·Z − sin φ / X`
//!
//! where `k = ±β` carries the Bond number and the orientation sign.
//!
//! Numerical notes:
//! - `sin φ / X` is `0/0` at the apex; its limit equals `dφ/dS`, which gives
//!   `dφ/dS = 1` at `S = 0`.
//! - Near the apex the solution is odd in `S` for `X, φ` and even for `Z`:
//!   `φ = S + k·S³/8`, `X = S − S³/6 + (1 − 3k)·S⁵/120`,
//!   `Z = S²/2 + (3k − 4)·S⁴/96`.
//! - The step is shrunk with `√|k|` because `1/√|k|` is the capillary length in
//!   apex-radius units.

/// Series step length for `|k| ≤ 1`.
const SERIES_STEP: f64 = 1e-3;

/// Dimensionless arc length covered by the series bootstrap.
pub fn apex_series_step(k: f64) -> f64 {
    SERIES_STEP / k.abs().sqrt().max(1.0)
}

/// Dimensionless state `[X, Z, φ]` at arc length `s` near the apex.
pub fn apex_series(s: f64, k: f64) -> [f64; 3] {
    let s2 = s * s;
    let s3 = s2 * s;
    let x = s - s3 / 6.0 + (1.0 - 3.0 * k) * s3 * s2 / 120.0;
    let z = s2 / 2.0 + (3.0 * k - 4.0) * s2 * s2 / 96.0;
    let phi = s + k * s3 / 8.0;
    [x, z, phi]
}
