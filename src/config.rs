//! Fit and seed configuration from the environment.
//!
//! `fit_config_from_env` loads `.env` (if present) and overlays the
//! `DROP_SHAPE_*` variables on top of [`FitConfig::default`]:
//!
//! | variable                          | field                          |
//! |-----------------------------------|--------------------------------|
//! | `DROP_SHAPE_MAX_ITERATIONS`       | `max_iterations`               |
//! | `DROP_SHAPE_OBJECTIVE_TOLERANCE`  | `objective_tolerance`          |
//! | `DROP_SHAPE_STEP_TOLERANCE`       | `step_tolerance`               |
//! | `DROP_SHAPE_PARALLEL`             | `parallel`                     |
//! | `DROP_SHAPE_FIX_TILT`             | `mask.tilt` (inverted)         |
//! | `DROP_SHAPE_FIX_APEX`             | `mask.apex_x/apex_y` (inverted)|
//! | `DROP_SHAPE_PROFILE_RESOLUTION`   | `profile_resolution`           |
//! | `DROP_SHAPE_MAX_TANGENT_ANGLE`    | `max_tangent_angle`            |
//! | `DROP_SHAPE_ABS_TOL`              | `integrator.abs_tol`           |
//! | `DROP_SHAPE_REL_TOL`              | `integrator.rel_tol`           |
//! | `DROP_SHAPE_MAX_STEPS`            | `integrator.max_steps`         |
//!
//! `seed_config_from_env` does the same for [`SeedConfig`]:
//!
//! | variable                          | field                          |
//! |-----------------------------------|--------------------------------|
//! | `DROP_SHAPE_PARALLEL`             | `parallel`                     |
//! | `DROP_SHAPE_BOND_MIN`             | `bond_min`                     |
//! | `DROP_SHAPE_BOND_MAX`             | `bond_max`                     |
//! | `DROP_SHAPE_BOND_STEPS`           | `bond_steps`                   |

use std::str::FromStr;

use crate::domain::{FitConfig, SeedConfig};
use crate::error::AdsaError;

const PREFIX: &str = "DROP_SHAPE_";

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, AdsaError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AdsaError::InvalidConfig(format!("{PREFIX}{key}={raw}: {e}")))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, AdsaError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AdsaError::InvalidConfig(format!(
            "{PREFIX}{key}={raw}: expected true/false"
        ))),
    }
}

/// Overlay variables supplied by `lookup`, which receives full variable names.
pub fn fit_config_from_lookup<F>(lookup: F) -> Result<FitConfig, AdsaError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = FitConfig::default();
    let get = |key: &str| lookup(&format!("{PREFIX}{key}"));

    if let Some(v) = get("MAX_ITERATIONS") {
        config.max_iterations = parse("MAX_ITERATIONS", &v)?;
    }
    if let Some(v) = get("OBJECTIVE_TOLERANCE") {
        config.objective_tolerance = parse("OBJECTIVE_TOLERANCE", &v)?;
    }
    if let Some(v) = get("STEP_TOLERANCE") {
        config.step_tolerance = parse("STEP_TOLERANCE", &v)?;
    }
    if let Some(v) = get("PARALLEL") {
        config.parallel = parse_flag("PARALLEL", &v)?;
    }
    if let Some(v) = get("FIX_TILT") {
        config.mask.tilt = !parse_flag("FIX_TILT", &v)?;
    }
    if let Some(v) = get("FIX_APEX") {
        let free = !parse_flag("FIX_APEX", &v)?;
        config.mask.apex_x = free;
        config.mask.apex_y = free;
    }
    if let Some(v) = get("PROFILE_RESOLUTION") {
        config.profile_resolution = parse("PROFILE_RESOLUTION", &v)?;
    }
    if let Some(v) = get("MAX_TANGENT_ANGLE") {
        config.max_tangent_angle = parse("MAX_TANGENT_ANGLE", &v)?;
    }
    if let Some(v) = get("ABS_TOL") {
        config.integrator.abs_tol = parse("ABS_TOL", &v)?;
    }
    if let Some(v) = get("REL_TOL") {
        config.integrator.rel_tol = parse("REL_TOL", &v)?;
    }
    if let Some(v) = get("MAX_STEPS") {
        config.integrator.max_steps = parse("MAX_STEPS", &v)?;
    }

    config.validate()?;
    Ok(config)
}

/// [`FitConfig`] from the process environment and `.env`.
pub fn fit_config_from_env() -> Result<FitConfig, AdsaError> {
    dotenvy::dotenv().ok();
    fit_config_from_lookup(|key| std::env::var(key).ok())
}

/// [`SeedConfig`] counterpart of [`fit_config_from_lookup`].
pub fn seed_config_from_lookup<F>(lookup: F) -> Result<SeedConfig, AdsaError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut seed = SeedConfig::default();
    let get = |key: &str| lookup(&format!("{PREFIX}{key}"));

    if let Some(v) = get("PARALLEL") {
        seed.parallel = parse_flag("PARALLEL", &v)?;
    }
    if let Some(v) = get("BOND_MIN") {
        seed.bond_min = parse("BOND_MIN", &v)?;
    }
    if let Some(v) = get("BOND_MAX") {
        seed.bond_max = parse("BOND_MAX", &v)?;
    }
    if let Some(v) = get("BOND_STEPS") {
        seed.bond_steps = parse("BOND_STEPS", &v)?;
    }

    seed.validate()?;
    Ok(seed)
}

/// [`SeedConfig`] from the process environment and `.env`.
pub fn seed_config_from_env() -> Result<SeedConfig, AdsaError> {
    dotenvy::dotenv().ok();
    seed_config_from_lookup(|key| std::env::var(key).ok())
}
