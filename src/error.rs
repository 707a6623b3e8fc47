use thiserror::Error;

/// Errors surfaced by the profile integrator and the shape fitter.
///
/// Each variant maps to a stable process exit code so a thin entry point can
/// forward failures without inspecting them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdsaError {
    /// The integrator could not advance within its tolerance or step budget,
    /// or the meridian left the sane region.
    #[error("Numerical divergence at s={arc_length:.6e}: {reason}")]
    NumericalDivergence { arc_length: f64, reason: String },

    /// A parameter vector violates the positivity constraints.
    #[error("Non-physical parameters: {reason}")]
    NonPhysicalGuess { reason: String },

    /// Not enough boundary points for the requested free parameters.
    #[error("Underdetermined fit: {points} boundary points, need at least {required}")]
    UnderdeterminedFit { points: usize, required: usize },

    /// Malformed tolerance, budget or environment setting.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AdsaError {
    pub fn divergence(arc_length: f64, reason: impl Into<String>) -> Self {
        AdsaError::NumericalDivergence {
            arc_length,
            reason: reason.into(),
        }
    }

    pub fn non_physical(reason: impl Into<String>) -> Self {
        AdsaError::NonPhysicalGuess {
            reason: reason.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AdsaError::InvalidConfig(_) => 2,
            AdsaError::UnderdeterminedFit { .. } => 3,
            AdsaError::NumericalDivergence { .. } | AdsaError::NonPhysicalGuess { .. } => 4,
        }
    }

    /// Whether the fitter may absorb this error as a penalty for one trial point.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AdsaError::NumericalDivergence { .. })
    }
}
