#[cfg(feature = "python")]
use pyo3::exceptions::PyValueError;
#[cfg(feature = "python")]
use pyo3::PyErr;
use thiserror::Error;

/// Enum of the possible error variants that may be encountered while fitting a profile
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FittingError {
    /// Represents an elevation profile that cannot be fitted as given
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    /// Represents an initial parameter guess of the wrong length or with non-finite values
    #[error("Invalid initial guess: {0}")]
    InvalidGuess(String),

    /// The solver ran out of budget or settled on parameters that do not describe a transition
    #[error("Fit did not converge: {0}")]
    NotConverged(String),

    /// The data carries no step for the model to resolve, e.g. a flat profile
    #[error("Degenerate fit: {0}")]
    Degenerate(String),
}

#[cfg(feature = "python")]
impl From<FittingError> for PyErr {
    fn from(value: FittingError) -> Self {
        let msg = value.to_string();
        PyValueError::new_err(msg)
    }
}
