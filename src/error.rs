use crate::fitting::common::error::FittingError;
use crate::utils::buoyancy::BuoyancyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlineError {
    /// Represents a profile that could not be fitted
    #[error("{0}")]
    Fitting(#[from] FittingError),

    /// Unable to derive buoyancy fields
    #[error("{0}")]
    Buoyancy(#[from] BuoyancyError),

    /// Unable to read or write a flight-line file
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Malformed flight-line JSON
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(feature = "python")]
impl From<GlineError> for pyo3::PyErr {
    fn from(value: GlineError) -> Self {
        pyo3::exceptions::PyValueError::new_err(value.to_string())
    }
}
