//! Grounding-line candidate extraction for whole flight lines
use crate::fitting::common::error::FittingError;
use crate::fitting::common::fitstruct::{
    DerivativeTriple, ElevationProfile, FitParameters, GroundingCandidate,
};
use crate::fitting::scurve::fitting::{fit_s_curve, rms_residual, FitConfig};
use crate::fitting::scurve::model::derivatives;
use log::{debug, warn};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, FittingError>;

/// One radar flight segment, as handed over by the frame loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightLine {
    pub id: String,
    #[serde(flatten)]
    pub profile: ElevationProfile,
    /// Solver starting point; estimated from the profile when absent
    #[serde(default)]
    pub initial_guess: Option<Vec<f64>>,
}

/// Everything derived from fitting one flight line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightLineFit {
    pub id: String,
    pub params: FitParameters,
    pub rms_residual: f64,
    pub candidate: GroundingCandidate,
    pub derivatives: DerivativeTriple,
}

/// Steepest sample of the fitted curve
pub fn grounding_candidate(
    profile: &ElevationProfile,
    triple: &DerivativeTriple,
) -> Option<GroundingCandidate> {
    let index = triple.peak_index()?;
    Some(GroundingCandidate {
        index,
        distance: *profile.distance.get(index)?,
        gradient: triple.first[index],
    })
}

/// Fits a single `FlightLine`.
///
/// # Errors
/// Will return `Err` if the profile or guess is malformed, or if the profile cannot be fitted
/// with the S-curve model.
pub fn fit_flight_line(line: &FlightLine, config: &FitConfig) -> Result<FlightLineFit> {
    let guess = match &line.initial_guess {
        Some(guess) => guess.clone(),
        None => FitParameters::estimate(&line.profile)?.to_array().to_vec(),
    };
    let params = fit_s_curve(&line.profile, &guess, config)?;
    let derivatives = derivatives(&line.profile, &params);
    let candidate = grounding_candidate(&line.profile, &derivatives).ok_or_else(|| {
        FittingError::InvalidProfile(format!("Flight line {} has no samples", line.id))
    })?;
    debug!(
        "flight line {}; candidate at {:.3} (sample {})",
        line.id, candidate.distance, candidate.index
    );

    Ok(FlightLineFit {
        id: line.id.clone(),
        rms_residual: rms_residual(&line.profile, &params),
        params,
        candidate,
        derivatives,
    })
}

fn log_failure(line: &FlightLine, result: &Result<FlightLineFit>) {
    if let Err(e) = result {
        warn!("skipping flight line {}: {e}", line.id);
    }
}

/// Fits a collection of `FlightLine`s, one result per line in input order.
pub fn fit_flight_lines(lines: &[FlightLine], config: &FitConfig) -> Vec<Result<FlightLineFit>> {
    lines
        .iter()
        .map(|line| {
            let result = fit_flight_line(line, config);
            log_failure(line, &result);
            result
        })
        .collect()
}

/// Fits a collection of `FlightLine`s in parallel, one result per line in input order.
pub fn par_fit_flight_lines(
    lines: &[FlightLine],
    config: &FitConfig,
) -> Vec<Result<FlightLineFit>> {
    lines
        .par_iter()
        .map(|line| {
            let result = fit_flight_line(line, config);
            log_failure(line, &result);
            result
        })
        .collect()
}
