use crate::fitting::common::error::FittingError;
use crate::fitting::scurve::model::s_curve;
use crate::utils::constants::{EDGE_TRANSITION_WIDTHS, PLATEAU_FRACTION};
use is_close::is_close;
use serde::{Deserialize, Serialize};

/// Number of free parameters in the S-curve model
pub const NUM_PARAMS: usize = 4;

/// Elevation samples along a single radar flight segment.
///
/// `distance` is the along-track coordinate of each sample and is the independent variable of the
/// model; `elevation` holds the observed bed or surface elevation at that coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationProfile {
    pub distance: Vec<f64>,
    pub elevation: Vec<f64>,
}

impl ElevationProfile {
    /// Builds a profile, rejecting empty, mismatched or non-finite inputs.
    pub fn new(distance: Vec<f64>, elevation: Vec<f64>) -> Result<ElevationProfile, FittingError> {
        let profile = ElevationProfile {
            distance,
            elevation,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Checks that the profile can be handed to the solver.
    ///
    /// Profiles deserialized from disk skip `new`, so the fitter calls this again before fitting.
    pub fn validate(&self) -> Result<(), FittingError> {
        if self.elevation.is_empty() {
            return Err(FittingError::InvalidProfile(
                "Profile has no samples".to_string(),
            ));
        }
        if self.distance.len() != self.elevation.len() {
            return Err(FittingError::InvalidProfile(format!(
                "{} distances given for {} elevations",
                self.distance.len(),
                self.elevation.len()
            )));
        }
        if self.elevation.len() < NUM_PARAMS {
            return Err(FittingError::InvalidProfile(format!(
                "At least {NUM_PARAMS} samples are needed, found {}",
                self.elevation.len()
            )));
        }
        if let Some(i) = self.distance.iter().position(|x| !x.is_finite()) {
            return Err(FittingError::InvalidProfile(format!(
                "Non-finite distance at sample {i}"
            )));
        }
        if let Some(i) = self.elevation.iter().position(|x| !x.is_finite()) {
            return Err(FittingError::InvalidProfile(format!(
                "Non-finite elevation at sample {i}"
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.elevation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elevation.is_empty()
    }

    /// (min, max) of the along-track distance
    pub fn distance_bounds(&self) -> (f64, f64) {
        bounds(&self.distance)
    }

    /// (min, max) of the elevation samples
    pub fn elevation_bounds(&self) -> (f64, f64) {
        bounds(&self.elevation)
    }

    /// True when every elevation sample is the same height, leaving nothing to fit.
    pub fn is_flat(&self) -> bool {
        let (low, high) = self.elevation_bounds();
        is_close!(low, high)
    }
}

fn bounds(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        })
}

/// Parameters of `f(e) = amplitude * erf(slope * (e - center)) + offset`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitParameters {
    /// Half the height of the step; its sign gives the step direction
    pub amplitude: f64,
    /// Steepness of the transition
    pub slope: f64,
    /// Along-track position of the transition
    pub center: f64,
    /// Height midway between the two plateaus
    pub offset: f64,
}

impl FitParameters {
    pub fn new(amplitude: f64, slope: f64, center: f64, offset: f64) -> FitParameters {
        FitParameters {
            amplitude,
            slope,
            center,
            offset,
        }
    }

    /// Reads parameters in (amplitude, slope, center, offset) order.
    pub fn from_slice(values: &[f64]) -> Result<FitParameters, FittingError> {
        if values.len() != NUM_PARAMS {
            return Err(FittingError::InvalidGuess(format!(
                "Expected {NUM_PARAMS} parameters, found {}",
                values.len()
            )));
        }
        if values.iter().any(|x| !x.is_finite()) {
            return Err(FittingError::InvalidGuess(format!(
                "Parameters must be finite, found {values:?}"
            )));
        }
        Ok(FitParameters::new(values[0], values[1], values[2], values[3]))
    }

    pub fn to_array(&self) -> [f64; NUM_PARAMS] {
        [self.amplitude, self.slope, self.center, self.offset]
    }

    /// Rewrites the parameters so that `slope >= 0`.
    ///
    /// erf is odd, so negating both amplitude and slope leaves the curve unchanged.
    pub fn canonical(self) -> FitParameters {
        if self.slope < 0.0 {
            FitParameters {
                amplitude: -self.amplitude,
                slope: -self.slope,
                ..self
            }
        } else {
            self
        }
    }

    /// Evaluates the model at along-track distance `e`.
    pub fn evaluate(&self, e: f64) -> f64 {
        s_curve(&self.to_array(), e)
    }

    /// Heights of the (lower-distance, upper-distance) plateaus
    pub fn plateaus(&self) -> (f64, f64) {
        let step = self.amplitude * self.slope.signum();
        (self.offset - step, self.offset + step)
    }

    /// Derives a starting point for the solver from the shape of the profile.
    ///
    /// The plateaus are the mean elevations at each end of the profile, the center is the sample
    /// closest to halfway between them, and the slope puts each end of the profile two transition
    /// widths away from the center.
    pub fn estimate(profile: &ElevationProfile) -> Result<FitParameters, FittingError> {
        profile.validate()?;
        let n = profile.len();
        let edge = ((n as f64 * PLATEAU_FRACTION).ceil() as usize).clamp(1, n / 2);
        let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
        let start = mean(&profile.elevation[..edge]);
        let end = mean(&profile.elevation[n - edge..]);

        let offset = (start + end) / 2.0;
        let amplitude = (end - start) / 2.0;
        let center = profile
            .elevation
            .iter()
            .zip(profile.distance.iter())
            .min_by(|(a, _), (b, _)| (*a - offset).abs().total_cmp(&(*b - offset).abs()))
            .map(|(_, &d)| d)
            .ok_or_else(|| FittingError::InvalidProfile("Profile has no samples".to_string()))?;

        let (d_min, d_max) = profile.distance_bounds();
        let span = d_max - d_min;
        if span <= 0.0 {
            return Err(FittingError::Degenerate(
                "All samples share one along-track position".to_string(),
            ));
        }
        let slope = 2.0 * EDGE_TRANSITION_WIDTHS / span;

        Ok(FitParameters::new(amplitude, slope, center, offset))
    }
}

/// First, second and third derivatives of the fitted model, one value per profile sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivativeTriple {
    pub first: Vec<f64>,
    pub second: Vec<f64>,
    pub third: Vec<f64>,
}

impl DerivativeTriple {
    pub fn len(&self) -> usize {
        self.first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
    }

    /// Index of the steepest point of the fitted curve, i.e. the largest first derivative in
    /// magnitude. Ties go to the earliest sample.
    pub fn peak_index(&self) -> Option<usize> {
        self.first
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, &x)| match best {
                Some((_, b)) if x.abs() <= b => best,
                _ => Some((i, x.abs())),
            })
            .map(|(i, _)| i)
    }
}

/// Sample at which the fitted surface or bed is steepest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundingCandidate {
    pub index: usize,
    pub distance: f64,
    pub gradient: f64,
}
