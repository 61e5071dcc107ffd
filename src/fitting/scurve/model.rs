//! The error-function step model and its closed-form derivatives.
use crate::fitting::common::error::FittingError;
use crate::fitting::common::fitstruct::{DerivativeTriple, ElevationProfile, FitParameters, NUM_PARAMS};
use std::f64::consts::FRAC_2_SQRT_PI;

/// A model that the Levenberg-Marquardt driver can fit to an elevation profile.
pub trait CurveModel {
    /// Number of free parameters the model takes
    fn num_params(&self) -> usize;

    /// Value of the model at along-track distance `e`
    fn value(&self, params: &[f64], e: f64) -> f64;
}

/// `f(e) = amp * erf(b * (e - x0)) + v_off`, parameters ordered (amp, b, x0, v_off)
#[derive(Debug, Default, Clone, Copy)]
pub struct ErfModel;

impl CurveModel for ErfModel {
    fn num_params(&self) -> usize {
        NUM_PARAMS
    }

    fn value(&self, params: &[f64], e: f64) -> f64 {
        s_curve(params, e)
    }
}

pub(crate) fn s_curve(params: &[f64], e: f64) -> f64 {
    params[0] * libm::erf(params[1] * (e - params[2])) + params[3]
}

/// Closed-form first, second and third derivatives of the fitted S-curve at every sample of
/// `profile`.
///
/// With `u = b * (e - x0)`:
///
/// * `f'   = (2 amp b / sqrt(pi)) exp(-u^2)`
/// * `f''  = -(4 amp b^2 / sqrt(pi)) u exp(-u^2)`
/// * `f''' = (4 amp b^3 / sqrt(pi)) (2u^2 - 1) exp(-u^2)`
pub fn derivatives(profile: &ElevationProfile, params: &FitParameters) -> DerivativeTriple {
    let FitParameters {
        amplitude: amp,
        slope: b,
        center: x0,
        ..
    } = *params;

    // FRAC_2_SQRT_PI is 2/sqrt(pi)
    let c1 = amp * b * FRAC_2_SQRT_PI;
    let c2 = -2.0 * amp * b * b * FRAC_2_SQRT_PI;
    let c3 = 2.0 * amp * b * b * b * FRAC_2_SQRT_PI;

    let n = profile.len();
    let mut triple = DerivativeTriple {
        first: Vec::with_capacity(n),
        second: Vec::with_capacity(n),
        third: Vec::with_capacity(n),
    };
    for &e in &profile.distance {
        let u = b * (e - x0);
        let gaussian = (-u * u).exp();
        triple.first.push(c1 * gaussian);
        triple.second.push(c2 * u * gaussian);
        triple.third.push(c3 * (2.0 * u * u - 1.0) * gaussian);
    }
    triple
}

/// Derivatives at arbitrary along-track distances, for parameters that did not come from a fit.
///
/// # Errors
/// `InvalidProfile` for non-finite distances, `InvalidGuess` for a parameter slice that is not
/// four finite values.
pub fn derivatives_at(distance: &[f64], params: &[f64]) -> Result<DerivativeTriple, FittingError> {
    if let Some(i) = distance.iter().position(|x| !x.is_finite()) {
        return Err(FittingError::InvalidProfile(format!(
            "Non-finite distance at sample {i}"
        )));
    }
    let params = FitParameters::from_slice(params)?;
    let profile = ElevationProfile {
        distance: distance.to_vec(),
        elevation: vec![0.0; distance.len()],
    };
    Ok(derivatives(&profile, &params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symmetric_profile() -> ElevationProfile {
        let distance: Vec<f64> = (-50..=50).map(|i| i as f64).collect();
        let elevation = vec![0.0; distance.len()];
        ElevationProfile { distance, elevation }
    }

    #[test]
    fn model_plateaus() {
        let params = [50.0, 0.05, 0.0, 200.0];
        assert!((s_curve(&params, 0.0) - 200.0).abs() < 1e-12);
        assert!((s_curve(&params, 1e4) - 250.0).abs() < 1e-9);
        assert!((s_curve(&params, -1e4) - 150.0).abs() < 1e-9);
        assert_eq!(ErfModel.value(&params, 0.0), s_curve(&params, 0.0));
    }

    #[test]
    fn derivative_lengths_match_profile() {
        let profile = symmetric_profile();
        let triple = derivatives(&profile, &FitParameters::new(3.0, 0.1, 0.0, 1.0));
        assert_eq!(triple.first.len(), profile.len());
        assert_eq!(triple.second.len(), profile.len());
        assert_eq!(triple.third.len(), profile.len());
    }

    #[test]
    fn first_derivative_peaks_at_center() {
        let profile = symmetric_profile();
        let params = FitParameters::new(50.0, 0.08, 7.0, 200.0);
        let triple = derivatives(&profile, &params);
        assert!(triple.first.iter().all(|&x| x >= 0.0));
        let peak = triple.peak_index().unwrap();
        assert_eq!(profile.distance[peak], 7.0);
        assert!((triple.first[peak] - 50.0 * 0.08 * FRAC_2_SQRT_PI).abs() < 1e-12);
    }

    #[test]
    fn second_derivative_is_antisymmetric() {
        let profile = symmetric_profile();
        let params = FitParameters::new(50.0, 0.05, 0.0, 200.0);
        let triple = derivatives(&profile, &params);
        let mid = profile.len() / 2;
        assert_eq!(profile.distance[mid], 0.0);
        assert_eq!(triple.second[mid], 0.0);
        for d in 1..=mid {
            assert!((triple.second[mid + d] + triple.second[mid - d]).abs() < 1e-12);
        }
    }

    #[test]
    fn third_derivative_at_center() {
        let profile = symmetric_profile();
        let params = FitParameters::new(2.0, 0.5, 0.0, 0.0);
        let triple = derivatives(&profile, &params);
        let mid = profile.len() / 2;
        let expected = -4.0 * 2.0 * 0.125 / std::f64::consts::PI.sqrt();
        assert!((triple.third[mid] - expected).abs() < 1e-12);
    }

    #[test]
    fn derivatives_at_validates_input() {
        assert!(matches!(
            derivatives_at(&[0.0, f64::NAN], &[1.0, 1.0, 0.0, 0.0]),
            Err(FittingError::InvalidProfile(_))
        ));
        assert!(matches!(
            derivatives_at(&[0.0, 1.0], &[1.0, f64::NAN, 0.0, 0.0]),
            Err(FittingError::InvalidGuess(_))
        ));
        assert!(matches!(
            derivatives_at(&[0.0, 1.0], &[1.0, 1.0, 0.0]),
            Err(FittingError::InvalidGuess(_))
        ));
        let triple = derivatives_at(&[-1.0, 0.0, 1.0], &[2.0, 0.5, 0.0, 7.0]).unwrap();
        assert_eq!(triple.len(), 3);
        assert_eq!(triple.peak_index(), Some(1));
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let params = FitParameters::new(30.0, 0.2, 1.5, 10.0);
        let h = 1e-4;
        let profile = ElevationProfile {
            distance: vec![-2.0, 0.5, 1.5, 3.0],
            elevation: vec![0.0; 4],
        };
        let triple = derivatives(&profile, &params);
        for (i, &e) in profile.distance.iter().enumerate() {
            let numeric = (params.evaluate(e + h) - params.evaluate(e - h)) / (2.0 * h);
            assert!((triple.first[i] - numeric).abs() < 1e-5);
        }
    }
}
