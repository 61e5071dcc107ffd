use crate::fitting::common::error::FittingError;
use crate::fitting::common::fitstruct::{ElevationProfile, FitParameters};
use crate::fitting::scurve::model::{CurveModel, ErfModel};
use itertools::enumerate;
use log::debug;
use rmpfit::{MPConfig, MPFitter, MPPar, MPResult, MPSuccess};
use serde::{Deserialize, Serialize};

/// Solver settings for a single profile fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    /// Relative tolerance on the sum of squares
    pub ftol: f64,
    /// Relative tolerance on the parameters
    pub xtol: f64,
    /// Orthogonality tolerance between residuals and jacobian columns
    pub gtol: f64,
    /// Maximum number of solver iterations
    pub max_iter: usize,
    /// Maximum number of model evaluations, 0 for no limit
    pub max_fev: usize,
    /// A fitted step smaller than this fraction of the profile's elevation range is degenerate
    pub min_relative_amplitude: f64,
    /// Smallest accepted `slope * profile length`; below it the fitted curve is nearly a line
    pub min_transition_span: f64,
    /// A fit whose RMS residual exceeds this fraction of the elevation range has not converged
    pub max_relative_rms: f64,
    /// Smallest fraction of the profile's variance the fit must explain
    pub min_explained_variance: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        FitConfig {
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-10,
            max_iter: 200,
            max_fev: 0,
            min_relative_amplitude: 1e-3,
            min_transition_span: 1.0,
            max_relative_rms: 0.05,
            min_explained_variance: 0.5,
        }
    }
}

/// Fits the erf S-curve to `profile`, starting from `initial_guess`.
///
/// The guess is ordered (amplitude, slope, center, offset). The returned parameters are in
/// canonical form, i.e. with a non-negative slope.
///
/// # Errors
/// `InvalidProfile` or `InvalidGuess` for malformed input, `Degenerate` when the profile (or the
/// fit) has no step to resolve, and `NotConverged` when the solver gives up, leaves a large
/// residual, or lands on a transition outside the sampled distances.
pub fn fit_s_curve(
    profile: &ElevationProfile,
    initial_guess: &[f64],
    config: &FitConfig,
) -> Result<FitParameters, FittingError> {
    let guess = FitParameters::from_slice(initial_guess)?;
    fit_model(ErfModel, profile, guess, config)
}

/// Fits a step model taking the (amplitude, slope, center, offset) layout of `FitParameters`.
pub fn fit_model<M: CurveModel>(
    model: M,
    profile: &ElevationProfile,
    guess: FitParameters,
    config: &FitConfig,
) -> Result<FitParameters, FittingError> {
    profile.validate()?;
    if profile.is_flat() {
        return Err(FittingError::Degenerate(
            "Profile is flat, there is no transition to fit".to_string(),
        ));
    }

    let mut params = guess.to_array().to_vec();

    let mut problem = LevMarProblem::new(model, &profile.distance, &profile.elevation, config);
    let result = problem
        .mpfit(&mut params)
        .map_err(|e| FittingError::NotConverged(format!("Error with MPFit: {e}")))?;

    if matches!(result.success, MPSuccess::MaxIter) {
        return Err(FittingError::NotConverged(format!(
            "Reached the limit of {} iterations",
            config.max_iter
        )));
    }
    if params.iter().any(|x| !x.is_finite()) {
        return Err(FittingError::NotConverged(format!(
            "Solver produced non-finite parameters {params:?}"
        )));
    }

    let fit = FitParameters::from_slice(&params)?.canonical();
    debug!(
        "s-curve fit; samples: {}, chi_squared: {:.6e}, params: {:?}",
        profile.len(),
        result.best_norm,
        fit
    );
    check_fit(profile, &fit, config)?;
    Ok(fit)
}

/// Rejects fits that converged numerically but do not describe a step inside the profile.
fn check_fit(
    profile: &ElevationProfile,
    fit: &FitParameters,
    config: &FitConfig,
) -> Result<(), FittingError> {
    let (e_low, e_high) = profile.elevation_bounds();
    let (d_low, d_high) = profile.distance_bounds();
    let e_range = e_high - e_low;

    let rms = rms_residual(profile, fit);
    if rms > config.max_relative_rms * e_range {
        return Err(FittingError::NotConverged(format!(
            "RMS residual {rms:.3e} is too large for an elevation range of {e_range:.3e}"
        )));
    }
    let explained = explained_variance(profile, fit);
    if explained < config.min_explained_variance {
        return Err(FittingError::Degenerate(format!(
            "Fit explains {:.1}% of the profile variance",
            100.0 * explained
        )));
    }
    if 2.0 * fit.amplitude.abs() < config.min_relative_amplitude * e_range {
        return Err(FittingError::Degenerate(format!(
            "Fitted step of {:.3e} is negligible against an elevation range of {e_range:.3e}",
            2.0 * fit.amplitude.abs(),
        )));
    }
    if fit.slope * (d_high - d_low) < config.min_transition_span {
        return Err(FittingError::Degenerate(format!(
            "Fitted slope {:.3e} is too shallow to resolve a transition over the profile",
            fit.slope
        )));
    }
    if fit.center < d_low || fit.center > d_high {
        return Err(FittingError::NotConverged(format!(
            "Transition center {:.3} lies outside the profile [{d_low:.3}, {d_high:.3}]",
            fit.center
        )));
    }
    Ok(())
}

fn sum_squared_residuals(profile: &ElevationProfile, params: &FitParameters) -> f64 {
    profile
        .distance
        .iter()
        .zip(profile.elevation.iter())
        .map(|(&e, &y)| {
            let r = y - params.evaluate(e);
            r * r
        })
        .sum()
}

/// Coefficient of determination, 1 - SSE / SST. A flat profile explains nothing.
pub fn explained_variance(profile: &ElevationProfile, params: &FitParameters) -> f64 {
    let mean = profile.elevation.iter().sum::<f64>() / profile.len() as f64;
    let total: f64 = profile.elevation.iter().map(|y| (y - mean) * (y - mean)).sum();
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - sum_squared_residuals(profile, params) / total
}

/// Root-mean-square residual of `params` against the profile
pub fn rms_residual(profile: &ElevationProfile, params: &FitParameters) -> f64 {
    (sum_squared_residuals(profile, params) / profile.len() as f64).sqrt()
}

/// Levenberg-Marquardt solver using the rmpfit crate
pub(crate) struct LevMarProblem<'a, M: CurveModel> {
    /// The curve being fitted
    model: M,

    /// Along-track distance of each sample
    x: &'a [f64],

    /// Observed elevation of each sample
    y: &'a [f64],

    /// Solver tolerances and budgets
    config: FitConfig,

    /// The parameters are unconstrained
    params: Vec<MPPar>,
}

impl<'a, M: CurveModel> LevMarProblem<'a, M> {
    pub fn new(model: M, x: &'a [f64], y: &'a [f64], config: &FitConfig) -> LevMarProblem<'a, M> {
        let params = (0..model.num_params()).map(|_| MPPar::default()).collect();
        LevMarProblem {
            model,
            x,
            y,
            config: *config,
            params,
        }
    }
}

impl<M: CurveModel> MPFitter for LevMarProblem<'_, M> {
    fn eval(&mut self, params: &[f64], deviates: &mut [f64]) -> MPResult<()> {
        for (i, dev) in enumerate(deviates.iter_mut()) {
            *dev = self.y[i] - self.model.value(params, self.x[i]);
        }
        Ok(())
    }

    fn number_of_points(&self) -> usize {
        self.x.len()
    }

    fn config(&self) -> MPConfig {
        MPConfig {
            ftol: self.config.ftol,
            xtol: self.config.xtol,
            gtol: self.config.gtol,
            max_iter: self.config.max_iter,
            max_fev: self.config.max_fev,
            no_finite_check: false,
            ..Default::default()
        }
    }

    fn parameters(&self) -> Option<&[MPPar]> {
        Some(&*self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(params: &FitParameters, n: usize, low: f64, high: f64) -> ElevationProfile {
        let step = (high - low) / (n - 1) as f64;
        let distance: Vec<f64> = (0..n).map(|i| low + i as f64 * step).collect();
        let elevation = distance.iter().map(|&e| params.evaluate(e)).collect();
        ElevationProfile::new(distance, elevation).unwrap()
    }

    fn assert_rel(actual: f64, expected: f64, tol: f64) {
        assert!(
            ((actual - expected) / expected).abs() < tol,
            "{actual} not within {tol} of {expected}"
        );
    }

    #[test]
    fn recovers_parameters() {
        let truth = FitParameters::new(-35.0, 0.02, 140.0, 820.0);
        let profile = synthetic(&truth, 400, 0.0, 400.0);
        let fit = fit_s_curve(&profile, &[-20.0, 0.03, 120.0, 800.0], &FitConfig::default())
            .unwrap();
        assert_rel(fit.amplitude, truth.amplitude, 1e-4);
        assert_rel(fit.slope, truth.slope, 1e-4);
        assert_rel(fit.center, truth.center, 1e-4);
        assert_rel(fit.offset, truth.offset, 1e-4);
        assert!(rms_residual(&profile, &fit) < 1e-4);
    }

    #[test]
    fn negative_slope_guess_is_canonicalized() {
        let truth = FitParameters::new(50.0, 0.05, 0.0, 200.0);
        let profile = synthetic(&truth, 200, -100.0, 100.0);
        let fit = fit_s_curve(&profile, &[-40.0, -0.04, 5.0, 190.0], &FitConfig::default())
            .unwrap();
        assert!(fit.slope > 0.0);
        assert_rel(fit.amplitude, 50.0, 1e-4);
        assert_rel(fit.slope, 0.05, 1e-4);
    }

    #[test]
    fn flat_profile_is_degenerate() {
        let profile = ElevationProfile::new(
            (0..50).map(|i| i as f64).collect(),
            vec![312.0; 50],
        )
        .unwrap();
        let err = fit_s_curve(&profile, &[0.0, 0.1, 25.0, 312.0], &FitConfig::default())
            .unwrap_err();
        assert!(matches!(err, FittingError::Degenerate(_)));
    }

    #[test]
    fn rejects_short_guess() {
        let truth = FitParameters::new(50.0, 0.05, 0.0, 200.0);
        let profile = synthetic(&truth, 50, -100.0, 100.0);
        let err = fit_s_curve(&profile, &[50.0, 0.05, 0.0], &FitConfig::default()).unwrap_err();
        assert!(matches!(err, FittingError::InvalidGuess(_)));
    }

    #[test]
    fn iteration_budget_is_reported() {
        let truth = FitParameters::new(50.0, 0.05, 0.0, 200.0);
        let profile = synthetic(&truth, 200, -100.0, 100.0);
        let config = FitConfig {
            max_iter: 1,
            ..Default::default()
        };
        let err = fit_s_curve(&profile, &[5.0, 0.5, 60.0, 150.0], &config).unwrap_err();
        assert!(matches!(err, FittingError::NotConverged(_)));
    }

    /// Only the amplitude, slope and center checks apply
    fn shape_checks_only() -> FitConfig {
        FitConfig {
            max_relative_rms: f64::INFINITY,
            min_explained_variance: f64::NEG_INFINITY,
            ..Default::default()
        }
    }

    fn spike_profile() -> ElevationProfile {
        let mut elevation = vec![200.0; 100];
        elevation[50] = 200.001;
        ElevationProfile::new((0..100).map(|i| i as f64).collect(), elevation).unwrap()
    }

    #[test]
    fn center_outside_profile_is_rejected() {
        let fit = FitParameters::new(1.0, 1.0, 7.0, 2.0);
        let profile = synthetic(&fit, 6, 0.0, 5.0);
        let err = check_fit(&profile, &fit, &FitConfig::default()).unwrap_err();
        assert!(matches!(err, FittingError::NotConverged(_)));
    }

    #[test]
    fn vanishing_step_is_degenerate() {
        let profile = ElevationProfile::new(
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            vec![1.0, 1.0, 1.0, 1.0, 1.0, 3.0],
        )
        .unwrap();
        let fit = FitParameters::new(1e-9, 1.0, 2.5, 2.0);
        let err = check_fit(&profile, &fit, &shape_checks_only()).unwrap_err();
        assert!(matches!(err, FittingError::Degenerate(_)));
    }

    #[test]
    fn near_linear_fit_is_degenerate() {
        let profile = ElevationProfile::new(
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            vec![1.0, 1.0, 1.0, 1.0, 1.0, 3.0],
        )
        .unwrap();
        let fit = FitParameters::new(100.0, 0.01, 2.5, 2.0);
        let err = check_fit(&profile, &fit, &shape_checks_only()).unwrap_err();
        assert!(matches!(err, FittingError::Degenerate(_)));
    }

    #[test]
    fn poor_residual_is_not_converged() {
        let truth = FitParameters::new(50.0, 0.05, 0.0, 200.0);
        let profile = synthetic(&truth, 1000, -100.0, 100.0);
        let wrong_step = FitParameters::new(27.26, 262.8, 83.57, 222.74);
        let err = check_fit(&profile, &wrong_step, &FitConfig::default()).unwrap_err();
        assert!(matches!(err, FittingError::NotConverged(_)));
        assert!(rms_residual(&profile, &wrong_step) > 20.0);
    }

    #[test]
    fn far_guess_is_not_converged() {
        let truth = FitParameters::new(50.0, 0.05, 0.0, 200.0);
        let profile = synthetic(&truth, 1000, -100.0, 100.0);
        let err = fit_s_curve(&profile, &[1.0, 5.0, 90.0, 0.0], &FitConfig::default())
            .unwrap_err();
        assert!(matches!(err, FittingError::NotConverged(_)), "{err:?}");
    }

    #[test]
    fn single_spike_is_not_fitted() {
        let err = fit_s_curve(&spike_profile(), &[0.0, 0.05, 0.0, 200.0], &FitConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            FittingError::Degenerate(_) | FittingError::NotConverged(_)
        ));
    }

    #[test]
    fn unexplained_variance_is_degenerate() {
        let profile = spike_profile();
        let fit = FitParameters::new(6.76e-7, 0.05, 0.0, 200.00001);
        assert!(explained_variance(&profile, &fit) < 0.1);
        let config = FitConfig {
            max_relative_rms: f64::INFINITY,
            ..Default::default()
        };
        let err = check_fit(&profile, &fit, &config).unwrap_err();
        assert!(matches!(err, FittingError::Degenerate(_)));
    }

    #[test]
    fn exact_fit_explains_everything() {
        let truth = FitParameters::new(-35.0, 0.02, 140.0, 820.0);
        let profile = synthetic(&truth, 400, 0.0, 400.0);
        assert!((explained_variance(&profile, &truth) - 1.0).abs() < 1e-12);
        assert!(check_fit(&profile, &truth, &FitConfig::default()).is_ok());
    }
}
