use crate::error::GlineError;
use crate::fitting::scurve::fitting::FitConfig;
use crate::fitting::scurve::scurve::{fit_flight_lines, par_fit_flight_lines};
use crate::formats::FitReport;
use log::info;
use std::path::Path;

pub mod error;
pub mod fitting;
pub mod formats;
pub mod utils;

pub use crate::fitting::common::error::FittingError;
pub use crate::fitting::common::fitstruct::{
    DerivativeTriple, ElevationProfile, FitParameters, GroundingCandidate,
};
pub use crate::fitting::scurve::fitting::fit_s_curve;
pub use crate::fitting::scurve::model::derivatives;
pub use crate::utils::buoyancy::{height_above_buoyancy, Buoyancy, Densities};

/// Fits every flight line in a JSON file and writes the resulting report.
pub fn file_fit_gline<P: AsRef<Path>, Q: AsRef<Path>>(
    infile: P,
    outfile: Q,
    config: &FitConfig,
    parallel: bool,
) -> Result<FitReport, GlineError> {
    let lines = formats::read_flight_lines(&infile)?;
    info!(
        "fitting {} flight lines from {}",
        lines.len(),
        infile.as_ref().display()
    );
    let results = if parallel {
        par_fit_flight_lines(&lines, config)
    } else {
        fit_flight_lines(&lines, config)
    };
    let report = FitReport::new(&lines, results);
    info!(
        "{} fitted, {} skipped",
        report.fits.len(),
        report.failures.len()
    );
    formats::write_report_file(&report, outfile)?;
    Ok(report)
}

#[cfg(feature = "python")]
mod python {
    use crate::fitting::common::fitstruct::{ElevationProfile, FitParameters};
    use crate::fitting::scurve::fitting::{fit_s_curve, FitConfig};
    use crate::fitting::scurve::model::derivatives_at;
    use crate::utils::buoyancy::{height_above_buoyancy, Densities};
    use numpy::{PyArray1, PyReadonlyArray1};
    use pyo3::prelude::*;
    use pyo3::types::PyDict;

    type Params = (f64, f64, f64, f64);

    fn profile<'py>(
        distance: PyReadonlyArray1<'py, f64>,
        elevation: PyReadonlyArray1<'py, f64>,
    ) -> PyResult<ElevationProfile> {
        Ok(ElevationProfile::new(
            distance.as_array().to_vec(),
            elevation.as_array().to_vec(),
        )?)
    }

    /// Fits amp * erf(b * (e - x0)) + v_off to an elevation profile.
    #[pyfunction]
    #[pyo3(name = "fit_s_curve")]
    #[pyo3(signature = (distance, elevation, initial_guess=None, max_iter=200))]
    fn fit_s_curve_py<'py>(
        distance: PyReadonlyArray1<'py, f64>,
        elevation: PyReadonlyArray1<'py, f64>,
        initial_guess: Option<Vec<f64>>,
        max_iter: usize,
    ) -> PyResult<Params> {
        let profile = profile(distance, elevation)?;
        let guess = match initial_guess {
            Some(guess) => guess,
            None => FitParameters::estimate(&profile)?.to_array().to_vec(),
        };
        let config = FitConfig {
            max_iter,
            ..Default::default()
        };
        let fit = fit_s_curve(&profile, &guess, &config)?;
        Ok((fit.amplitude, fit.slope, fit.center, fit.offset))
    }

    /// First, second and third derivatives of the fitted S-curve at each distance.
    #[pyfunction]
    #[pyo3(name = "s_curve_derivatives")]
    #[pyo3(text_signature = "(distance, params, /)")]
    fn derivatives_py<'py>(
        py: Python<'py>,
        distance: PyReadonlyArray1<'py, f64>,
        params: Params,
    ) -> PyResult<(
        Bound<'py, PyArray1<f64>>,
        Bound<'py, PyArray1<f64>>,
        Bound<'py, PyArray1<f64>>,
    )> {
        let distance = distance.as_array().to_vec();
        let (amp, b, x0, v_off) = params;
        let triple = derivatives_at(&distance, &[amp, b, x0, v_off])?;
        Ok((
            PyArray1::from_vec_bound(py, triple.first),
            PyArray1::from_vec_bound(py, triple.second),
            PyArray1::from_vec_bound(py, triple.third),
        ))
    }

    /// Thickness and height above buoyancy from surface and bed elevation.
    #[pyfunction]
    #[pyo3(name = "height_above_buoyancy")]
    #[pyo3(signature = (surface, bed, ice_density=None, water_density=None))]
    fn hab_py<'py>(
        py: Python<'py>,
        surface: PyReadonlyArray1<'py, f64>,
        bed: PyReadonlyArray1<'py, f64>,
        ice_density: Option<f64>,
        water_density: Option<f64>,
    ) -> PyResult<Bound<'py, PyDict>> {
        let defaults = Densities::default();
        let densities = Densities {
            ice: ice_density.unwrap_or(defaults.ice),
            water: water_density.unwrap_or(defaults.water),
        };
        let surface = surface.as_array().to_vec();
        let bed = bed.as_array().to_vec();
        let out = height_above_buoyancy(&surface, &bed, &densities)
            .map_err(crate::error::GlineError::from)?;

        let dict = PyDict::new_bound(py);
        dict.set_item("thickness", PyArray1::from_vec_bound(py, out.thickness))?;
        dict.set_item(
            "height_above_buoyancy",
            PyArray1::from_vec_bound(py, out.height_above_buoyancy),
        )?;
        dict.set_item(
            "flotation_surface",
            PyArray1::from_vec_bound(py, out.flotation_surface),
        )?;
        dict.set_item(
            "flotation_thickness",
            PyArray1::from_vec_bound(py, out.flotation_thickness),
        )?;
        dict.set_item(
            "thickness_deviation",
            PyArray1::from_vec_bound(py, out.thickness_deviation),
        )?;
        Ok(dict)
    }

    /// Functions for grounding-line detection from radar elevation profiles.
    #[pymodule]
    fn gline(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(fit_s_curve_py, m)?)?;
        m.add_function(wrap_pyfunction!(derivatives_py, m)?)?;
        m.add_function(wrap_pyfunction!(hab_py, m)?)?;

        Ok(())
    }
}
