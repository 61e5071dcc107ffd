//! Hydrostatic equilibrium of an ice column.
//!
//! All elevations are relative to sea level. A column of thickness `H` floats freely with its
//! surface at `H * (1 - rho_ice / rho_water)`; the height above buoyancy is how far the observed
//! surface sits above that. Grounded ice has a positive height above buoyancy, floating ice sits
//! at zero.
use crate::utils::constants::{ICE_DENSITY, SEAWATER_DENSITY};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuoyancyError {
    #[error("Invalid densities: {0}")]
    InvalidDensity(String),

    #[error("{surface} surface samples given for {bed} bed samples")]
    LengthMismatch { surface: usize, bed: usize },

    #[error("Non-finite {field} at sample {index}")]
    NonFinite { field: &'static str, index: usize },
}

/// Densities used for the flotation criterion, kg/m^3
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Densities {
    pub ice: f64,
    pub water: f64,
}

impl Default for Densities {
    fn default() -> Self {
        Densities {
            ice: ICE_DENSITY,
            water: SEAWATER_DENSITY,
        }
    }
}

impl Densities {
    fn validate(&self) -> Result<(), BuoyancyError> {
        if !(self.ice.is_finite() && self.water.is_finite()) || self.ice <= 0.0 {
            return Err(BuoyancyError::InvalidDensity(format!(
                "densities must be positive, got ice {} and water {}",
                self.ice, self.water
            )));
        }
        if self.ice >= self.water {
            return Err(BuoyancyError::InvalidDensity(format!(
                "ice ({}) must be less dense than water ({})",
                self.ice, self.water
            )));
        }
        Ok(())
    }
}

/// Per-sample buoyancy fields derived from surface and bed elevation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buoyancy {
    /// Ice thickness, surface minus bed
    pub thickness: Vec<f64>,
    /// Surface elevation the column would have if freely floating
    pub flotation_surface: Vec<f64>,
    /// Observed surface minus flotation surface
    pub height_above_buoyancy: Vec<f64>,
    /// Thickness that would float with the observed surface elevation
    pub flotation_thickness: Vec<f64>,
    /// Observed thickness minus flotation thickness
    pub thickness_deviation: Vec<f64>,
}

/// Computes thickness and height above buoyancy from surface and bed elevation.
///
/// The inputs are left untouched; every derived field is aligned with them.
pub fn height_above_buoyancy(
    surface: &[f64],
    bed: &[f64],
    densities: &Densities,
) -> Result<Buoyancy, BuoyancyError> {
    densities.validate()?;
    if surface.len() != bed.len() {
        return Err(BuoyancyError::LengthMismatch {
            surface: surface.len(),
            bed: bed.len(),
        });
    }
    if let Some(index) = surface.iter().position(|x| !x.is_finite()) {
        return Err(BuoyancyError::NonFinite {
            field: "surface",
            index,
        });
    }
    if let Some(index) = bed.iter().position(|x| !x.is_finite()) {
        return Err(BuoyancyError::NonFinite { field: "bed", index });
    }

    let freeboard = 1.0 - densities.ice / densities.water;
    let n = surface.len();
    let mut out = Buoyancy {
        thickness: Vec::with_capacity(n),
        flotation_surface: Vec::with_capacity(n),
        height_above_buoyancy: Vec::with_capacity(n),
        flotation_thickness: Vec::with_capacity(n),
        thickness_deviation: Vec::with_capacity(n),
    };
    for (&s, &b) in surface.iter().zip(bed.iter()) {
        let thickness = s - b;
        let flotation_surface = thickness * freeboard;
        let flotation_thickness = s / freeboard;
        out.thickness.push(thickness);
        out.flotation_surface.push(flotation_surface);
        out.height_above_buoyancy.push(s - flotation_surface);
        out.flotation_thickness.push(flotation_thickness);
        out.thickness_deviation.push(thickness - flotation_thickness);
    }
    Ok(out)
}
