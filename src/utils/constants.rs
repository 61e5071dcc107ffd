/// Density of glacier ice, kg/m^3
pub const ICE_DENSITY: f64 = 917.0;
/// Density of sea water, kg/m^3
pub const SEAWATER_DENSITY: f64 = 1027.0;

/// Fraction of each profile end averaged to estimate a plateau height
pub(crate) const PLATEAU_FRACTION: f64 = 0.1;
/// Half-span of the profile, in transition widths, assumed by the initial slope estimate
pub(crate) const EDGE_TRANSITION_WIDTHS: f64 = 2.0;
