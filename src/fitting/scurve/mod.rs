//! Error-function step fitting of elevation profiles.
pub mod fitting;
pub mod model;
pub mod scurve;
