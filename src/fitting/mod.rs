pub mod common;
pub mod scurve;
