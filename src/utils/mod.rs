pub mod buoyancy;
pub mod constants;
