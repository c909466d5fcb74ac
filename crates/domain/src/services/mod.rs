pub mod risk;
pub mod telemetry;
