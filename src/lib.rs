pub mod config;
pub mod convalidation;
pub mod error;
pub mod telemetry;
