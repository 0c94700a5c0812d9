//! Fuses confirmed, recovered and deceased case-count time series into one
//! per-location, per-day analytical record.

pub mod config;
pub mod error;
pub mod reference;
pub mod sources;
pub mod telemetry;
pub mod timeseries;
