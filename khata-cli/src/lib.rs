//! Command-line interface for the khata debt ledger.

pub mod app;
pub mod render;
pub mod telemetry;
