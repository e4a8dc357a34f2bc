//! Shared utilities for the database initializer
//!
//! This crate provides the ambient plumbing used by the initializer binary:
//! - Structured logging initialization
//! - Environment variable parsing helpers
//! - Telemetry events for bootstrap runs

pub mod config;
pub mod logging;
pub mod telemetry;

pub use config::ConfigExt;
pub use logging::{init_logging, LogFormat};
pub use telemetry::{Telemetry, TelemetryEvent};
