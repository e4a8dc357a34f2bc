//! Database bootstrap initializer
//!
//! Brings a PostgreSQL database to a fixed application schema, provisions the
//! `readwrite` and `tablecreator` roles with a fresh login user each, and
//! publishes those users' credentials to AWS Secrets Manager. Safe to re-run:
//! schema and roles are created only when missing.

pub mod bootstrap;
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod publisher;
pub mod roles;
pub mod schema;
pub mod secrets;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

pub use bootstrap::{BootstrapReport, Bootstrapper, InvocationOutcome, Phase};
pub use config::Config;
pub use credentials::Credentials;
pub use error::BootstrapError;
pub use common::{ConfigExt, Telemetry, TelemetryEvent};
