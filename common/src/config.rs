//! Environment variable parsing helpers
//!
//! Helpers for reading initializer settings from the process environment.

use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;

/// Extension trait for reading environment variables.
///
/// Implemented for every type so call sites read as `String::env_required(..)`
/// or `u16::env_parse(..)`.
pub trait ConfigExt {
    /// Get an environment variable with a default value.
    ///
    /// # Example
    /// ```ignore
    /// let format = String::env_or("LOG_FORMAT", "text");
    /// ```
    fn env_or(name: &str, default: &str) -> String {
        env::var(name).unwrap_or_else(|_| default.to_string())
    }

    /// Get a required environment variable.
    ///
    /// Unset and blank values are both rejected.
    ///
    /// # Example
    /// ```ignore
    /// let secret = String::env_required("DB_SECRET_NAME")?;
    /// ```
    fn env_required(name: &str) -> Result<String> {
        let value = env::var(name).context(format!("{} must be set", name))?;
        if value.trim().is_empty() {
            bail!("{} must not be empty", name);
        }
        Ok(value)
    }

    /// Get an environment variable as a boolean.
    ///
    /// Accepts `true`/`1`/`yes` (case-insensitive); anything else is `false`.
    fn env_bool(name: &str, default: bool) -> bool {
        env::var(name)
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(default)
    }

    /// Get an environment variable parsed as a specific type.
    ///
    /// Returns `default` if the variable is not set or fails to parse.
    fn env_parse<T: FromStr>(name: &str, default: T) -> T {
        env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

impl<T> ConfigExt for T {}
