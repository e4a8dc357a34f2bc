//! Initializer configuration from environment variables

use crate::error::BootstrapError;
use common::ConfigExt;

/// Secret holding the admin connection bundle.
pub const ENV_ADMIN_SECRET: &str = "DB_SECRET_NAME";
/// Destination secret for the application (`readwrite`) user.
pub const ENV_USER_SECRET: &str = "DB_USER_SECRET_NAME";
/// Destination secret for the `tablecreator` user, consumed by the database proxy.
pub const ENV_TABLE_CREATOR_SECRET: &str = "DB_PROXY";
/// Log row counts of every table after a successful run.
pub const ENV_VERIFY_TABLES: &str = "VERIFY_TABLES";

/// Configuration for one initializer process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub admin_secret_name: String,
    pub user_secret_name: String,
    pub table_creator_secret_name: String,
    pub verify_tables: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// All three secret names are required.
    pub fn from_env() -> Result<Self, BootstrapError> {
        Ok(Self {
            admin_secret_name: String::env_required(ENV_ADMIN_SECRET).map_err(BootstrapError::Config)?,
            user_secret_name: String::env_required(ENV_USER_SECRET).map_err(BootstrapError::Config)?,
            table_creator_secret_name: String::env_required(ENV_TABLE_CREATOR_SECRET)
                .map_err(BootstrapError::Config)?,
            verify_tables: bool::env_bool(ENV_VERIFY_TABLES, false),
        })
    }
}
