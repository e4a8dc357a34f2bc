//! Bootstrap error taxonomy

use crate::credentials::CredentialsError;
use crate::db::DbError;
use crate::publisher::PublishError;
use crate::roles::ProvisionError;
use crate::schema::SchemaError;
use crate::secrets::SecretStoreError;
use thiserror::Error;

/// Any failure of a bootstrap run.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// Required environment configuration is missing.
    #[error("configuration error: {0:#}")]
    Config(anyhow::Error),

    /// The admin bundle cannot be used to connect.
    #[error("admin secret '{secret}' is unusable: {source}")]
    AdminCredentials {
        secret: String,
        #[source]
        source: CredentialsError,
    },

    #[error(transparent)]
    SecretStore(#[from] SecretStoreError),

    #[error("database connection failed: {0}")]
    Connection(#[source] DbError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl BootstrapError {
    /// Short name of the step that failed, for logs and telemetry.
    pub fn step(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::AdminCredentials { .. } | Self::SecretStore(_) => "read_admin_secret",
            Self::Connection(_) => "connect",
            Self::Schema(_) => "apply_schema",
            Self::Provision(_) => "provision_roles",
            Self::Publish(_) => "publish_secrets",
        }
    }
}
