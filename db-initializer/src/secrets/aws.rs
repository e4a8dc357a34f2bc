//! AWS Secrets Manager backend.

use super::{Result, SecretStore, SecretStoreError};
use async_trait::async_trait;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client;
use tracing::debug;

/// Secret store backed by AWS Secrets Manager.
///
/// Region and credentials come from the standard AWS environment
/// (`AWS_REGION`, instance/task role, profile, ...).
#[derive(Clone)]
pub struct AwsSecretStore {
    client: Client,
}

impl AwsSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the ambient AWS configuration.
    pub async fn from_env() -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl SecretStore for AwsSecretStore {
    async fn get_secret_string(&self, name: &str) -> Result<String> {
        debug!(secret = %name, "Fetching secret");

        let output = self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|err| {
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_resource_not_found_exception())
                    .unwrap_or(false);
                if not_found {
                    SecretStoreError::not_found(name)
                } else {
                    SecretStoreError::backend(name, DisplayErrorContext(&err).to_string())
                }
            })?;

        output
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| SecretStoreError::NoStringValue {
                name: name.to_string(),
            })
    }

    async fn put_secret_string(&self, name: &str, value: &str) -> Result<()> {
        debug!(secret = %name, "Writing secret");

        self.client
            .put_secret_value()
            .secret_id(name)
            .secret_string(value)
            .send()
            .await
            .map_err(|err| SecretStoreError::backend(name, DisplayErrorContext(&err).to_string()))?;

        Ok(())
    }
}
