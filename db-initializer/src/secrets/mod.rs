//! Secret store access
//!
//! The initializer reads the admin credential bundle from the store once at
//! start-up and writes two bundles back per run. [`SecretStore`] is the seam
//! between that logic and a concrete backend; [`AwsSecretStore`] talks to
//! AWS Secrets Manager.

mod aws;
mod error;

pub use aws::AwsSecretStore;
pub use error::{Result, SecretStoreError};

use crate::credentials::Credentials;
use async_trait::async_trait;

/// Named secret blobs, read and written as whole strings.
///
/// Implementations MUST NOT log secret values.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the current string value of a secret.
    async fn get_secret_string(&self, name: &str) -> Result<String>;

    /// Replace the current value of a secret.
    async fn put_secret_string(&self, name: &str, value: &str) -> Result<()>;

    /// Fetch a secret and decode it as a credential bundle.
    async fn get_credentials(&self, name: &str) -> Result<Credentials> {
        let raw = self.get_secret_string(name).await?;
        Credentials::from_json(&raw)
            .map_err(|e| SecretStoreError::invalid_bundle(name, e.to_string()))
    }

    /// Encode a credential bundle and store it as the secret's new value.
    async fn put_credentials(&self, name: &str, credentials: &Credentials) -> Result<()> {
        let raw = credentials.to_json()?;
        self.put_secret_string(name, &raw).await
    }
}
