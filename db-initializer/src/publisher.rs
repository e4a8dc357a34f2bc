//! Publishing generated credentials to the secret store

use crate::credentials::Credentials;
use crate::secrets::{SecretStore, SecretStoreError};
use thiserror::Error;
use tracing::info;

/// Writing a bundle failed after its database user had already been created.
///
/// The user stays live in the database, but its password is not recoverable
/// from the secret store.
#[derive(Error, Debug)]
#[error(
    "failed to publish secret '{secret}'; the database user for it exists \
     but its credentials are not discoverable through the secret store: {source}"
)]
pub struct PublishError {
    pub secret: String,
    #[source]
    pub source: SecretStoreError,
}

/// Merge `additions` over a copy of `existing` and overwrite `secret_name` with the result.
pub async fn publish<S>(
    store: &S,
    existing: &Credentials,
    additions: &Credentials,
    secret_name: &str,
) -> Result<(), PublishError>
where
    S: SecretStore + ?Sized,
{
    let bundle = existing.merged_with(additions);

    store
        .put_credentials(secret_name, &bundle)
        .await
        .map_err(|source| PublishError {
            secret: secret_name.to_string(),
            source,
        })?;

    info!(secret = %secret_name, keys = bundle.len(), "Published credentials");
    Ok(())
}
