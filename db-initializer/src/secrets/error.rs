//! Error types for secret store operations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SecretStoreError>;

/// Errors returned by a [`SecretStore`](super::SecretStore) backend.
///
/// Secret values never appear in these messages.
#[derive(Error, Debug)]
pub enum SecretStoreError {
    /// No secret with this name exists.
    #[error("secret not found: {name}")]
    NotFound { name: String },

    /// The secret exists but carries no string value (binary secret or no current version).
    #[error("secret '{name}' has no string value")]
    NoStringValue { name: String },

    /// The secret value is not a JSON object credential bundle.
    #[error("secret '{name}' is not a valid credential bundle: {reason}")]
    InvalidBundle { name: String, reason: String },

    /// The backend rejected or failed the request.
    #[error("secret store request for '{name}' failed: {message}")]
    Backend { name: String, message: String },

    #[error("failed to serialize credential bundle: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SecretStoreError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn invalid_bundle(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidBundle {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn backend(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            name: name.into(),
            message: message.into(),
        }
    }
}
