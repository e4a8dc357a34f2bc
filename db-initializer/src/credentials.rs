//! Credential bundles exchanged with the secret store
//!
//! A bundle is the JSON object stored as a secret's value:
//! `{"username": .., "password": .., "host": .., "dbname": .., ...}`.
//! Keys this crate does not know about (`engine`, `port`, ...) are carried
//! through untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const USERNAME: &str = "username";
pub const PASSWORD: &str = "password";
pub const HOST: &str = "host";
pub const DBNAME: &str = "dbname";
pub const PORT: &str = "port";

pub const DEFAULT_PORT: u16 = 5432;

/// A key is missing from a credential bundle or has an unusable value.
#[derive(Error, Debug, PartialEq)]
pub enum CredentialsError {
    #[error("credential bundle is missing '{0}'")]
    MissingKey(&'static str),

    #[error("credential bundle has an invalid '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Key-value credential bundle.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, Value>);

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a bundle from a secret string. Anything but a JSON object is rejected.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    /// Builder-style insert of a string value.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), Value::String(value.into()));
    }

    /// String value for `key`. Numbers are rendered, other JSON types are ignored.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Return a copy of `self` with every entry of `additions` applied on top.
    ///
    /// Keys only in `self` survive; keys in both take the value from `additions`.
    pub fn merged_with(&self, additions: &Credentials) -> Credentials {
        let mut merged = self.clone();
        for (key, value) in &additions.0 {
            merged.0.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Non-empty string value for `key`.
    pub fn require(&self, key: &'static str) -> Result<String, CredentialsError> {
        match self.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(CredentialsError::MissingKey(key)),
        }
    }

    /// Port from the bundle, falling back to 5432 when absent.
    pub fn port(&self) -> Result<u16, CredentialsError> {
        match self.get(PORT) {
            None => Ok(DEFAULT_PORT),
            Some(raw) => raw.parse().map_err(|_| CredentialsError::InvalidValue {
                key: PORT,
                reason: format!("'{}' is not a TCP port", raw),
            }),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.0 {
            if key == PASSWORD {
                map.entry(key, &"<redacted>");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}
