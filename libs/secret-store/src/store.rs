//! Trait definitions for secret stores

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::SecretStoreError;

/// Current state of a secret resource: identity plus its labels.
///
/// Labels drive rotation-handler selection, so a record must always be
/// fetched fresh from the store — labels may change between rotations.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretRecord {
    /// Full resource name, e.g. `projects/my-project/secrets/my-secret`
    pub name: String,
    /// Labels attached to the secret
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl SecretRecord {
    /// Look up a label value by key
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Trait for secret stores
///
/// Implement this trait to add support for new store backends
/// (e.g. HashiCorp Vault, AWS Secrets Manager, etc.)
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the current record for a secret by its resource name
    async fn get_secret(&self, name: &str) -> Result<SecretRecord, SecretStoreError>;

    /// Append new secret material as a new version, never overwriting
    /// prior versions. Returns the created version's resource name.
    async fn add_secret_version(
        &self,
        name: &str,
        payload: &[u8],
    ) -> Result<String, SecretStoreError>;

    /// Get the store name (for logging)
    fn name(&self) -> &'static str;
}

/// Factory producing one store client per unit of work.
///
/// Each rotation attempt opens its own client so that a slow or failed
/// connection for one event cannot affect others.
pub trait SecretStoreFactory: Send + Sync {
    fn open(&self) -> Result<Arc<dyn SecretStore>, SecretStoreError>;
}
