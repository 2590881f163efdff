//! Rotation handlers
//!
//! Each credential provider has its own protocol, so every provider gets one
//! handler behind the `RotationHandler` trait and the pipeline stays
//! provider-agnostic. The registry is a closed, case-sensitive mapping built
//! at startup; unregistered names fail deterministically.

pub mod gandi;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use secret_store::{SecretStore, SecretStoreError};

use crate::event::RotationEvent;
use gandi::{GandiConfig, GandiHandler};

/// Errors that can occur while executing a rotation
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The rotation payload could not be interpreted
    #[error("invalid rotation payload: {0}")]
    InvalidPayload(String),

    /// The credential provider could not be reached
    #[error("provider request failed: {0}")]
    ProviderRequest(String),

    /// The credential provider returned a non-success status
    #[error("provider returned error: {0}")]
    ProviderStatus(String),

    /// The provider response could not be decoded
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// Writing the new secret version failed
    #[error(transparent)]
    Store(#[from] SecretStoreError),
}

/// Trait for rotation handlers
///
/// One instance is constructed per delivered notification. The handler owns
/// the store write: only it knows the payload shape the provider issues.
#[async_trait]
pub trait RotationHandler: Send + Sync {
    /// Get the handler name (for metrics labels and logging)
    fn name(&self) -> &'static str;

    /// Execute the provider-specific rotation and write the new secret
    /// material as a new version of the target secret.
    async fn execute(&self, event: &RotationEvent) -> Result<(), HandlerError>;
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("unknown handler: {0}")]
    Unknown(String),
}

/// Maps a handler label value to a rotation handler instance
pub trait HandlerRegistry: Send + Sync {
    /// Construct the handler registered under `name`. The store handle is
    /// the per-event client the handler writes its result through.
    fn resolve(
        &self,
        name: &str,
        store: Arc<dyn SecretStore>,
    ) -> Result<Box<dyn RotationHandler>, RegistryError>;
}

/// The closed set of handlers known at process start
pub struct StaticRegistry {
    http: reqwest::Client,
    gandi: GandiConfig,
}

impl StaticRegistry {
    pub fn new(http: reqwest::Client, gandi: GandiConfig) -> Self {
        Self {
            http,
            gandi,
        }
    }
}

impl HandlerRegistry for StaticRegistry {
    fn resolve(
        &self,
        name: &str,
        store: Arc<dyn SecretStore>,
    ) -> Result<Box<dyn RotationHandler>, RegistryError> {
        match name {
            gandi::HANDLER_NAME => Ok(Box::new(GandiHandler::new(
                self.gandi.clone(),
                self.http.clone(),
                store,
            ))),
            _ => Err(RegistryError::Unknown(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct NoopStore;

    #[async_trait]
    impl SecretStore for NoopStore {
        async fn get_secret(
            &self,
            name: &str,
        ) -> Result<secret_store::SecretRecord, SecretStoreError> {
            Ok(secret_store::SecretRecord {
                name: name.to_string(),
                labels: HashMap::new(),
            })
        }

        async fn add_secret_version(
            &self,
            _name: &str,
            _payload: &[u8],
        ) -> Result<String, SecretStoreError> {
            Ok(String::new())
        }

        fn name(&self) -> &'static str {
            "noop"
        }
    }

    fn registry() -> StaticRegistry {
        StaticRegistry::new(reqwest::Client::new(), GandiConfig::default())
    }

    #[test]
    fn test_resolve_known_handler() {
        let handler = registry().resolve("gandi", Arc::new(NoopStore)).unwrap();
        assert_eq!(handler.name(), "gandi");
    }

    #[test]
    fn test_resolve_is_case_sensitive_exact_match() {
        let registry = registry();
        assert!(registry.resolve("Gandi", Arc::new(NoopStore)).is_err());
        assert!(registry.resolve("gandi ", Arc::new(NoopStore)).is_err());
        assert!(registry.resolve("gan", Arc::new(NoopStore)).is_err());
    }

    #[test]
    fn test_resolve_unknown_handler() {
        let result = registry().resolve("unknown_provider", Arc::new(NoopStore));
        assert!(matches!(result, Err(RegistryError::Unknown(name)) if name == "unknown_provider"));
    }
}
