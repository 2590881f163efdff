//! Error types for the secret-store library

use thiserror::Error;

/// Errors that can occur when working with the secret store
#[derive(Error, Debug)]
pub enum SecretStoreError {
    /// The named secret does not exist
    #[error("secret not found: {0}")]
    NotFound(String),

    /// The store could not be reached or returned a server error
    #[error("secret store unavailable: {0}")]
    Unavailable(String),

    /// The store response could not be decoded
    #[error("failed to parse store response: {0}")]
    InvalidResponse(String),

    /// Failed to construct the store client
    #[error("failed to build store client: {0}")]
    ClientBuild(String),

    /// Failed to obtain credentials for the store
    #[error("store authentication failed: {0}")]
    Auth(#[from] gcp_auth::AuthError),
}
