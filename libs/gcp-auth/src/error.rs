//! Error types for the gcp-auth library

use thiserror::Error;

/// Errors that can occur while obtaining an access token
#[derive(Error, Debug)]
pub enum AuthError {
    /// Failed to build the HTTP client
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// The metadata server could not be reached
    #[error("failed to reach metadata server: {0}")]
    MetadataUnreachable(String),

    /// The token endpoint returned a non-success status
    #[error("token request failed: {0}")]
    TokenRequestFailed(String),

    /// The token response could not be decoded
    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}
