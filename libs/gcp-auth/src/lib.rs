//! # GCP access tokens
//!
//! Bearer tokens for Google Cloud REST APIs, fetched from the GCE metadata
//! server and cached until shortly before expiry.
//!
//! Two modes:
//! 1. Static: `GCP_ACCESS_TOKEN` is set — use it as-is (local runs, tests).
//! 2. Metadata: fetch from the instance metadata server and cache.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gcp_auth::TokenProvider;
//!
//! let provider = TokenProvider::from_env()?;
//! let token = provider.token().await?;
//! ```

mod error;

pub use error::AuthError;

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

const GCP_ACCESS_TOKEN: &str = "GCP_ACCESS_TOKEN";
const GCE_METADATA_HOST: &str = "GCE_METADATA_HOST";

const DEFAULT_METADATA_HOST: &str = "http://metadata.google.internal";
const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// Token with expiration tracking
struct CachedToken {
    token: Secret<String>,
    expires_at: Instant,
}

impl CachedToken {
    fn new(token: String, expires_in: u64) -> Self {
        // Subtract 30 seconds buffer to refresh before actual expiration
        let buffer = 30;
        let expires_in = if expires_in > buffer {
            expires_in - buffer
        } else {
            expires_in
        };
        Self {
            token: Secret::new(token),
            expires_at: Instant::now() + Duration::from_secs(expires_in),
        }
    }

    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Provider of bearer tokens for Google Cloud APIs
pub struct TokenProvider {
    http: reqwest::Client,
    metadata_host: String,
    static_token: Option<Secret<String>>,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    /// Create a provider from the environment.
    ///
    /// `GCP_ACCESS_TOKEN` switches to static mode; `GCE_METADATA_HOST`
    /// overrides the metadata server address.
    pub fn from_env() -> Result<Self, AuthError> {
        let metadata_host = std::env::var(GCE_METADATA_HOST)
            .unwrap_or_else(|_| DEFAULT_METADATA_HOST.to_string());
        let static_token = std::env::var(GCP_ACCESS_TOKEN)
            .ok()
            .filter(|v| !v.is_empty())
            .map(Secret::new);

        Self::build(metadata_host, static_token)
    }

    /// Create a provider against a specific metadata server address.
    pub fn with_metadata_host(host: impl Into<String>) -> Result<Self, AuthError> {
        Self::build(host.into(), None)
    }

    /// Create a provider that always returns the given token.
    pub fn with_static_token(token: impl Into<String>) -> Result<Self, AuthError> {
        Self::build(DEFAULT_METADATA_HOST.to_string(), Some(Secret::new(token.into())))
    }

    fn build(metadata_host: String, static_token: Option<Secret<String>>) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::ClientBuild(e.to_string()))?;

        Ok(Self {
            http,
            metadata_host,
            static_token,
            cached: RwLock::new(None),
        })
    }

    /// Get a valid access token, refreshing if necessary
    pub async fn token(&self) -> Result<Secret<String>, AuthError> {
        if let Some(ref token) = self.static_token {
            return Ok(Secret::new(token.expose_secret().clone()));
        }

        // Check if we have a valid cached token
        {
            let guard = self.cached.read().await;
            if let Some(ref cached) = *guard {
                if cached.is_valid() {
                    return Ok(Secret::new(cached.token.expose_secret().clone()));
                }
            }
        }

        // Need to refresh
        let response = self.fetch_token().await?;
        let token = Secret::new(response.access_token.clone());

        {
            let mut guard = self.cached.write().await;
            *guard = Some(CachedToken::new(response.access_token, response.expires_in));
        }

        Ok(token)
    }

    /// Fetch a new token from the metadata server
    async fn fetch_token(&self) -> Result<TokenResponse, AuthError> {
        let url = format!("{}{}", self.metadata_host, TOKEN_PATH);
        debug!(url = %url, "fetching access token from metadata server");

        let response = self
            .http
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| AuthError::MetadataUnreachable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenRequestFailed(format!(
                "status {}: {}",
                status, body
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }
}
