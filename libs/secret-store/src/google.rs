//! Google Secret Manager store
//!
//! Thin client over the Secret Manager v1 REST API.
//! See: https://cloud.google.com/secret-manager/docs/reference/rest

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use gcp_auth::TokenProvider;

use crate::{SecretRecord, SecretStore, SecretStoreError, SecretStoreFactory};

const DEFAULT_API_URL: &str = "https://secretmanager.googleapis.com";

#[derive(Debug, Serialize)]
struct SecretPayload {
    data: String,
}

#[derive(Debug, Serialize)]
struct AddVersionRequest {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretVersion {
    name: String,
}

/// Secret store backed by Google Secret Manager
pub struct GoogleSecretManager {
    http: Client,
    api_url: String,
    auth: Arc<TokenProvider>,
}

impl GoogleSecretManager {
    pub fn new(auth: Arc<TokenProvider>) -> Result<Self, SecretStoreError> {
        Self::with_api_url(auth, DEFAULT_API_URL)
    }

    /// Create a client against a specific API endpoint
    pub fn with_api_url(
        auth: Arc<TokenProvider>,
        api_url: impl Into<String>,
    ) -> Result<Self, SecretStoreError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SecretStoreError::ClientBuild(e.to_string()))?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            auth,
        })
    }

    fn secret_url(&self, name: &str) -> String {
        format!("{}/v1/{}", self.api_url, name)
    }

    fn add_version_url(&self, name: &str) -> String {
        format!("{}/v1/{}:addVersion", self.api_url, name)
    }
}

#[async_trait]
impl SecretStore for GoogleSecretManager {
    async fn get_secret(&self, name: &str) -> Result<SecretRecord, SecretStoreError> {
        let token = self.auth.token().await?;

        let response = self
            .http
            .get(self.secret_url(name))
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| SecretStoreError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let record = response
                    .json::<SecretRecord>()
                    .await
                    .map_err(|e| SecretStoreError::InvalidResponse(e.to_string()))?;
                debug!(secret = %record.name, "fetched secret record");
                Ok(record)
            }
            StatusCode::NOT_FOUND => Err(SecretStoreError::NotFound(name.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SecretStoreError::Unavailable(format!(
                    "get secret failed with status {}: {}",
                    status, body
                )))
            }
        }
    }

    async fn add_secret_version(
        &self,
        name: &str,
        payload: &[u8],
    ) -> Result<String, SecretStoreError> {
        let token = self.auth.token().await?;

        let request = AddVersionRequest {
            payload: SecretPayload {
                data: BASE64.encode(payload),
            },
        };

        let response = self
            .http
            .post(self.add_version_url(name))
            .bearer_auth(token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| SecretStoreError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SecretStoreError::Unavailable(format!(
                "add secret version failed with status {}: {}",
                status, body
            )));
        }

        let version = response
            .json::<SecretVersion>()
            .await
            .map_err(|e| SecretStoreError::InvalidResponse(e.to_string()))?;
        debug!(version = %version.name, "added secret version");
        Ok(version.name)
    }

    fn name(&self) -> &'static str {
        "google-secret-manager"
    }
}

/// Factory opening a fresh Secret Manager client per rotation attempt
pub struct GoogleSecretManagerFactory {
    auth: Arc<TokenProvider>,
    api_url: String,
}

impl GoogleSecretManagerFactory {
    pub fn new(auth: Arc<TokenProvider>) -> Self {
        Self {
            auth,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn with_api_url(auth: Arc<TokenProvider>, api_url: impl Into<String>) -> Self {
        Self {
            auth,
            api_url: api_url.into(),
        }
    }
}

impl SecretStoreFactory for GoogleSecretManagerFactory {
    fn open(&self) -> Result<Arc<dyn SecretStore>, SecretStoreError> {
        let store = GoogleSecretManager::with_api_url(self.auth.clone(), self.api_url.clone())?;
        Ok(Arc::new(store))
    }
}
