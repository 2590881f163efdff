//! Gandi access-token rotation
//!
//! Exchanges the bearer credential carried in the notification payload for a
//! freshly issued organization access token, then stores that token as a new
//! version of the target secret.
//! See: https://api.gandi.net/docs/organization/#v5-organization-access-tokens

use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use async_trait::async_trait;
use secret_store::SecretStore;

use crate::event::RotationEvent;
use crate::handlers::{HandlerError, RotationHandler};

pub const HANDLER_NAME: &str = "gandi";

const GANDI_API_URL: &str = "GANDI_API_URL";
const DEFAULT_API_URL: &str = "https://api.gandi.net";
const ACCESS_TOKENS_PATH: &str = "/v5/organization/access-tokens";

#[derive(Debug, Clone)]
pub struct GandiConfig {
    pub api_url: String,
}

impl Default for GandiConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl GandiConfig {
    pub fn from_env() -> Self {
        let api_url =
            std::env::var(GANDI_API_URL).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self {
            api_url,
        }
    }

    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
        }
    }

    fn access_tokens_url(&self) -> String {
        format!("{}{}", self.api_url, ACCESS_TOKENS_PATH)
    }
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

pub struct GandiHandler {
    config: GandiConfig,
    http: Client,
    store: Arc<dyn SecretStore>,
}

impl GandiHandler {
    pub fn new(config: GandiConfig, http: Client, store: Arc<dyn SecretStore>) -> Self {
        Self {
            config,
            http,
            store,
        }
    }
}

#[async_trait]
impl RotationHandler for GandiHandler {
    fn name(&self) -> &'static str {
        HANDLER_NAME
    }

    async fn execute(&self, event: &RotationEvent) -> Result<(), HandlerError> {
        let bearer = std::str::from_utf8(&event.payload)
            .map_err(|e| HandlerError::InvalidPayload(e.to_string()))?;

        let response = self
            .http
            .post(self.config.access_tokens_url())
            .header("Content-Type", "application/json")
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| HandlerError::ProviderRequest(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(HandlerError::ProviderStatus(format!(
                "status {}: {}",
                status, body
            )));
        }

        let issued = response
            .json::<AccessTokenResponse>()
            .await
            .map_err(|e| HandlerError::InvalidResponse(e.to_string()))?;

        debug!(secret = %event.secret_id, "issued new access token, writing version");
        self.store
            .add_secret_version(&event.secret_id, issued.access_token.as_bytes())
            .await?;

        Ok(())
    }
}
