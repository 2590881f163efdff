//! Pub/Sub subscriber
//!
//! Thin client over the Pub/Sub v1 REST API: pull, acknowledge, and
//! negative-acknowledge (deadline reset). Delivery is at-least-once; the
//! worker must tolerate redelivery of any message it does not acknowledge.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use gcp_auth::TokenProvider;

const DEFAULT_API_URL: &str = "https://pubsub.googleapis.com";

// Pull requests block server-side until messages arrive, so the client
// timeout must exceed the server's hold time.
const PULL_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to build the HTTP client
    #[error("failed to build transport client: {0}")]
    ClientBuild(String),

    /// Pub/Sub could not be reached
    #[error("failed to reach Pub/Sub: {0}")]
    Unreachable(String),

    /// Pub/Sub returned a non-success status
    #[error("Pub/Sub request failed: {0}")]
    RequestFailed(String),

    /// A response could not be decoded
    #[error("invalid Pub/Sub response: {0}")]
    InvalidResponse(String),

    /// Failed to obtain credentials
    #[error("transport authentication failed: {0}")]
    Auth(#[from] gcp_auth::AuthError),
}

/// One message pulled from the subscription, with the ack id needed to
/// settle it.
#[derive(Debug, Clone)]
pub struct DeliveredMessage {
    pub ack_id: String,
    pub message_id: String,
    pub attributes: HashMap<String, String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Serialize)]
struct PullRequest {
    #[serde(rename = "maxMessages")]
    max_messages: u32,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    #[serde(rename = "receivedMessages", default)]
    received_messages: Vec<ReceivedMessage>,
}

#[derive(Debug, Deserialize)]
struct ReceivedMessage {
    #[serde(rename = "ackId")]
    ack_id: String,
    message: PubsubMessage,
}

#[derive(Debug, Deserialize)]
struct PubsubMessage {
    #[serde(default)]
    data: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
    #[serde(rename = "messageId", default)]
    message_id: String,
}

#[derive(Debug, Serialize)]
struct AcknowledgeRequest {
    #[serde(rename = "ackIds")]
    ack_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ModifyAckDeadlineRequest {
    #[serde(rename = "ackIds")]
    ack_ids: Vec<String>,
    #[serde(rename = "ackDeadlineSeconds")]
    ack_deadline_seconds: i32,
}

/// Subscriber for one Pub/Sub subscription
pub struct Subscriber {
    http: Client,
    api_url: String,
    subscription: String,
    auth: Arc<TokenProvider>,
}

impl Subscriber {
    /// Create a subscriber for a fully qualified subscription name
    /// (`projects/{project}/subscriptions/{name}`).
    pub fn new(auth: Arc<TokenProvider>, subscription: String) -> Result<Self, TransportError> {
        Self::with_api_url(auth, subscription, DEFAULT_API_URL)
    }

    /// Create a subscriber against a specific API endpoint
    pub fn with_api_url(
        auth: Arc<TokenProvider>,
        subscription: String,
        api_url: impl Into<String>,
    ) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(PULL_TIMEOUT)
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            subscription,
            auth,
        })
    }

    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    fn subscription_url(&self, verb: &str) -> String {
        format!("{}/v1/{}:{}", self.api_url, self.subscription, verb)
    }

    async fn post_json<T: Serialize>(
        &self,
        verb: &str,
        body: &T,
    ) -> Result<reqwest::Response, TransportError> {
        let token = self.auth.token().await?;

        let response = self
            .http
            .post(self.subscription_url(verb))
            .bearer_auth(token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::RequestFailed(format!(
                "{} failed with status {}: {}",
                verb, status, body
            )));
        }

        Ok(response)
    }

    /// Pull up to `max_messages` messages. An empty vec means the
    /// subscription had nothing to deliver.
    pub async fn pull(&self, max_messages: u32) -> Result<Vec<DeliveredMessage>, TransportError> {
        let response = self
            .post_json(
                "pull",
                &PullRequest {
                    max_messages,
                },
            )
            .await?;

        let pulled = response
            .json::<PullResponse>()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        let mut messages = Vec::with_capacity(pulled.received_messages.len());
        for received in pulled.received_messages {
            let data = BASE64
                .decode(received.message.data.as_bytes())
                .map_err(|e| {
                    TransportError::InvalidResponse(format!(
                        "undecodable message data for {}: {}",
                        received.message.message_id, e
                    ))
                })?;
            messages.push(DeliveredMessage {
                ack_id: received.ack_id,
                message_id: received.message.message_id,
                attributes: received.message.attributes,
                data,
            });
        }

        debug!(count = messages.len(), "pulled messages");
        Ok(messages)
    }

    /// Acknowledge messages; they will not be redelivered.
    pub async fn acknowledge(&self, ack_ids: &[String]) -> Result<(), TransportError> {
        if ack_ids.is_empty() {
            return Ok(());
        }
        self.post_json(
            "acknowledge",
            &AcknowledgeRequest {
                ack_ids: ack_ids.to_vec(),
            },
        )
        .await?;
        Ok(())
    }

    /// Negative-acknowledge messages by resetting their ack deadline to
    /// zero, making them immediately eligible for redelivery.
    pub async fn nack(&self, ack_ids: &[String]) -> Result<(), TransportError> {
        if ack_ids.is_empty() {
            return Ok(());
        }
        self.post_json(
            "modifyAckDeadline",
            &ModifyAckDeadlineRequest {
                ack_ids: ack_ids.to_vec(),
                ack_deadline_seconds: 0,
            },
        )
        .await?;
        Ok(())
    }
}
