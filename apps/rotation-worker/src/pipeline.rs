//! Execution pipeline
//!
//! Drives one delivered notification through filter → resolve → handler
//! lookup → execute and reduces it to a single tagged outcome. Every
//! non-filtered terminal records exactly one metrics entry before the
//! message is settled; the ack/nack decision itself is a pure function of
//! the outcome so it can be tested without a transport.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use secret_store::SecretStoreFactory;

use crate::event::RotationEvent;
use crate::handlers::HandlerRegistry;
use crate::metrics::RotationMetrics;
use crate::pubsub::DeliveredMessage;

/// Failure classification for one rotation attempt.
///
/// All categories are retried via redelivery; missing and unknown handler
/// labels are usually misconfigurations, but dropping them silently would
/// lose messages whenever labels and registry contents briefly disagree.
/// Bounding those retries is a subscription-level (dead-letter) decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    SecretManagerClientCreation,
    SecretFetch,
    MissingHandlerLabel,
    HandlerFetch,
    HandlerExecution,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::SecretManagerClientCreation => "secret_manager_client_creation_error",
            ErrorCategory::SecretFetch => "secret_fetch_error",
            ErrorCategory::MissingHandlerLabel => "missing_handler_label",
            ErrorCategory::HandlerFetch => "handler_fetch_error",
            ErrorCategory::HandlerExecution => "handler_execution_error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one delivery attempt
#[derive(Debug)]
pub enum RotationOutcome {
    /// Not a rotation trigger; dropped without further processing
    Filtered,
    /// Rotation completed and the new version was written
    Completed { handler: &'static str },
    /// Rotation failed; `handler` is set once a handler name was known
    Failed {
        category: ErrorCategory,
        handler: Option<String>,
    },
}

/// Transport-level settlement for one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Nack,
}

/// Reduce an outcome to its settlement. Filtered and completed deliveries
/// are acknowledged; every failure is left eligible for redelivery.
pub fn disposition(outcome: &RotationOutcome) -> Disposition {
    match outcome {
        RotationOutcome::Filtered | RotationOutcome::Completed { .. } => Disposition::Ack,
        RotationOutcome::Failed { .. } => Disposition::Nack,
    }
}

/// Orchestrates one rotation attempt per delivered notification
pub struct RotationPipeline {
    store_factory: Arc<dyn SecretStoreFactory>,
    registry: Arc<dyn HandlerRegistry>,
    metrics: Arc<RotationMetrics>,
    handler_label_key: String,
}

impl RotationPipeline {
    pub fn new(
        store_factory: Arc<dyn SecretStoreFactory>,
        registry: Arc<dyn HandlerRegistry>,
        metrics: Arc<RotationMetrics>,
        handler_label_key: String,
    ) -> Self {
        Self {
            store_factory,
            registry,
            metrics,
            handler_label_key,
        }
    }

    fn fail(
        &self,
        category: ErrorCategory,
        secret_id: &str,
        handler: Option<String>,
    ) -> RotationOutcome {
        self.metrics.record_error(
            category.as_str(),
            secret_id,
            handler.as_deref().unwrap_or_default(),
        );
        RotationOutcome::Failed {
            category,
            handler,
        }
    }

    /// Run one delivery through the pipeline. Records exactly one metrics
    /// entry for every terminal state except a filtered event.
    pub async fn process(&self, message: &DeliveredMessage) -> RotationOutcome {
        let received_at = Instant::now();
        let event = RotationEvent::from_delivery(&message.attributes, message.data.clone());

        if !event.is_rotation_trigger() {
            return RotationOutcome::Filtered;
        }

        info!(
            secret = %event.secret_id,
            event_type = %event.event_type,
            message_id = %message.message_id,
            "received rotation notification"
        );

        let store = match self.store_factory.open() {
            Ok(store) => store,
            Err(e) => {
                error!(error = %e, secret = %event.secret_id, "failed to create secret store client");
                return self.fail(
                    ErrorCategory::SecretManagerClientCreation,
                    &event.secret_id,
                    None,
                );
            }
        };

        let secret = match store.get_secret(&event.secret_id).await {
            Ok(secret) => secret,
            Err(e) => {
                error!(error = %e, secret = %event.secret_id, "failed to fetch secret");
                return self.fail(ErrorCategory::SecretFetch, &event.secret_id, None);
            }
        };

        let handler_name = secret.label(&self.handler_label_key).unwrap_or_default();
        if handler_name.is_empty() {
            warn!(
                secret = %secret.name,
                label_key = %self.handler_label_key,
                "no handler label found for secret"
            );
            return self.fail(ErrorCategory::MissingHandlerLabel, &event.secret_id, None);
        }

        let handler = match self.registry.resolve(handler_name, store) {
            Ok(handler) => handler,
            Err(e) => {
                error!(error = %e, secret = %secret.name, "failed to resolve handler");
                return self.fail(
                    ErrorCategory::HandlerFetch,
                    &event.secret_id,
                    Some(handler_name.to_string()),
                );
            }
        };

        info!(handler = handler.name(), secret = %secret.name, "executing rotation");
        let result = handler.execute(&event).await;
        self.metrics.observe_duration(
            handler.name(),
            &event.secret_id,
            received_at.elapsed().as_secs_f64(),
        );

        match result {
            Ok(()) => {
                self.metrics.record_success(handler.name(), &event.secret_id);
                info!(handler = handler.name(), secret = %secret.name, "rotation completed");
                RotationOutcome::Completed {
                    handler: handler.name(),
                }
            }
            Err(e) => {
                error!(
                    error = %e,
                    handler = handler.name(),
                    secret = %secret.name,
                    "rotation failed"
                );
                self.fail(
                    ErrorCategory::HandlerExecution,
                    &event.secret_id,
                    Some(handler.name().to_string()),
                )
            }
        }
    }
}
