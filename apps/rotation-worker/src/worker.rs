//! Pull loop
//!
//! Continuously pulls deliveries and processes each in its own task,
//! bounded by a semaphore. There is no ordering guarantee across messages,
//! including messages for the same secret; the store's add-version
//! semantics make that race safe.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::pipeline::{disposition, Disposition, RotationPipeline};
use crate::pubsub::{DeliveredMessage, Subscriber, TransportError};

const PULL_BACKOFF: Duration = Duration::from_secs(5);

pub struct Worker {
    subscriber: Arc<Subscriber>,
    pipeline: Arc<RotationPipeline>,
    max_concurrency: usize,
    pull_batch_size: u32,
}

impl Worker {
    pub fn new(
        subscriber: Arc<Subscriber>,
        pipeline: Arc<RotationPipeline>,
        max_concurrency: usize,
        pull_batch_size: u32,
    ) -> Self {
        Self {
            subscriber,
            pipeline,
            max_concurrency,
            pull_batch_size,
        }
    }

    /// Pull and process until shutdown.
    ///
    /// A pull failure before the subscription was ever reached is fatal;
    /// afterwards pull failures are logged and retried with a backoff. On
    /// shutdown, in-flight work is drained and unfinished messages are left
    /// unsettled so the transport redelivers them.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), TransportError> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut established = false;

        loop {
            let pulled = tokio::select! {
                _ = shutdown.cancelled() => break,
                pulled = self.subscriber.pull(self.pull_batch_size) => pulled,
            };

            match pulled {
                Ok(messages) => {
                    established = true;
                    for message in messages {
                        let Ok(permit) = semaphore.clone().acquire_owned().await else {
                            break;
                        };
                        let pipeline = self.pipeline.clone();
                        let subscriber = self.subscriber.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            let _permit = permit;
                            tokio::select! {
                                _ = shutdown.cancelled() => {
                                    // Not settled: the transport will redeliver.
                                    debug!(
                                        message_id = %message.message_id,
                                        "cancelled mid-flight, leaving message for redelivery"
                                    );
                                }
                                outcome = pipeline.process(&message) => {
                                    settle(&subscriber, &message, disposition(&outcome)).await;
                                }
                            }
                        });
                    }
                }
                Err(e) if !established => return Err(e),
                Err(e) => {
                    warn!(error = %e, "pull failed, backing off");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(PULL_BACKOFF) => {}
                    }
                }
            }
        }

        // Drain: wait for every in-flight task to release its permit.
        let _ = semaphore.acquire_many(self.max_concurrency as u32).await;
        Ok(())
    }
}

/// Issue exactly one settlement for a completed attempt.
async fn settle(subscriber: &Subscriber, message: &DeliveredMessage, disposition: Disposition) {
    let ack_ids = [message.ack_id.clone()];
    let result = match disposition {
        Disposition::Ack => subscriber.acknowledge(&ack_ids).await,
        Disposition::Nack => subscriber.nack(&ack_ids).await,
    };
    if let Err(e) = result {
        // The ack deadline will lapse and the message will be redelivered.
        warn!(
            error = %e,
            message_id = %message.message_id,
            ?disposition,
            "failed to settle message"
        );
    }
}
