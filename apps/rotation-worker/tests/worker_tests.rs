//! End-to-end settlement tests: pull → pipeline → exactly one ack or nack.

use async_trait::async_trait;
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use secret_store::{SecretRecord, SecretStore, SecretStoreError, SecretStoreFactory};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gcp_auth::TokenProvider;
use rotation_worker::event::RotationEvent;
use rotation_worker::handlers::{HandlerError, HandlerRegistry, RegistryError, RotationHandler};
use rotation_worker::metrics::RotationMetrics;
use rotation_worker::pipeline::RotationPipeline;
use rotation_worker::pubsub::Subscriber;
use rotation_worker::worker::Worker;

// ==================== MOCKS ====================

mock! {
    pub Store {}

    #[async_trait]
    impl SecretStore for Store {
        async fn get_secret(&self, name: &str) -> Result<SecretRecord, SecretStoreError>;
        async fn add_secret_version(&self, name: &str, payload: &[u8]) -> Result<String, SecretStoreError>;
        fn name(&self) -> &'static str;
    }
}

mock! {
    pub Factory {}

    impl SecretStoreFactory for Factory {
        fn open(&self) -> Result<Arc<dyn SecretStore>, SecretStoreError>;
    }
}

mock! {
    pub Registry {}

    impl HandlerRegistry for Registry {
        fn resolve(
            &self,
            name: &str,
            store: Arc<dyn SecretStore>,
        ) -> Result<Box<dyn RotationHandler>, RegistryError>;
    }
}

mock! {
    pub Handler {}

    #[async_trait]
    impl RotationHandler for Handler {
        fn name(&self) -> &'static str;
        async fn execute(&self, event: &RotationEvent) -> Result<(), HandlerError>;
    }
}

// ==================== TEST HELPERS ====================

const SUBSCRIPTION: &str = "projects/test-project/subscriptions/secret-rotation";
const SECRET_ID: &str = "projects/test-project/secrets/api-key";

/// Mount a subscription that delivers one message and then goes quiet.
async fn mount_single_delivery(server: &MockServer, event_type: &str) {
    // "credential" base64-encoded
    Mock::given(method("POST"))
        .and(path(format!("/v1/{SUBSCRIPTION}:pull")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "receivedMessages": [{
                "ackId": "ack-1",
                "message": {
                    "data": "Y3JlZGVudGlhbA==",
                    "attributes": {"secretId": SECRET_ID, "eventType": event_type},
                    "messageId": "msg-1"
                }
            }]
        })))
        .up_to_n_times(1)
        .mount(server)
        .await;

    // Subsequent pulls find nothing; delayed so the loop does not spin hot.
    Mock::given(method("POST"))
        .and(path(format!("/v1/{SUBSCRIPTION}:pull")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({}))
                .set_delay(Duration::from_millis(50)),
        )
        .mount(server)
        .await;
}

async fn mount_settlement(server: &MockServer, expected_acks: u64, expected_nacks: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/v1/{SUBSCRIPTION}:acknowledge")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(expected_acks)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/{SUBSCRIPTION}:modifyAckDeadline")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(expected_nacks)
        .mount(server)
        .await;
}

fn subscriber_for(server: &MockServer) -> Arc<Subscriber> {
    let auth = Arc::new(TokenProvider::with_static_token("transport-token").unwrap());
    Arc::new(Subscriber::with_api_url(auth, SUBSCRIPTION.to_string(), server.uri()).unwrap())
}

fn factory_returning(store: MockStore) -> MockFactory {
    let store: Arc<dyn SecretStore> = Arc::new(store);
    let mut factory = MockFactory::new();
    factory.expect_open().returning(move || Ok(store.clone()));
    factory
}

async fn run_worker_briefly(worker: Worker) {
    let token = CancellationToken::new();
    let run_token = token.clone();
    let handle = tokio::spawn(async move { worker.run(run_token).await });

    tokio::time::sleep(Duration::from_millis(400)).await;
    token.cancel();
    handle.await.unwrap().unwrap();
}

// ==================== TESTS ====================

#[tokio::test]
async fn test_successful_rotation_is_acknowledged_exactly_once() {
    let mock_server = MockServer::start().await;
    mount_single_delivery(&mock_server, "SECRET_ROTATE").await;
    mount_settlement(&mock_server, 1, 0).await;

    let mut store = MockStore::new();
    store.expect_get_secret().times(1).returning(|_| {
        Ok(SecretRecord {
            name: SECRET_ID.to_string(),
            labels: [("handler".to_string(), "gandi".to_string())].into_iter().collect(),
        })
    });

    let mut handler = MockHandler::new();
    handler.expect_name().return_const("gandi");
    handler.expect_execute().times(1).returning(|_| Ok(()));

    let mut registry = MockRegistry::new();
    registry
        .expect_resolve()
        .return_once(move |_, _| Ok(Box::new(handler)));

    let metrics = Arc::new(RotationMetrics::new());
    let pipeline = Arc::new(RotationPipeline::new(
        Arc::new(factory_returning(store)),
        Arc::new(registry),
        metrics.clone(),
        "handler".to_string(),
    ));

    let worker = Worker::new(subscriber_for(&mock_server), pipeline, 4, 10);
    run_worker_briefly(worker).await;

    assert_eq!(metrics.success_count("gandi", SECRET_ID), 1);
    mock_server.verify().await;
}

#[tokio::test]
async fn test_failed_rotation_is_negative_acknowledged_exactly_once() {
    let mock_server = MockServer::start().await;
    mount_single_delivery(&mock_server, "SECRET_ROTATE").await;
    mount_settlement(&mock_server, 0, 1).await;

    let mut store = MockStore::new();
    store
        .expect_get_secret()
        .times(1)
        .returning(|_| Err(SecretStoreError::Unavailable("store down".to_string())));

    let metrics = Arc::new(RotationMetrics::new());
    let pipeline = Arc::new(RotationPipeline::new(
        Arc::new(factory_returning(store)),
        Arc::new(MockRegistry::new()),
        metrics.clone(),
        "handler".to_string(),
    ));

    let worker = Worker::new(subscriber_for(&mock_server), pipeline, 4, 10);
    run_worker_briefly(worker).await;

    assert_eq!(metrics.error_count("secret_fetch_error", SECRET_ID, ""), 1);
    mock_server.verify().await;
}

#[tokio::test]
async fn test_filtered_message_is_acknowledged_without_store_access() {
    let mock_server = MockServer::start().await;
    mount_single_delivery(&mock_server, "OTHER").await;
    mount_settlement(&mock_server, 1, 0).await;

    // No factory or registry expectations: any use would panic the test.
    let metrics = Arc::new(RotationMetrics::new());
    let pipeline = Arc::new(RotationPipeline::new(
        Arc::new(MockFactory::new()),
        Arc::new(MockRegistry::new()),
        metrics,
        "handler".to_string(),
    ));

    let worker = Worker::new(subscriber_for(&mock_server), pipeline, 4, 10);
    run_worker_briefly(worker).await;

    mock_server.verify().await;
}

#[tokio::test]
async fn test_pull_failure_at_startup_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/{SUBSCRIPTION}:pull")))
        .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
        .mount(&mock_server)
        .await;

    let pipeline = Arc::new(RotationPipeline::new(
        Arc::new(MockFactory::new()),
        Arc::new(MockRegistry::new()),
        Arc::new(RotationMetrics::new()),
        "handler".to_string(),
    ));

    let worker = Worker::new(subscriber_for(&mock_server), pipeline, 4, 10);
    let result = worker.run(CancellationToken::new()).await;

    assert!(result.is_err());
}
