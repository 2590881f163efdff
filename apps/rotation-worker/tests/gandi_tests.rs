use async_trait::async_trait;
use mockall::mock;
use std::collections::HashMap;
use std::sync::Arc;

use secret_store::{SecretRecord, SecretStore, SecretStoreError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rotation_worker::event::RotationEvent;
use rotation_worker::handlers::gandi::{GandiConfig, GandiHandler};
use rotation_worker::handlers::{HandlerError, RotationHandler};

mock! {
    pub Store {}

    #[async_trait]
    impl SecretStore for Store {
        async fn get_secret(&self, name: &str) -> Result<SecretRecord, SecretStoreError>;
        async fn add_secret_version(&self, name: &str, payload: &[u8]) -> Result<String, SecretStoreError>;
        fn name(&self) -> &'static str;
    }
}

const SECRET_ID: &str = "projects/test-project/secrets/gandi-token";
const ACCESS_TOKENS_PATH: &str = "/v5/organization/access-tokens";

fn rotation_event(payload: &[u8]) -> RotationEvent {
    let mut attributes = HashMap::new();
    attributes.insert("secretId".to_string(), SECRET_ID.to_string());
    attributes.insert("eventType".to_string(), "SECRET_ROTATE".to_string());
    RotationEvent::from_delivery(&attributes, payload.to_vec())
}

fn handler_for(server: &MockServer, store: MockStore) -> GandiHandler {
    GandiHandler::new(
        GandiConfig::with_api_url(server.uri()),
        reqwest::Client::new(),
        Arc::new(store),
    )
}

#[tokio::test]
async fn test_rotation_exchanges_credential_and_writes_new_version() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ACCESS_TOKENS_PATH))
        .and(header("authorization", "Bearer current-credential"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "freshly-issued-token",
            "expires_at": "2026-09-01T00:00:00Z",
            "id": "token-id",
            "name": "rotation",
            "scopes": ["organization:read"],
            "entities": [{"id": "org-1", "name": "acme", "type": "organization"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut store = MockStore::new();
    store
        .expect_add_secret_version()
        .withf(|name, payload| name == SECRET_ID && payload == b"freshly-issued-token")
        .times(1)
        .returning(|name, _| Ok(format!("{name}/versions/2")));

    let handler = handler_for(&mock_server, store);
    assert_eq!(handler.name(), "gandi");

    handler
        .execute(&rotation_event(b"current-credential"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_provider_rejection_fails_without_store_write() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ACCESS_TOKENS_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&mock_server)
        .await;

    // No store expectations: a write would panic the test.
    let handler = handler_for(&mock_server, MockStore::new());
    let result = handler.execute(&rotation_event(b"revoked-credential")).await;

    match result {
        Err(HandlerError::ProviderStatus(message)) => {
            assert!(message.contains("403"), "unexpected message: {message}");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_undecodable_provider_response_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ACCESS_TOKENS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let handler = handler_for(&mock_server, MockStore::new());
    let result = handler.execute(&rotation_event(b"current-credential")).await;

    assert!(matches!(result, Err(HandlerError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_store_write_failure_propagates() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ACCESS_TOKENS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "freshly-issued-token"
        })))
        .mount(&mock_server)
        .await;

    let mut store = MockStore::new();
    store
        .expect_add_secret_version()
        .times(1)
        .returning(|_, _| Err(SecretStoreError::Unavailable("store down".to_string())));

    let handler = handler_for(&mock_server, store);
    let result = handler.execute(&rotation_event(b"current-credential")).await;

    assert!(matches!(result, Err(HandlerError::Store(_))));
}

#[tokio::test]
async fn test_non_utf8_payload_is_invalid_without_provider_call() {
    let mock_server = MockServer::start().await;
    // No mocks mounted: a provider call would return an unexpected 404.

    let handler = handler_for(&mock_server, MockStore::new());
    let result = handler.execute(&rotation_event(&[0xff, 0xfe])).await;

    assert!(matches!(result, Err(HandlerError::InvalidPayload(_))));
}
