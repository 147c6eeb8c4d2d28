//! HTTP-level tests for the Key Vault key-wrapping client.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use envelope_common::Retryable;
use envelope_kms_client::{
    DataKey, KekId, KekProperties, KeyVaultConfig, KeyVaultWrapper, KeyWrapError, KeyWrapper,
    kek_key_name,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn wrapper_for(server: &MockServer) -> KeyVaultWrapper {
    let config = KeyVaultConfig::new(server.uri(), "kv-token")
        .with_timeout(Duration::from_secs(2))
        .with_circuit_breaker_threshold(3);
    KeyVaultWrapper::new(config).unwrap()
}

fn key_bundle(name: &str) -> serde_json::Value {
    json!({
        "key": {
            "kid": format!("https://kv.example/keys/{name}/6a1f"),
            "kty": "RSA",
            "key_ops": ["wrapKey", "unwrapKey"]
        },
        "attributes": { "enabled": true }
    })
}

#[tokio::test]
async fn test_create_kek_requests_wrap_only_rsa_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/keys/kek-t1-[0-9a-f]{32}/create$"))
        .and(query_param("api-version", "7.4"))
        .and(header("Authorization", "Bearer kv-token"))
        .and(body_partial_json(json!({
            "kty": "RSA",
            "key_size": 4096,
            "key_ops": ["wrapKey", "unwrapKey"],
            "attributes": { "enabled": true },
            "tags": { "tenant": "t1", "purpose": "dek-wrapping" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(key_bundle("kek-t1")))
        .expect(1)
        .mount(&server)
        .await;

    let props = KekProperties::new(4096, Duration::from_secs(86_400));
    let kek_id = wrapper_for(&server).create_kek("t1", &props).await.unwrap();
    assert_eq!(kek_id.as_str().len(), 32);
}

#[tokio::test]
async fn test_wrap_sends_base64url_dek() {
    let server = MockServer::start().await;
    let kek = KekId::new("abc123");
    let dek = DataKey::from_slice(&[0xFB; 32]).unwrap();
    let name = kek_key_name("t1", &kek);

    Mock::given(method("POST"))
        .and(path(format!("/keys/{name}/wrapkey")))
        .and(body_partial_json(json!({
            "alg": "RSA-OAEP-256",
            "value": URL_SAFE_NO_PAD.encode([0xFB; 32])
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kid": "https://kv.example/keys/kek-t1-abc123/6a1f",
            "value": URL_SAFE_NO_PAD.encode(b"opaque-wrapped-bytes")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let wrapped = wrapper_for(&server).wrap(&dek, &kek, "t1").await.unwrap();
    assert_eq!(wrapped, b"opaque-wrapped-bytes");
}

#[tokio::test]
async fn test_unwrap_returns_data_key() {
    let server = MockServer::start().await;
    let kek = KekId::new("abc123");

    Mock::given(method("POST"))
        .and(path("/keys/kek-t1-abc123/unwrapkey"))
        .and(body_partial_json(json!({
            "alg": "RSA-OAEP-256",
            "value": URL_SAFE_NO_PAD.encode(b"opaque-wrapped-bytes")
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": URL_SAFE_NO_PAD.encode([0x11; 32])
        })))
        .mount(&server)
        .await;

    let dek = wrapper_for(&server)
        .unwrap(b"opaque-wrapped-bytes", &kek, "t1")
        .await
        .unwrap();
    assert_eq!(dek.expose(), &[0x11; 32]);
}

#[tokio::test]
async fn test_unwrap_rejects_wrong_length_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/keys/kek-t1-abc123/unwrapkey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": URL_SAFE_NO_PAD.encode([0x11; 16])
        })))
        .mount(&server)
        .await;

    let err = wrapper_for(&server)
        .unwrap(b"wrapped", &KekId::new("abc123"), "t1")
        .await
        .unwrap_err();
    match err {
        KeyWrapError::UnwrapFailed { kek_id, source } => {
            assert_eq!(kek_id, "abc123");
            assert!(matches!(*source, KeyWrapError::InvalidKeyMaterial(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_missing_kek_is_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/keys/kek-t1-gone/unwrapkey"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "KeyNotFound", "message": "A key with (name/id) was not found" }
        })))
        .mount(&server)
        .await;

    let err = wrapper_for(&server)
        .unwrap(b"wrapped", &KekId::new("gone"), "t1")
        .await
        .unwrap_err();
    assert!(matches!(err, KeyWrapError::UnwrapFailed { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_forbidden_maps_to_permission_denied() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/keys/kek-t1-abc123/wrapkey"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": "Forbidden", "message": "caller lacks wrapKey permission" }
        })))
        .mount(&server)
        .await;

    let err = wrapper_for(&server)
        .wrap(&DataKey::generate(), &KekId::new("abc123"), "t1")
        .await
        .unwrap_err();
    match err {
        KeyWrapError::WrapFailed { source, .. } => {
            assert!(matches!(*source, KeyWrapError::PermissionDenied(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_provisioning_failure_carries_tenant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/keys/kek-t9-[0-9a-f]{32}/create$"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let props = KekProperties::new(4096, Duration::from_secs(86_400));
    let err = wrapper_for(&server).create_kek("t9", &props).await.unwrap_err();
    match &err {
        KeyWrapError::KeyProvisioningFailed { tenant, .. } => assert_eq!(tenant, "t9"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_rotate_creates_then_retires() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/keys/kek-t1-[0-9a-f]{32}/create$"))
        .and(body_partial_json(json!({ "tags": { "rotated_from": "old1" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(key_bundle("kek-t1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/keys/kek-t1-old1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(key_bundle("kek-t1-old1")))
        .expect(1)
        .mount(&server)
        .await;

    let new_kek = wrapper_for(&server)
        .rotate_kek(&KekId::new("old1"), "t1")
        .await
        .unwrap();
    assert_ne!(new_kek.as_str(), "old1");
}

#[tokio::test]
async fn test_retire_missing_kek_is_ok() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/keys/kek-t1-old1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(
        wrapper_for(&server)
            .retire_kek(&KekId::new("old1"), "t1")
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_circuit_opens_after_repeated_outages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/keys/kek-t1-abc123/wrapkey"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let wrapper = wrapper_for(&server);
    let kek = KekId::new("abc123");
    let dek = DataKey::generate();
    for _ in 0..3 {
        assert!(wrapper.wrap(&dek, &kek, "t1").await.is_err());
    }

    match wrapper.wrap(&dek, &kek, "t1").await.unwrap_err() {
        KeyWrapError::WrapFailed { source, .. } => {
            assert!(matches!(*source, KeyWrapError::CircuitBreakerOpen));
        }
        other => panic!("unexpected error: {other}"),
    }
}
