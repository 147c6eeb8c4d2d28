//! Key Vault REST client with circuit breaker.
//!
//! KEKs are RSA keys restricted to `wrapKey`/`unwrapKey`; wrapping uses
//! RSA-OAEP-256 and values travel base64url-encoded.

use crate::{
    config::KeyVaultConfig,
    error::{KeyWrapError, KeyWrapResult},
    key::DataKey,
    models::{
        CreateKeyRequest, ErrorResponse, KekId, KekProperties, KeyAttributes, KeyBundle,
        KeyOperationRequest, KeyOperationResult, WRAP_ALGORITHM, kek_key_name,
    },
    provider::KeyWrapper,
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use envelope_common::{CircuitBreaker, HttpConfig, Retryable, build_http_client};
use reqwest::{Client, Method, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use zeroize::Zeroizing;

/// Key-wrapping authority backed by a Key Vault REST endpoint.
pub struct KeyVaultWrapper {
    config: KeyVaultConfig,
    http: Client,
    circuit_breaker: CircuitBreaker,
}

impl KeyVaultWrapper {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: KeyVaultConfig) -> KeyWrapResult<Self> {
        config.validate()?;
        let http = build_http_client(&HttpConfig::default().with_timeout(config.timeout))?;

        Ok(Self {
            circuit_breaker: CircuitBreaker::new("key-vault", config.circuit_breaker()),
            http,
            config,
        })
    }

    fn key_url(&self, name: &str, operation: Option<&str>) -> String {
        let base = self.config.url.trim_end_matches('/');
        let suffix = operation.map(|op| format!("/{op}")).unwrap_or_default();
        format!("{base}/keys/{name}{suffix}?api-version={}", self.config.api_version)
    }

    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        url: &str,
        name: &str,
        body: Option<&B>,
    ) -> KeyWrapResult<Response> {
        if !self.circuit_breaker.allow_request() {
            warn!(key = name, "Circuit breaker open for Key Vault");
            return Err(KeyWrapError::CircuitBreakerOpen);
        }

        let result = self.do_send(method, url, name, body).await;

        match &result {
            Ok(_) => self.circuit_breaker.record_success(),
            Err(e) if e.is_retryable() => self.circuit_breaker.record_failure(),
            Err(_) => {}
        }

        result
    }

    async fn do_send<B: Serialize + Sync>(
        &self,
        method: Method,
        url: &str,
        name: &str,
        body: Option<&B>,
    ) -> KeyWrapResult<Response> {
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(self.config.access_token.expose_secret());
        if let Some(b) = body {
            request = request.json(b);
        }

        let response = request
            .send()
            .await
            .map_err(|e| KeyWrapError::unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail: ErrorResponse = response.json().await.unwrap_or_default();
        let message = format!("Status {status}: {} {}", detail.error.code, detail.error.message);
        Err(match status {
            StatusCode::NOT_FOUND => KeyWrapError::KeyNotFound(name.to_string()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                KeyWrapError::PermissionDenied(message)
            }
            StatusCode::TOO_MANY_REQUESTS => KeyWrapError::RateLimited,
            s if s.is_server_error() => KeyWrapError::unavailable(message),
            _ => KeyWrapError::Rejected(message),
        })
    }

    async fn key_operation(
        &self,
        operation: &str,
        name: &str,
        input: &[u8],
    ) -> KeyWrapResult<Zeroizing<Vec<u8>>> {
        let encoded = Zeroizing::new(URL_SAFE_NO_PAD.encode(input));
        let body = KeyOperationRequest {
            alg: WRAP_ALGORITHM,
            value: encoded.as_str(),
        };
        let url = self.key_url(name, Some(operation));

        let response = self.send(Method::POST, &url, name, Some(&body)).await?;
        let result: KeyOperationResult = response.json().await?;
        let value = Zeroizing::new(result.value);

        URL_SAFE_NO_PAD
            .decode(value.as_bytes())
            .map(Zeroizing::new)
            .map_err(|e| KeyWrapError::InvalidKeyMaterial(e.to_string()))
    }

    async fn provision(&self, tenant: &str, properties: &KekProperties) -> KeyWrapResult<KekId> {
        let kek_id = KekId::generate();
        let name = kek_key_name(tenant, &kek_id);
        let body = CreateKeyRequest {
            kty: "RSA",
            key_size: properties.key_size,
            key_ops: ["wrapKey", "unwrapKey"],
            attributes: KeyAttributes {
                enabled: true,
                exp: Some(properties.expires_on.timestamp()),
            },
            tags: properties.audit_tags(tenant),
        };
        let url = self.key_url(&name, Some("create"));

        let response = self.send(Method::POST, &url, &name, Some(&body)).await?;
        let bundle: KeyBundle = response.json().await?;
        info!(tenant, kek_id = %kek_id, kid = %bundle.key.kid, "Created KEK");
        Ok(kek_id)
    }
}

#[async_trait]
impl KeyWrapper for KeyVaultWrapper {
    #[instrument(skip(self, dek), fields(kek_id = %kek_id))]
    async fn wrap(&self, dek: &DataKey, kek_id: &KekId, tenant: &str) -> KeyWrapResult<Vec<u8>> {
        let name = kek_key_name(tenant, kek_id);
        match self.key_operation("wrapkey", &name, dek.expose()).await {
            Ok(mut wrapped) => Ok(std::mem::take(&mut *wrapped)),
            Err(e) => {
                error!(tenant, kek_id = %kek_id, error = %e, "DEK wrap failed");
                Err(KeyWrapError::wrap_failed(kek_id.as_str(), e))
            }
        }
    }

    #[instrument(skip(self, wrapped), fields(kek_id = %kek_id))]
    async fn unwrap(&self, wrapped: &[u8], kek_id: &KekId, tenant: &str) -> KeyWrapResult<DataKey> {
        let name = kek_key_name(tenant, kek_id);
        let result = self
            .key_operation("unwrapkey", &name, wrapped)
            .await
            .and_then(|raw| {
                DataKey::from_slice(&raw).ok_or_else(|| {
                    KeyWrapError::InvalidKeyMaterial(format!("unwrapped key is {} bytes", raw.len()))
                })
            });

        result.map_err(|e| {
            error!(tenant, kek_id = %kek_id, error = %e, "DEK unwrap failed");
            KeyWrapError::unwrap_failed(kek_id.as_str(), e)
        })
    }

    #[instrument(skip(self, properties), fields(key_size = properties.key_size))]
    async fn create_kek(&self, tenant: &str, properties: &KekProperties) -> KeyWrapResult<KekId> {
        self.provision(tenant, properties).await.map_err(|e| {
            error!(tenant, error = %e, "KEK provisioning failed");
            KeyWrapError::provisioning_failed(tenant, e)
        })
    }

    #[instrument(skip(self), fields(old_kek_id = %old_kek_id))]
    async fn rotate_kek(&self, old_kek_id: &KekId, tenant: &str) -> KeyWrapResult<KekId> {
        let properties = KekProperties::new(self.config.kek_size, self.config.kek_lifetime)
            .with_tag("rotated_from", old_kek_id.as_str());
        let new_kek_id = self.create_kek(tenant, &properties).await?;

        if let Err(e) = self.retire_kek(old_kek_id, tenant).await {
            warn!(tenant, old_kek_id = %old_kek_id, error = %e, "Old KEK not retired, still active");
        }

        info!(tenant, old_kek_id = %old_kek_id, new_kek_id = %new_kek_id, "Rotated KEK");
        Ok(new_kek_id)
    }

    #[instrument(skip(self), fields(kek_id = %kek_id))]
    async fn retire_kek(&self, kek_id: &KekId, tenant: &str) -> KeyWrapResult<()> {
        let name = kek_key_name(tenant, kek_id);
        let url = self.key_url(&name, None);

        match self.send::<()>(Method::DELETE, &url, &name, None).await {
            Ok(_) => {
                info!(tenant, kek_id = %kek_id, "Soft-deleted KEK");
                Ok(())
            }
            Err(KeyWrapError::KeyNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
