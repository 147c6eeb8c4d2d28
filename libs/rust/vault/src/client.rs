//! Vault KV v2 secret store with circuit breaker and token caching.

use crate::{
    config::{VaultAuth, VaultConfig},
    error::{SecretStoreError, SecretStoreResult},
    models::{
        AuthResponse, ErrorResponse, KvMetadataResponse, KvReadResponse, KvWriteOptions,
        KvWriteRequest, StoredSecretRef,
    },
    provider::{CreateOutcome, SecretLookup, SecretStore},
};
use async_trait::async_trait;
use envelope_common::{
    CircuitBreaker, HttpConfig, RetryConfig, RetryPolicy, Retryable, build_http_client,
};
use reqwest::{Client, Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

struct CachedToken {
    token: SecretString,
    expires_at: Option<Instant>,
}

/// Secret store backed by a Vault KV v2 mount.
pub struct VaultSecretStore {
    config: VaultConfig,
    http: Client,
    token: RwLock<Option<CachedToken>>,
    circuit_breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl VaultSecretStore {
    /// Create a new Vault secret store.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: VaultConfig) -> SecretStoreResult<Self> {
        config.validate()?;

        let http = build_http_client(&HttpConfig::default().with_timeout(config.timeout))?;
        let retry = RetryPolicy::new(
            RetryConfig::default()
                .with_max_retries(config.max_retries)
                .with_initial_delay(config.retry_delay),
        );

        Ok(Self {
            circuit_breaker: CircuitBreaker::new("vault", config.circuit_breaker()),
            token: RwLock::new(None),
            http,
            retry,
            config,
        })
    }

    /// Authenticate with the Kubernetes auth method.
    #[instrument(skip(self))]
    async fn authenticate(&self, role: &str, token_path: &str) -> SecretStoreResult<CachedToken> {
        let jwt = tokio::fs::read_to_string(token_path)
            .await
            .map_err(|e| SecretStoreError::auth_failed(e.to_string()))?;

        let url = format!("{}/v1/auth/kubernetes/login", self.config.addr);
        let body = serde_json::json!({ "role": role, "jwt": jwt.trim() });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SecretStoreError::unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SecretStoreError::auth_failed(format!("Status {status}: {text}")));
        }

        let auth: AuthResponse = response.json().await?;
        let ttl = Duration::from_secs(auth.auth.lease_duration);
        info!(ttl_secs = ttl.as_secs(), renewable = auth.auth.renewable, "Authenticated with Vault");

        Ok(CachedToken {
            token: SecretString::from(auth.auth.client_token),
            expires_at: Some(Instant::now() + ttl),
        })
    }

    async fn get_token(&self) -> SecretStoreResult<SecretString> {
        {
            let cached = self.token.read().await;
            if let Some(cached) = cached.as_ref() {
                let fresh = cached.expires_at.is_none_or(|exp| {
                    exp.saturating_duration_since(Instant::now()) > self.config.grace_period
                });
                if fresh {
                    return Ok(cached.token.clone());
                }
            }
        }

        let fetched = match &self.config.auth {
            VaultAuth::Token(token) => CachedToken {
                token: token.clone(),
                expires_at: None,
            },
            VaultAuth::Kubernetes { role, token_path } => {
                self.authenticate(role, token_path).await?
            }
        };

        let token = fetched.token.clone();
        *self.token.write().await = Some(fetched);
        Ok(token)
    }

    fn secret_path(&self, name: &str) -> String {
        format!("{}/data/{name}", self.config.kv_mount)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&KvWriteRequest<'_>>,
    ) -> SecretStoreResult<Response> {
        if !self.circuit_breaker.allow_request() {
            warn!(path, "Circuit breaker open for Vault");
            return Err(SecretStoreError::CircuitBreakerOpen);
        }

        let result = self.do_send(method, path, body).await;

        match &result {
            Ok(_) => self.circuit_breaker.record_success(),
            Err(e) if e.is_retryable() => self.circuit_breaker.record_failure(),
            Err(_) => {}
        }

        result
    }

    async fn do_send(
        &self,
        method: Method,
        path: &str,
        body: Option<&KvWriteRequest<'_>>,
    ) -> SecretStoreResult<Response> {
        let token = self.get_token().await?;
        let url = format!("{}/v1/{path}", self.config.addr);

        let mut request = self
            .http
            .request(method, &url)
            .header("X-Vault-Token", token.expose_secret());
        if let Some(b) = body {
            request = request.json(b);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SecretStoreError::Timeout(path.to_string())
            } else {
                SecretStoreError::unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        match status {
            // 404 is meaningful to callers and handled by them
            s if s.is_success() || s == StatusCode::NOT_FOUND => Ok(response),
            StatusCode::BAD_REQUEST => {
                let errors: ErrorResponse = response.json().await.unwrap_or_default();
                let message = errors.errors.join("; ");
                if message.contains("check-and-set") {
                    Err(SecretStoreError::Conflict(path.to_string()))
                } else {
                    Err(SecretStoreError::unavailable(format!("Status {status}: {message}")))
                }
            }
            StatusCode::FORBIDDEN => {
                // Cached token may have been revoked; force re-authentication
                *self.token.write().await = None;
                Err(SecretStoreError::PermissionDenied(path.to_string()))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(SecretStoreError::RateLimited),
            _ => {
                let text = response.text().await.unwrap_or_default();
                Err(SecretStoreError::unavailable(format!("Status {status}: {text}")))
            }
        }
    }

    async fn read_once(&self, path: &str) -> SecretStoreResult<SecretLookup> {
        let response = self.send(Method::GET, path, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(SecretLookup::NotFound);
        }

        let body: KvReadResponse = response.json().await?;
        match body.data.data {
            Some(secret) if !body.data.metadata.is_deleted() => {
                Ok(SecretLookup::Found(secret.value))
            }
            _ => Ok(SecretLookup::NotFound),
        }
    }

    /// Current version of `name` when it exists but is soft-deleted or
    /// destroyed. Such a secret reads as absent yet still fails `cas = 0`.
    async fn deleted_version(&self, name: &str) -> SecretStoreResult<Option<u32>> {
        let path = format!("{}/metadata/{name}", self.config.kv_mount);
        let response = self.send(Method::GET, &path, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: KvMetadataResponse = response.json().await?;
        Ok(body.data.deleted_current_version())
    }

    async fn write(&self, name: &str, value: &str, cas: Option<u32>) -> SecretStoreResult<()> {
        let path = self.secret_path(name);
        let body = KvWriteRequest {
            data: StoredSecretRef { value },
            options: cas.map(|cas| KvWriteOptions { cas }),
        };

        let response = self.send(Method::POST, &path, Some(&body)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SecretStoreError::invalid_config(format!(
                "KV mount '{}' not found",
                self.config.kv_mount
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for VaultSecretStore {
    #[instrument(skip(self))]
    async fn get_secret(&self, name: &str) -> SecretStoreResult<SecretLookup> {
        let path = self.secret_path(name);
        let lookup = self.retry.execute(|| self.read_once(&path)).await?;
        debug!(found = matches!(lookup, SecretLookup::Found(_)), "Read secret");
        Ok(lookup)
    }

    #[instrument(skip(self, value))]
    async fn set_secret(&self, name: &str, value: &str) -> SecretStoreResult<()> {
        self.write(name, value, None).await?;
        debug!("Wrote secret");
        Ok(())
    }

    #[instrument(skip(self, value))]
    async fn create_secret(&self, name: &str, value: &str) -> SecretStoreResult<CreateOutcome> {
        match self.write(name, value, Some(0)).await {
            Ok(()) => {
                debug!("Created secret");
                Ok(CreateOutcome::Created)
            }
            Err(SecretStoreError::Conflict(_)) => {
                let Some(version) = self.deleted_version(name).await? else {
                    debug!("Secret already exists");
                    return Ok(CreateOutcome::AlreadyExists);
                };
                match self.write(name, value, Some(version)).await {
                    Ok(()) => {
                        info!(deleted_version = version, "Recreated deleted secret");
                        Ok(CreateOutcome::Created)
                    }
                    Err(SecretStoreError::Conflict(_)) => {
                        debug!("Secret recreated concurrently");
                        Ok(CreateOutcome::AlreadyExists)
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }
}
