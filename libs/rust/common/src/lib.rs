//! Shared plumbing for the tenant envelope-encryption crates.
//!
//! This crate provides centralized implementations for:
//! - Retryability classification and retry policies with exponential backoff
//! - Circuit breakers guarding the remote key-management endpoints
//! - HTTP client configuration and building
//! - Tracing subscriber setup

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod circuit_breaker;
pub mod http;
pub mod retry;
pub mod tracing_config;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use http::{HttpConfig, build_http_client};
pub use retry::{RetryConfig, RetryPolicy, Retryable};
pub use tracing_config::{TracingConfig, init_tracing};
