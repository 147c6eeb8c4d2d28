//! Shared test utilities for the tenant envelope-encryption crates.
//!
//! This crate provides:
//! - Proptest generators for tenants, classifications and payloads
//! - Test doubles that simulate races and slow collaborators
//! - A fixture wiring the envelope service to in-memory collaborators

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::expect_used)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use fixtures::EnvelopeFixture;
pub use generators::*;
