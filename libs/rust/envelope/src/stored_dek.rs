//! Persisted form of a wrapped DEK: `{kek_id}:{base64(wrapped)}`.
//!
//! The wrapping KEK travels with the blob, so re-wrapping under a new KEK
//! is a single secret write. Values without a KEK id are bare base64 and
//! unwrap under the tenant's KEK reference.

use crate::error::{EnvelopeError, EnvelopeResult};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use envelope_kms_client::KekId;

const SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoredDek {
    pub(crate) kek_id: Option<KekId>,
    pub(crate) wrapped: Vec<u8>,
}

impl StoredDek {
    pub(crate) const fn new(kek_id: KekId, wrapped: Vec<u8>) -> Self {
        Self {
            kek_id: Some(kek_id),
            wrapped,
        }
    }

    pub(crate) fn encode(&self) -> String {
        let blob = STANDARD.encode(&self.wrapped);
        match &self.kek_id {
            Some(kek_id) => format!("{kek_id}{SEPARATOR}{blob}"),
            None => blob,
        }
    }

    // Standard base64 never contains the separator.
    pub(crate) fn parse(value: &str) -> EnvelopeResult<Self> {
        let (kek_id, blob) = match value.split_once(SEPARATOR) {
            Some((id, _)) if id.trim().is_empty() => {
                return Err(EnvelopeError::invalid_encoding("stored DEK has an empty KEK id"));
            }
            Some((id, blob)) => (Some(KekId::new(id)), blob),
            None => (None, value),
        };
        let wrapped = STANDARD
            .decode(blob)
            .map_err(|e| EnvelopeError::invalid_encoding(format!("stored DEK is not base64: {e}")))?;
        Ok(Self { kek_id, wrapped })
    }
}
