//! Shared proptest generators.

use envelope_crypto::{DataClassification, TenantId};
use proptest::prelude::*;

/// Generate valid tenant identifiers, mixed case with `_` and `-`.
pub fn tenant_id_strategy() -> impl Strategy<Value = TenantId> {
    "[A-Za-z][A-Za-z0-9_-]{0,31}".prop_filter_map("tenant id must be non-empty", |id| {
        TenantId::new(id).ok()
    })
}

/// Generate any classification level.
pub fn classification_strategy() -> impl Strategy<Value = DataClassification> {
    prop::sample::select(DataClassification::ALL.to_vec())
}

/// Generate classification levels that require encryption.
pub fn protected_classification_strategy() -> impl Strategy<Value = DataClassification> {
    prop_oneof![
        Just(DataClassification::OfficialSensitive),
        Just(DataClassification::Protected),
    ]
}

/// Generate classification levels that pass through unchanged.
pub fn unprotected_classification_strategy() -> impl Strategy<Value = DataClassification> {
    prop_oneof![
        Just(DataClassification::Unofficial),
        Just(DataClassification::Official),
    ]
}

/// Generate binary payloads, including the empty one.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

/// Generate non-empty text payloads such as identity attributes.
pub fn text_payload_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[0-9]{8}-[0-9]{4}",
        "[A-Z][a-z]{1,20} [A-Z][a-z]{1,20}",
        "[0-9]{4}-[0-9]{2}-[0-9]{2}",
        "\\PC{1,128}",
    ]
}

/// Generate dotted field identifiers.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    ("[a-z]{3,12}", "[a-z_]{3,20}").prop_map(|(entity, field)| format!("{entity}.{field}"))
}
