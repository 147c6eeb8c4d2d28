//! Property-based tests for envelope encryption.

use envelope_crypto::{DataClassification, EnvelopeError, ENVELOPE_VERSION, MIN_ENVELOPE_LEN};
use proptest::prelude::*;
use test_utils::{
    EnvelopeFixture, payload_strategy, protected_classification_strategy,
    text_payload_strategy, unprotected_classification_strategy,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Protected payloads round-trip.
    #[test]
    fn prop_round_trip(
        payload in payload_strategy(),
        classification in protected_classification_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let fixture = EnvelopeFixture::new("T1");
            let framed = fixture.service.encrypt_bytes(&payload, classification).await.unwrap();
            let plain = fixture.service.decrypt_bytes(&framed, classification).await.unwrap();
            prop_assert_eq!(plain, payload);
            Ok(())
        })?;
    }

    /// Unprotected classifications are the identity in both directions.
    #[test]
    fn prop_pass_through(
        payload in payload_strategy(),
        classification in unprotected_classification_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let fixture = EnvelopeFixture::new("T1");
            prop_assert_eq!(
                &fixture.service.encrypt_bytes(&payload, classification).await.unwrap(),
                &payload
            );
            prop_assert_eq!(
                &fixture.service.decrypt_bytes(&payload, classification).await.unwrap(),
                &payload
            );
            prop_assert_eq!(fixture.secrets.get_count(), 0);
            Ok(())
        })?;
    }

    /// Envelopes are 29 bytes longer than the payload and start with version 1.
    #[test]
    fn prop_framing_layout(payload in payload_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let fixture = EnvelopeFixture::new("T1");
            let framed = fixture
                .service
                .encrypt_bytes(&payload, DataClassification::Protected)
                .await
                .unwrap();
            prop_assert_eq!(framed.len(), MIN_ENVELOPE_LEN + payload.len());
            prop_assert_eq!(framed[0], ENVELOPE_VERSION);
            Ok(())
        })?;
    }

    /// Flipping any bit of the tag or ciphertext fails authentication.
    #[test]
    fn prop_tamper_detected(
        payload in prop::collection::vec(any::<u8>(), 1..256),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let fixture = EnvelopeFixture::new("T1");
            let mut framed = fixture
                .service
                .encrypt_bytes(&payload, DataClassification::Protected)
                .await
                .unwrap();

            let tail = framed.len() - 13;
            let index = 13 + position.index(tail);
            framed[index] ^= 1 << bit;

            let err = fixture
                .service
                .decrypt_bytes(&framed, DataClassification::Protected)
                .await
                .unwrap_err();
            prop_assert!(matches!(err, EnvelopeError::AuthenticationFailed));
            Ok(())
        })?;
    }

    /// Anything shorter than the minimum frame is rejected as malformed.
    #[test]
    fn prop_short_input_rejected(
        input in prop::collection::vec(any::<u8>(), 0..MIN_ENVELOPE_LEN),
        classification in protected_classification_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let fixture = EnvelopeFixture::new("T1");
            let err = fixture.service.decrypt_bytes(&input, classification).await.unwrap_err();
            prop_assert!(
                matches!(err, EnvelopeError::InvalidFormat { len, .. } if len == input.len()),
                "unexpected error: {}",
                err
            );
            prop_assert_eq!(fixture.secrets.get_count(), 0);
            Ok(())
        })?;
    }

    /// Any version byte other than 1 is rejected.
    #[test]
    fn prop_unknown_version_rejected(
        payload in payload_strategy(),
        version in any::<u8>().prop_filter("not the current version", |v| *v != ENVELOPE_VERSION),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let fixture = EnvelopeFixture::new("T1");
            let mut framed = fixture
                .service
                .encrypt_bytes(&payload, DataClassification::Protected)
                .await
                .unwrap();
            framed[0] = version;

            let err = fixture
                .service
                .decrypt_bytes(&framed, DataClassification::Protected)
                .await
                .unwrap_err();
            prop_assert!(matches!(err, EnvelopeError::UnsupportedVersion(v) if v == version));
            Ok(())
        })?;
    }

    /// Text surfaces round-trip through base64.
    #[test]
    fn prop_text_round_trip(text in text_payload_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let fixture = EnvelopeFixture::new("T1");
            let ciphertext = fixture
                .service
                .encrypt_text(&text, DataClassification::OfficialSensitive)
                .await
                .unwrap();
            prop_assert_ne!(&ciphertext, &text);
            let plain = fixture
                .service
                .decrypt_text(&ciphertext, DataClassification::OfficialSensitive)
                .await
                .unwrap();
            prop_assert_eq!(plain, text);
            Ok(())
        })?;
    }
}

#[test]
fn test_version_two_rejected() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let fixture = EnvelopeFixture::new("T1");
        let mut framed = fixture
            .service
            .encrypt_bytes(b"payload", DataClassification::Protected)
            .await
            .unwrap();
        framed[0] = 2;
        assert!(matches!(
            fixture
                .service
                .decrypt_bytes(&framed, DataClassification::Protected)
                .await,
            Err(EnvelopeError::UnsupportedVersion(2))
        ));
    });
}
