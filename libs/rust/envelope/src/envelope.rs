//! Self-describing ciphertext framing.
//!
//! Layout: `version(1) || nonce(12) || tag(16) || ciphertext(N)`, where
//! `N` equals the plaintext length.

use crate::error::{EnvelopeError, EnvelopeResult};
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce, Tag};
use envelope_kms_client::DataKey;
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// The only supported framing version.
pub const ENVELOPE_VERSION: u8 = 1;

/// GCM nonce length.
pub const NONCE_LEN: usize = 12;

/// GCM tag length.
pub const TAG_LEN: usize = 16;

/// Smallest valid envelope: version, nonce and tag around an empty payload.
pub const MIN_ENVELOPE_LEN: usize = 1 + NONCE_LEN + TAG_LEN;

const NONCE_OFFSET: usize = 1;
const TAG_OFFSET: usize = NONCE_OFFSET + NONCE_LEN;

fn cipher(key: &DataKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.expose()))
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
///
/// # Errors
///
/// Returns [`EnvelopeError::Encryption`] if the AEAD rejects the input.
pub fn seal(key: &DataKey, plaintext: &[u8]) -> EnvelopeResult<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let mut framed = Vec::with_capacity(MIN_ENVELOPE_LEN + plaintext.len());
    framed.push(ENVELOPE_VERSION);
    framed.extend_from_slice(&nonce);
    framed.extend_from_slice(&[0u8; TAG_LEN]);
    framed.extend_from_slice(plaintext);

    let tag = cipher(key)
        .encrypt_in_place_detached(
            Nonce::from_slice(&nonce),
            b"",
            &mut framed[MIN_ENVELOPE_LEN..],
        )
        .map_err(|e| EnvelopeError::Encryption(e.to_string()))?;
    framed[TAG_OFFSET..MIN_ENVELOPE_LEN].copy_from_slice(&tag);

    Ok(framed)
}

/// A parsed, not yet authenticated envelope.
#[derive(Debug, Clone, Copy)]
pub struct Envelope<'a> {
    nonce: &'a [u8],
    tag: &'a [u8],
    ciphertext: &'a [u8],
}

impl<'a> Envelope<'a> {
    /// Split `framed` into its parts.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidFormat`] below 29 bytes and
    /// [`EnvelopeError::UnsupportedVersion`] for any version other than 1.
    pub fn parse(framed: &'a [u8]) -> EnvelopeResult<Self> {
        if framed.len() < MIN_ENVELOPE_LEN {
            return Err(EnvelopeError::InvalidFormat {
                len: framed.len(),
                min: MIN_ENVELOPE_LEN,
            });
        }
        if framed[0] != ENVELOPE_VERSION {
            return Err(EnvelopeError::UnsupportedVersion(framed[0]));
        }

        Ok(Self {
            nonce: &framed[NONCE_OFFSET..TAG_OFFSET],
            tag: &framed[TAG_OFFSET..MIN_ENVELOPE_LEN],
            ciphertext: &framed[MIN_ENVELOPE_LEN..],
        })
    }

    /// The 96-bit nonce.
    #[must_use]
    pub const fn nonce(&self) -> &'a [u8] {
        self.nonce
    }

    /// Ciphertext length, equal to the plaintext length.
    #[must_use]
    pub const fn payload_len(&self) -> usize {
        self.ciphertext.len()
    }

    /// Verify and decrypt under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::AuthenticationFailed`] if the tag does not
    /// verify.
    pub fn open(&self, key: &DataKey) -> EnvelopeResult<Vec<u8>> {
        let mut plaintext = Zeroizing::new(self.ciphertext.to_vec());
        cipher(key)
            .decrypt_in_place_detached(
                Nonce::from_slice(self.nonce),
                b"",
                &mut plaintext,
                Tag::from_slice(self.tag),
            )
            .map_err(|_| EnvelopeError::AuthenticationFailed)?;
        Ok(std::mem::take(&mut *plaintext))
    }
}

/// Parse, verify and decrypt `framed` under `key`.
///
/// # Errors
///
/// See [`Envelope::parse`] and [`Envelope::open`].
pub fn open(key: &DataKey, framed: &[u8]) -> EnvelopeResult<Vec<u8>> {
    Envelope::parse(framed)?.open(key)
}
