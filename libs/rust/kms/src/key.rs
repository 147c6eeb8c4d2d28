//! Raw data-encryption key material.

use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256 key length in bytes.
pub const DEK_LEN: usize = 32;

/// A 256-bit data-encryption key, zero-filled when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DataKey([u8; DEK_LEN]);

impl DataKey {
    /// Generate a fresh key from the operating system CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut key = Self([0u8; DEK_LEN]);
        OsRng.fill_bytes(&mut key.0);
        key
    }

    /// Copy key material out of `bytes`. Returns `None` unless exactly 32 bytes.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let mut key = Self([0u8; DEK_LEN]);
        if bytes.len() != DEK_LEN {
            return None;
        }
        key.0.copy_from_slice(bytes);
        Some(key)
    }

    /// Borrow the raw key bytes.
    #[must_use]
    pub const fn expose(&self) -> &[u8; DEK_LEN] {
        &self.0
    }

    /// Whether every byte is zero.
    #[must_use]
    pub fn is_zeroed(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl PartialEq for DataKey {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for DataKey {}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(DataKey::generate(), DataKey::generate());
    }

    #[test]
    fn test_from_slice_requires_exact_length() {
        assert!(DataKey::from_slice(&[1u8; 31]).is_none());
        assert!(DataKey::from_slice(&[1u8; 33]).is_none());
        assert_eq!(DataKey::from_slice(&[7u8; 32]).unwrap().expose(), &[7u8; 32]);
    }

    #[test]
    fn test_zeroize_clears_material() {
        let mut key = DataKey::from_slice(&[9u8; 32]).unwrap();
        key.zeroize();
        assert!(key.is_zeroed());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = DataKey::from_slice(&[0xAB; 32]).unwrap();
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("171"));
    }
}
