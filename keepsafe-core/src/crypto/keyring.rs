//! Keys and key wrapping.
//!
//! Implements the wrapping scheme used by user records:
//! Password → PBKDF2 → wrapping key → encrypts → raw vault key

use crate::crypto::{
    cipher::{self, KEY_SIZE},
    kdf::{derive_key, random_bytes, KdfParams},
    Result,
};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A symmetric key used to encrypt and decrypt the sensitive fields of an
/// entry.
///
/// `id` names the owner whose entries this key protects. Instances are
/// immutable and the key bytes are cleared from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Key {
    id: i64,
    value: Vec<u8>,
}

impl Key {
    /// Create a key from an owner id and raw key bytes
    pub fn new(id: i64, value: Vec<u8>) -> Self {
        Self { id, value }
    }

    /// Generate a random 256-bit key for `id`
    pub fn generate(id: i64) -> Self {
        Self::new(id, random_bytes(KEY_SIZE))
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// Get the raw key bytes (use sparingly)
    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

impl PartialEq for Key {
    /// Keys are equal when ids match and the bytes match; bytes are compared
    /// in constant time.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && bool::from(self.value.ct_eq(&other.value))
    }
}

impl Eq for Key {}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("id", &self.id)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Encrypt raw key bytes under a key derived from `password`.
pub fn wrap_key(value: &[u8], password: &str) -> Result<String> {
    let mut wrapping_key = derive_key(password.as_bytes(), &KdfParams::default())?;
    let wrapped = cipher::encrypt(value, &wrapping_key);
    wrapping_key.zeroize();
    wrapped
}

/// Recover raw key bytes wrapped by [`wrap_key`].
///
/// A wrong password usually fails here with `InvalidPadding`; when it does
/// not, the returned bytes are garbage and only a checksum comparison can
/// tell.
pub fn unwrap_key(wrapped: &str, password: &str) -> Result<Vec<u8>> {
    let mut wrapping_key = derive_key(password.as_bytes(), &KdfParams::default())?;
    let value = cipher::decrypt(wrapped, &wrapping_key);
    wrapping_key.zeroize();
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_equal() {
        let first = Key::new(1, vec![]);
        let second = Key::new(1, vec![]);
        let third = Key::new(2, vec![]);
        let fourth = Key::new(1, vec![0x3]);

        assert_eq!(first, first.clone());
        assert_eq!(first, second);
        assert_ne!(first, third);
        assert_ne!(first, fourth);
    }

    #[test]
    fn test_generate() {
        let key = Key::generate(7);
        assert_eq!(key.id(), 7);
        assert_eq!(key.value().len(), KEY_SIZE);
        assert_ne!(key, Key::generate(7));
    }

    #[test]
    fn test_debug_redacts_value() {
        let key = Key::new(3, vec![0xAB; 32]);
        let printed = format!("{:?}", key);
        assert!(printed.contains("redacted"));
        assert!(!printed.contains("171"));
    }

    #[test]
    fn test_wrap_unwrap() {
        let key = Key::generate(0);
        let wrapped = wrap_key(key.value(), "correct horse").unwrap();
        assert_eq!(unwrap_key(&wrapped, "correct horse").unwrap(), key.value());

        // same key, same password, different ciphertext
        assert_ne!(wrapped, wrap_key(key.value(), "correct horse").unwrap());

        if let Ok(value) = unwrap_key(&wrapped, "battery staple") {
            assert_ne!(value, key.value());
        }
    }
}
