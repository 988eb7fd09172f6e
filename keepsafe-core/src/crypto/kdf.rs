//! PBKDF2-HMAC-SHA256 key derivation for user passwords.
//!
//! Salt and iteration count are system-wide constants. Every user protects a
//! distinct random key, so the iteration count is the only work-factor lever.

use crate::crypto::{CryptoError, Result};
use hmac::Hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Salt shared by every password-derived wrapping key.
pub const DEFAULT_SALT: &[u8] = b"keepsafe.kdf.salt.v1";

/// Default PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: u32 = 10_000;

/// Derived key length in bytes.
pub const DERIVED_KEY_LEN: usize = 32;

const CHECKSUM_SALT_LEN: usize = 16;

/// Parameters for PBKDF2 key derivation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    pub salt: Vec<u8>,
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            salt: DEFAULT_SALT.to_vec(),
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl KdfParams {
    /// Verify that parameters are within acceptable ranges
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(CryptoError::KdfFailed(
                "Iteration count too low (minimum: 1)".to_string(),
            ));
        }
        if self.salt.is_empty() {
            return Err(CryptoError::KdfFailed("Salt must not be empty".to_string()));
        }
        Ok(())
    }
}

fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32, out: &mut [u8]) -> Result<()> {
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, iterations, out)
        .map_err(|e| CryptoError::KdfFailed(format!("PBKDF2 failed: {}", e)))
}

/// Derive a 256-bit key from a password.
pub fn derive_key(password: &[u8], params: &KdfParams) -> Result<[u8; DERIVED_KEY_LEN]> {
    params.validate()?;
    let mut key = [0u8; DERIVED_KEY_LEN];
    pbkdf2_sha256(password, &params.salt, params.iterations, &mut key)?;
    Ok(key)
}

/// Return `n` bytes from the OS random source.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; n];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Compute a salted, iterated keyed hash of `message`.
///
/// Output layout: `salt (16) || PBKDF2-HMAC-SHA256(message, salt, iterations) (32)`.
pub fn new_checksum(message: &[u8], iterations: u32) -> Result<Vec<u8>> {
    if iterations == 0 {
        return Err(CryptoError::KdfFailed(
            "Iteration count too low (minimum: 1)".to_string(),
        ));
    }
    let salt = random_bytes(CHECKSUM_SALT_LEN);
    let mut digest = [0u8; DERIVED_KEY_LEN];
    pbkdf2_sha256(message, &salt, iterations, &mut digest)?;

    let mut checksum = salt;
    checksum.extend_from_slice(&digest);
    Ok(checksum)
}

/// Check `checksum` against `message` in constant time.
pub fn verify_checksum(message: &[u8], checksum: &[u8], iterations: u32) -> bool {
    if checksum.len() != CHECKSUM_SALT_LEN + DERIVED_KEY_LEN || iterations == 0 {
        return false;
    }
    let (salt, expected) = checksum.split_at(CHECKSUM_SALT_LEN);
    let mut digest = [0u8; DERIVED_KEY_LEN];
    if pbkdf2_sha256(message, salt, iterations, &mut digest).is_err() {
        return false;
    }
    digest[..].ct_eq(expected).into()
}
