//! Cryptographic primitives for the vault.
//!
//! This module provides:
//! - AES-256-CBC envelope with PKCS7 padding and base64 text encoding
//! - PBKDF2-HMAC-SHA256 key derivation and iterated checksums
//! - The `Key` type and key wrapping under a password

pub mod cipher;
pub mod kdf;
pub mod keyring;

pub use cipher::{decrypt, decrypt_to_string, encrypt, encrypt_string, pkcs7_pad, pkcs7_unpad};
pub use kdf::{derive_key, new_checksum, random_bytes, verify_checksum, KdfParams};
pub use keyring::{unwrap_key, wrap_key, Key};

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("no valid PKCS7 padding")]
    InvalidPadding,

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Invalid base64 encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Decrypted data is not valid UTF-8")]
    InvalidUtf8,

    #[error("Key derivation failed: {0}")]
    KdfFailed(String),
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
