//! AES-256-CBC envelope for sensitive fields.
//!
//! Uses AES-256-CBC with:
//! - 256-bit key
//! - 128-bit random IV per call, prepended to the ciphertext
//! - PKCS7 padding
//! - Standard base64 text encoding of `IV || ciphertext`

use crate::crypto::{kdf::random_bytes, CryptoError, Result};
use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Cipher block size in bytes; also the IV length.
pub const BLOCK_SIZE: usize = 16;

/// Required key length in bytes.
pub const KEY_SIZE: usize = 32;

/// Add PKCS7 padding to `data` in place.
///
/// A full block of padding is appended when `data` is already block aligned,
/// so the pad length is always between 1 and `BLOCK_SIZE`.
pub fn pkcs7_pad(data: &mut Vec<u8>) {
    let pad_len = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    data.resize(data.len() + pad_len, pad_len as u8);
}

/// Remove PKCS7 padding from `data` in place.
///
/// Returns `CryptoError::InvalidPadding` and leaves `data` untouched if the
/// buffer is not padded.
pub fn pkcs7_unpad(data: &mut Vec<u8>) -> Result<()> {
    let len = data.len();
    if len == 0 || len % BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidPadding);
    }
    let pad_byte = data[len - 1];
    let pad_len = pad_byte as usize;
    if pad_len == 0 || pad_len > BLOCK_SIZE {
        return Err(CryptoError::InvalidPadding);
    }
    if data[len - pad_len..].iter().any(|&b| b != pad_byte) {
        return Err(CryptoError::InvalidPadding);
    }
    data.truncate(len - pad_len);
    Ok(())
}

fn check_key(key: &[u8]) -> Result<()> {
    if key.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            got: key.len(),
        });
    }
    Ok(())
}

/// Encrypt `plain` with `key` and return base64 text.
///
/// Each call draws a fresh IV from the OS random source, so encrypting the
/// same plaintext twice yields different text.
pub fn encrypt(plain: &[u8], key: &[u8]) -> Result<String> {
    check_key(key)?;

    let mut padded = plain.to_vec();
    pkcs7_pad(&mut padded);

    let iv = random_bytes(BLOCK_SIZE);
    let cipher = Aes256CbcEnc::new_from_slices(key, &iv).map_err(|_| {
        CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            got: key.len(),
        }
    })?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<NoPadding>(&padded);

    let mut framed = Vec::with_capacity(BLOCK_SIZE + ciphertext.len());
    framed.extend_from_slice(&iv);
    framed.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(framed))
}

/// Decrypt base64 text produced by [`encrypt`].
///
/// Corrupted or tampered ciphertext is rejected with
/// `CryptoError::InvalidPadding` rather than returned as garbage.
pub fn decrypt(encoded: &str, key: &[u8]) -> Result<Vec<u8>> {
    check_key(key)?;

    let framed = STANDARD.decode(encoded)?;
    if framed.len() < BLOCK_SIZE {
        return Err(CryptoError::InvalidPadding);
    }
    let (iv, body) = framed.split_at(BLOCK_SIZE);
    if body.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidPadding);
    }

    let cipher = Aes256CbcDec::new_from_slices(key, iv).map_err(|_| {
        CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            got: key.len(),
        }
    })?;
    let mut plain = cipher
        .decrypt_padded_vec_mut::<NoPadding>(body)
        .map_err(|_| CryptoError::InvalidPadding)?;
    pkcs7_unpad(&mut plain)?;
    Ok(plain)
}

/// Encrypt a string using `key`
pub fn encrypt_string(plain: &str, key: &[u8]) -> Result<String> {
    encrypt(plain.as_bytes(), key)
}

/// Decrypt to a string using `key`
pub fn decrypt_to_string(encoded: &str, key: &[u8]) -> Result<String> {
    let bytes = decrypt(encoded, key)?;
    String::from_utf8(bytes).map_err(|_| CryptoError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> Vec<u8> {
        random_bytes(KEY_SIZE)
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        for plain in ["", "a", "exactly sixteen!", "Hello, World! This is a test.", "nul\0inside"] {
            let encoded = encrypt_string(plain, &key).unwrap();
            assert_eq!(decrypt_to_string(&encoded, &key).unwrap(), plain);
        }
    }

    #[test]
    fn test_different_ivs() {
        let key = test_key();
        let first = encrypt_string("Same data", &key).unwrap();
        let second = encrypt_string("Same data", &key).unwrap();

        assert_ne!(first, second);
        assert_eq!(decrypt_to_string(&first, &key).unwrap(), "Same data");
        assert_eq!(decrypt_to_string(&second, &key).unwrap(), "Same data");
    }

    #[test]
    fn test_iv_prefixed_layout() {
        let key = test_key();
        let encoded = encrypt(b"0123456789abcdef", &key).unwrap();
        let framed = STANDARD.decode(encoded).unwrap();
        // IV, one data block, one full block of padding
        assert_eq!(framed.len(), 3 * BLOCK_SIZE);
    }

    #[test]
    fn test_wrong_key_never_returns_plaintext() {
        let key1 = test_key();
        let key2 = test_key();
        let encoded = encrypt_string("Secret data", &key1).unwrap();

        match decrypt_to_string(&encoded, &key2) {
            Ok(plain) => assert_ne!(plain, "Secret data"),
            Err(e) => assert!(matches!(
                e,
                CryptoError::InvalidPadding | CryptoError::InvalidUtf8
            )),
        }
    }

    #[test]
    fn test_pad_lengths() {
        let mut empty = Vec::new();
        pkcs7_pad(&mut empty);
        assert_eq!(empty, vec![16u8; 16]);

        let mut short = b"abc".to_vec();
        pkcs7_pad(&mut short);
        assert_eq!(short.len(), 16);
        assert!(short[3..].iter().all(|&b| b == 13));

        let mut aligned = vec![7u8; 32];
        pkcs7_pad(&mut aligned);
        assert_eq!(aligned.len(), 48);

        pkcs7_unpad(&mut aligned).unwrap();
        assert_eq!(aligned, vec![7u8; 32]);
    }

    #[test]
    fn test_unpad_rejects_bad_padding() {
        // not block aligned
        let mut data = vec![1u8; 15];
        assert!(matches!(pkcs7_unpad(&mut data), Err(CryptoError::InvalidPadding)));

        // pad length larger than a block
        let mut data = vec![17u8; 32];
        assert!(matches!(pkcs7_unpad(&mut data), Err(CryptoError::InvalidPadding)));

        // zero pad length
        let mut data = vec![0u8; 16];
        assert!(matches!(pkcs7_unpad(&mut data), Err(CryptoError::InvalidPadding)));

        // preceding pad bytes disagree
        let mut data = vec![0u8; 16];
        data[15] = 4;
        data[14] = 4;
        data[13] = 3;
        data[12] = 4;
        assert!(matches!(pkcs7_unpad(&mut data), Err(CryptoError::InvalidPadding)));
        assert_eq!(data.len(), 16);

        let mut empty = Vec::new();
        assert!(matches!(pkcs7_unpad(&mut empty), Err(CryptoError::InvalidPadding)));
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let key = test_key();
        let encoded = encrypt_string("Original data", &key).unwrap();
        let mut framed = STANDARD.decode(encoded).unwrap();

        // Truncating to a non-aligned body is always rejected.
        framed.pop();
        let truncated = STANDARD.encode(&framed);
        assert!(matches!(
            decrypt(&truncated, &key),
            Err(CryptoError::InvalidPadding)
        ));

        // Only an IV and nothing else.
        let iv_only = STANDARD.encode(&framed[..BLOCK_SIZE]);
        assert!(matches!(decrypt(&iv_only, &key), Err(CryptoError::InvalidPadding)));

        let too_short = STANDARD.encode([1u8, 2, 3]);
        assert!(matches!(decrypt(&too_short, &key), Err(CryptoError::InvalidPadding)));
    }

    #[test]
    fn test_corrupted_pad_byte_rejected() {
        let key = test_key();
        // "abc" pads to a single block whose last byte is 13. Flipping bits in
        // the IV flips the same bits of the decrypted block.
        let encoded = encrypt(b"abc", &key).unwrap();
        let framed = STANDARD.decode(encoded).unwrap();

        for corrupt_to in [17u8, 200, 14, 0] {
            let mut tampered = framed.clone();
            tampered[BLOCK_SIZE - 1] ^= 13 ^ corrupt_to;
            let result = decrypt(&STANDARD.encode(&tampered), &key);
            assert!(
                matches!(result, Err(CryptoError::InvalidPadding)),
                "pad byte {} accepted",
                corrupt_to
            );
        }
    }

    #[test]
    fn test_bad_base64_and_key_length() {
        let key = test_key();
        assert!(matches!(decrypt("not base64!!", &key), Err(CryptoError::Encoding(_))));
        assert!(matches!(
            encrypt(b"data", &key[..16]),
            Err(CryptoError::InvalidKeyLength { expected: 32, got: 16 })
        ));
    }
}
