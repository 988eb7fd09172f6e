//! Vault models: users, categories and entries.

use crate::crypto::{
    cipher::{decrypt_to_string, encrypt_string},
    kdf::DEFAULT_ITERATIONS,
    new_checksum, unwrap_key, verify_checksum, wrap_key, CryptoError, Key,
};
use crate::{DatabaseError, KeepsafeError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// A login account.
///
/// `key` holds the owner's raw key bytes wrapped under a key derived from
/// this user's password. `checksum` authenticates the raw key bytes and does
/// not change when the password does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    /// 0 for a self-mastering user, otherwise the id of the master whose key
    /// this user shares.
    pub owner: i64,
    pub name: String,
    pub key: String,
    pub checksum: String,
}

impl User {
    /// Create a self-mastering user protected by a fresh random key.
    pub fn init(name: &str, password: &str) -> Result<Self> {
        Self::init_with_key(name, password, &Key::generate(0))
    }

    /// Create a user that shares `key`.
    pub fn init_with_key(name: &str, password: &str, key: &Key) -> Result<Self> {
        let wrapped = wrap_key(key.value(), password)?;
        let checksum = new_checksum(key.value(), DEFAULT_ITERATIONS)?;
        Ok(Self {
            id: 0,
            owner: key.id(),
            name: name.to_string(),
            key: wrapped,
            checksum: STANDARD.encode(checksum),
        })
    }

    /// Verify `password` and return the key it unlocks.
    pub fn verify_password(&self, password: &str) -> Result<Key> {
        let value = match unwrap_key(&self.key, password) {
            Ok(value) => Zeroizing::new(value),
            Err(CryptoError::InvalidPadding) => return Err(KeepsafeError::WrongPassword),
            Err(e) => return Err(e.into()),
        };
        let checksum = STANDARD
            .decode(&self.checksum)
            .map_err(CryptoError::from)?;
        if !verify_checksum(&value, &checksum, DEFAULT_ITERATIONS) {
            return Err(KeepsafeError::WrongPassword);
        }
        Ok(Key::new(self.owner_id(), value.to_vec()))
    }

    /// Re-wrap the key under `new_password`. The user is left untouched
    /// unless `old_password` verifies.
    pub fn change_password(&mut self, old_password: &str, new_password: &str) -> Result<()> {
        let key = self.verify_password(old_password)?;
        self.key = wrap_key(key.value(), new_password)?;
        Ok(())
    }

    /// Id of the key this user unlocks: `owner` when set, else `id`.
    pub fn owner_id(&self) -> i64 {
        if self.owner != 0 {
            self.owner
        } else {
            self.id
        }
    }
}

/// A tag scoped to an owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub owner: i64,
    pub name: String,
}

/// Set of category ids an entry belongs to.
///
/// Persisted as the comma-joined ascending id list, e.g. `"3,7"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CategorySet(BTreeSet<i64>);

impl CategorySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: i64) -> bool {
        self.0.insert(id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.0.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<i64> for CategorySet {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}

impl FromStr for CategorySet {
    type Err = KeepsafeError;

    fn from_str(s: &str) -> Result<Self> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<i64>().map_err(|_| {
                    KeepsafeError::InvalidInput(format!("invalid category id '{}'", part))
                })
            })
            .collect()
    }
}

/// A vault entry.
///
/// `uname`, `password` and `special` are ciphertext whenever the entry is
/// read from or written to a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub id: i64,
    /// Id of the key that encrypted the sensitive fields.
    pub owner: i64,
    pub url: Option<String>,
    pub title: String,
    pub desc: String,
    pub uname: String,
    pub password: String,
    pub special: String,
    pub categories: CategorySet,
    /// Fingerprint of the stored row, filled in on read. Never persisted.
    pub etag: u64,
}

impl Entry {
    /// Return a copy with the sensitive fields encrypted under `key` and
    /// `owner` set to the key's id.
    pub fn encrypt(&self, key: &Key) -> Result<Entry> {
        let mut encrypted = self.clone();
        encrypted.uname = encrypt_string(&self.uname, key.value())?;
        encrypted.password = encrypt_string(&self.password, key.value())?;
        encrypted.special = encrypt_string(&self.special, key.value())?;
        encrypted.owner = key.id();
        Ok(encrypted)
    }

    /// Decrypt the sensitive fields in place.
    ///
    /// Fails with `KeyMismatch` without touching any field when `key` does not
    /// belong to this entry's owner.
    pub fn decrypt(&mut self, key: &Key) -> Result<()> {
        if self.owner != key.id() {
            return Err(KeepsafeError::KeyMismatch);
        }
        let uname = decrypt_to_string(&self.uname, key.value())?;
        let password = decrypt_to_string(&self.password, key.value())?;
        let special = decrypt_to_string(&self.special, key.value())?;
        self.uname = uname;
        self.password = password;
        self.special = special;
        Ok(())
    }

    /// Checksum of the persisted fields, used as an etag.
    pub fn fingerprint(&self) -> Result<u64> {
        let persisted = (
            self.id,
            self.owner,
            self.url.as_deref().unwrap_or(""),
            &self.title,
            &self.desc,
            &self.uname,
            &self.password,
            &self.special,
            self.categories.to_string(),
        );
        let encoded = bincode::serialize(&persisted)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let digest = Sha256::digest(&encoded);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        Ok(u64::from_be_bytes(head))
    }
}
