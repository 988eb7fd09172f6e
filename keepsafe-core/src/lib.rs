//! Keepsafe Core Library
//!
//! This library provides the core functionality for the keepsafe password
//! vault: the cipher envelope and key derivation, the user/category/entry
//! models, owner-scoped storage with optimistic concurrency, and the import
//! and configuration plumbing used by the admin tools.

pub mod config;
pub mod consume;
pub mod crypto;
pub mod database;
pub mod import;
pub mod platform;
pub mod vault;

pub use config::KeepsafeConfig;
pub use crypto::{CryptoError, Key};
pub use database::{
    Category, CategorySet, CategoryStore, Database, Entry, EntryStore, SqliteStore,
    Transactional, User, UserStore,
};

use thiserror::Error;

/// Result type for keepsafe operations
pub type Result<T> = std::result::Result<T, KeepsafeError>;

/// General error type for keepsafe operations
#[derive(Error, Debug)]
pub enum KeepsafeError {
    #[error("No such Id.")]
    NoSuchId,

    #[error("Concurrent modification.")]
    ConcurrentModification,

    #[error("Wrong password.")]
    WrongPassword,

    #[error("Key mismatch.")]
    KeyMismatch,

    #[error("Crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the persistence layer
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt row {table}#{id}: {reason}")]
    CorruptRow {
        table: &'static str,
        id: i64,
        reason: String,
    },
}
