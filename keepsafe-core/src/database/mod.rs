//! Persistence layer for the vault.
//!
//! The storage traits describe the row operations the vault needs. They never
//! see plaintext sensitive fields: encryption happens in [`crate::vault`]
//! before rows reach a store. [`SqliteStore`] implements them over SQLite.

pub mod models;
pub mod schema;
pub mod store;

pub use models::{Category, CategorySet, Entry, User};
pub use schema::Database;
pub use store::SqliteStore;

use crate::consume::Consumer;
use crate::Result;

/// Reports whether a store runs inside a transaction.
///
/// Composite read-modify-write operations refuse to run otherwise.
pub trait Transactional {
    fn in_transaction(&self) -> bool;
}

/// Row operations on users.
pub trait UserStore {
    /// Insert `user` and return its new id. Fails if the name is taken.
    fn add_user(&self, user: &User) -> Result<i64>;

    fn user_by_id(&self, id: i64) -> Result<User>;

    fn user_by_name(&self, name: &str) -> Result<User>;

    /// Stream all users ordered by name.
    fn users(&self, consumer: &mut dyn Consumer<User>) -> Result<()>;

    fn update_user(&self, user: &User) -> Result<()>;

    fn remove_user(&self, name: &str) -> Result<()>;
}

/// Row operations on categories.
pub trait CategoryStore {
    fn add_category(&self, category: &Category) -> Result<i64>;

    fn category_by_id(&self, id: i64) -> Result<Category>;

    /// Categories of `owner` ordered by name.
    fn categories_by_owner(&self, owner: i64) -> Result<Vec<Category>>;

    /// Rename `category`. Rows with a different owner are left alone.
    fn update_category(&self, category: &Category) -> Result<()>;

    /// Delete category `id` if it belongs to `owner`.
    fn remove_category(&self, id: i64, owner: i64) -> Result<()>;
}

/// Row operations on already encrypted entries.
pub trait EntryStore {
    fn add_entry(&self, entry: &Entry) -> Result<i64>;

    fn entry_by_id(&self, id: i64) -> Result<Entry>;

    /// Stream the entries of `owner` ordered by id.
    fn entries_by_owner(&self, owner: i64, consumer: &mut dyn Consumer<Entry>) -> Result<()>;

    fn update_entry(&self, entry: &Entry) -> Result<()>;

    /// Delete entry `id` if it belongs to `owner`.
    fn remove_entry(&self, id: i64, owner: i64) -> Result<()>;
}
