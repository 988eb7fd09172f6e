//! Encryption-aware vault operations.
//!
//! These functions sit between callers holding plaintext and the storage
//! traits holding ciphertext. Entries are encrypted on the way in and
//! decrypted on the way out; a store never sees a sensitive field in the
//! clear.
//!
//! Read-modify-write operations (`update_entry_with_etag`,
//! `change_password`, `update_category`, `remove_category`) must be given a
//! store that runs inside a transaction, e.g. the one handed out by
//! [`crate::Database::transact`]. Calling them on any other store is a bug
//! and panics.


use crate::consume;
use crate::crypto::Key;
use crate::database::{
    Category, CategoryStore, Entry, EntryStore, Transactional, User, UserStore,
};
use crate::{KeepsafeError, Result};
use tracing::{debug, info, warn};

fn require_transaction<S: Transactional + ?Sized>(store: &S, operation: &str) {
    assert!(
        store.in_transaction(),
        "{} must run inside a transaction",
        operation
    );
}

/// Encrypt a copy of `entry` under `key`, store it and return the new id.
pub fn add_entry<S: EntryStore + ?Sized>(store: &S, key: &Key, entry: &Entry) -> Result<i64> {
    let encrypted = entry.encrypt(key)?;
    store.add_entry(&encrypted)
}

/// Read and decrypt entry `id`.
///
/// The returned entry carries the etag of the stored row. An entry owned by
/// a different key is reported as `NoSuchId`, same as a missing one.
pub fn entry_by_id<S: EntryStore + ?Sized>(store: &S, id: i64, key: &Key) -> Result<Entry> {
    let mut entry = store.entry_by_id(id)?;
    entry.etag = entry.fingerprint()?;
    match entry.decrypt(key) {
        Ok(()) => Ok(entry),
        Err(KeepsafeError::KeyMismatch) => {
            debug!(entry_id = id, key_id = key.id(), "entry owned by another key");
            Err(KeepsafeError::NoSuchId)
        }
        Err(e) => Err(e),
    }
}

/// Encrypt `entry` and overwrite the stored row with the same id.
///
/// Checks neither ownership nor concurrent modification; use
/// [`update_entry_with_etag`] for edits made on behalf of a user.
pub fn update_entry<S: EntryStore + ?Sized>(store: &S, key: &Key, entry: &Entry) -> Result<()> {
    let encrypted = entry.encrypt(key)?;
    store.update_entry(&encrypted)
}

/// Apply `update` to entry `id` unless someone changed it since `tag` was
/// read.
///
/// `update` returns whether it changed anything. When it returns false
/// nothing is written and `tag` is not checked. Otherwise `tag` must equal
/// the etag of the stored row or the call fails with
/// `ConcurrentModification` and writes nothing.
///
/// # Panics
///
/// Panics if `store` is not inside a transaction.
pub fn update_entry_with_etag<S, F>(
    store: &S,
    id: i64,
    tag: u64,
    key: &Key,
    update: F,
) -> Result<()>
where
    S: EntryStore + Transactional + ?Sized,
    F: FnOnce(&mut Entry) -> bool,
{
    require_transaction(store, "update_entry_with_etag");
    let mut entry = entry_by_id(store, id, key)?;
    let etag = entry.etag;
    if !update(&mut entry) {
        debug!(entry_id = id, "update changed nothing");
        return Ok(());
    }
    if tag != etag {
        warn!(entry_id = id, "entry changed since it was read");
        return Err(KeepsafeError::ConcurrentModification);
    }
    entry.id = id;
    update_entry(store, key, &entry)?;
    info!(entry_id = id, "updated entry");
    Ok(())
}

/// Collapse whitespace runs to single spaces, trim and lowercase.
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn matches_query(entry: &Entry, pattern: &str) -> bool {
    if pattern.is_empty() {
        return true;
    }
    entry
        .url
        .iter()
        .chain([&entry.title, &entry.desc])
        .any(|field| normalize(field).contains(pattern))
}

/// Entries encrypted with key `owner` whose url, title or description
/// contains `query`, ordered by id.
///
/// Matching ignores case and whitespace differences; an empty query matches
/// everything. A nonzero `category` further restricts the result to members
/// of that category. Sensitive fields stay encrypted.
pub fn entries<S: EntryStore + ?Sized>(
    store: &S,
    owner: i64,
    query: &str,
    category: i64,
) -> Result<Vec<Entry>> {
    let pattern = normalize(query);
    let mut results: Vec<Entry> = Vec::new();
    store.entries_by_owner(
        owner,
        &mut consume::filter(&mut results, |entry: &Entry| {
            (category == 0 || entry.categories.contains(category)) && matches_query(entry, &pattern)
        }),
    )?;
    debug!(owner, found = results.len(), "searched entries");
    Ok(results)
}

/// Sort by title ignoring case and surrounding whitespace.
pub fn sort_by_title(entries: &mut [Entry]) {
    entries.sort_by_cached_key(|entry| entry.title.trim().to_lowercase());
}

/// Reverse in place; entries fetched in id order become newest first.
pub fn reverse(entries: &mut [Entry]) {
    entries.reverse();
}

/// Change the password of user `id` and return the stored user.
///
/// # Panics
///
/// Panics if `store` is not inside a transaction.
pub fn change_password<S>(store: &S, id: i64, old_password: &str, new_password: &str) -> Result<User>
where
    S: UserStore + Transactional + ?Sized,
{
    require_transaction(store, "change_password");
    let mut user = store.user_by_id(id)?;
    user.change_password(old_password, new_password)?;
    store.update_user(&user)?;
    info!(user_id = id, "changed password");
    Ok(user)
}

/// Rename category `id` and return its previous name.
///
/// If the category belongs to someone other than `owner` nothing changes
/// and the stored name is returned.
///
/// # Panics
///
/// Panics if `store` is not inside a transaction.
pub fn update_category<S>(store: &S, id: i64, owner: i64, new_name: &str) -> Result<String>
where
    S: CategoryStore + Transactional + ?Sized,
{
    require_transaction(store, "update_category");
    let mut category = store.category_by_id(id)?;
    if category.owner != owner {
        warn!(category_id = id, owner, "ignoring rename of category owned by someone else");
        return Ok(category.name);
    }
    let old_name = std::mem::replace(&mut category.name, new_name.to_string());
    store.update_category(&category)?;
    Ok(old_name)
}

/// Remove category `id` and return its name.
///
/// If the category belongs to someone other than `owner` nothing changes
/// and the stored name is returned.
///
/// # Panics
///
/// Panics if `store` is not inside a transaction.
pub fn remove_category<S>(store: &S, id: i64, owner: i64) -> Result<String>
where
    S: CategoryStore + Transactional + ?Sized,
{
    require_transaction(store, "remove_category");
    let category = store.category_by_id(id)?;
    if category.owner != owner {
        warn!(category_id = id, owner, "ignoring removal of category owned by someone else");
        return Ok(category.name);
    }
    store.remove_category(id, owner)?;
    Ok(category.name)
}

/// Add a category for `owner` and return it with its id.
pub fn add_category<S: CategoryStore + ?Sized>(store: &S, owner: i64, name: &str) -> Result<Category> {
    let mut category = Category {
        id: 0,
        owner,
        name: name.to_string(),
    };
    category.id = store.add_category(&category)?;
    Ok(category)
}

/// Decrypted entries of `key` whose password is `password`.
///
/// Entries that fail to decrypt are skipped.
pub fn find_by_password<S: EntryStore + ?Sized>(
    store: &S,
    key: &Key,
    password: &str,
) -> Result<Vec<Entry>> {
    let mut found: Vec<Entry> = Vec::new();
    store.entries_by_owner(
        key.id(),
        &mut consume::map_filter(&mut found, |mut entry: Entry| {
            if let Err(e) = entry.decrypt(key) {
                warn!(entry_id = entry.id, error = %e, "skipping entry that does not decrypt");
                return None;
            }
            (entry.password == password).then_some(entry)
        }),
    )?;
    Ok(found)
}

/// Create and store a user.
///
/// Without `master` the user gets a fresh key of its own. With
/// `master = Some((name, password))` the master's password is verified and
/// the new user shares the master's key and therefore its entries.
pub fn add_user<S: UserStore + ?Sized>(
    store: &S,
    name: &str,
    password: &str,
    master: Option<(&str, &str)>,
) -> Result<User> {
    let mut user = match master {
        None => User::init(name, password)?,
        Some((master_name, master_password)) => {
            let key = store.user_by_name(master_name)?.verify_password(master_password)?;
            User::init_with_key(name, password, &key)?
        }
    };
    user.id = store.add_user(&user)?;
    info!(user_id = user.id, owner = user.owner_id(), "added user");
    Ok(user)
}
