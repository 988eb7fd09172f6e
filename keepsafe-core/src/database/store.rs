//! SQLite implementation of the storage traits.

use crate::consume::Consumer;
use crate::database::{
    Category, CategorySet, CategoryStore, Entry, EntryStore, Transactional, User, UserStore,
};
use crate::{DatabaseError, KeepsafeError, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

const USER_COLUMNS: &str = "id, owner, name, key, checksum";
const ENTRY_COLUMNS: &str =
    "id, owner, url, title, \"desc\", uname, password, special, categories";

/// Store bound to a connection or to an open transaction.
pub struct SqliteStore<'c> {
    conn: &'c Connection,
    in_transaction: bool,
}

impl<'c> SqliteStore<'c> {
    pub(crate) fn new(conn: &'c Connection, in_transaction: bool) -> Self {
        Self {
            conn,
            in_transaction,
        }
    }
}

impl Transactional for SqliteStore<'_> {
    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

fn text(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        owner: row.get::<_, Option<i64>>(1)?.unwrap_or_default(),
        name: text(row, 2)?,
        key: text(row, 3)?,
        checksum: text(row, 4)?,
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: text(row, 2)?,
    })
}

/// Columns as read; categories are parsed outside the rusqlite callback so
/// a malformed list surfaces as a crate error.
struct EntryRow {
    entry: Entry,
    categories: String,
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<EntryRow> {
    let url = text(row, 2)?;
    Ok(EntryRow {
        entry: Entry {
            id: row.get(0)?,
            owner: row.get(1)?,
            url: if url.is_empty() { None } else { Some(url) },
            title: text(row, 3)?,
            desc: text(row, 4)?,
            uname: text(row, 5)?,
            password: text(row, 6)?,
            special: text(row, 7)?,
            categories: CategorySet::new(),
            etag: 0,
        },
        categories: text(row, 8)?,
    })
}

impl EntryRow {
    fn into_entry(self) -> Result<Entry> {
        let mut entry = self.entry;
        entry.categories = self.categories.parse().map_err(|e: KeepsafeError| {
            DatabaseError::CorruptRow {
                table: "entry",
                id: entry.id,
                reason: e.to_string(),
            }
        })?;
        entry.etag = entry.fingerprint()?;
        Ok(entry)
    }
}

fn expect_changed(changed: usize) -> Result<()> {
    if changed == 0 {
        return Err(KeepsafeError::NoSuchId);
    }
    Ok(())
}

impl UserStore for SqliteStore<'_> {
    fn add_user(&self, user: &User) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO user (owner, name, key, checksum) VALUES (?1, ?2, ?3, ?4)",
                params![user.owner, user.name, user.key, user.checksum],
            )
            .map_err(DatabaseError::Sqlite)?;
        let id = self.conn.last_insert_rowid();
        debug!(user_id = id, owner = user.owner, "added user");
        Ok(id)
    }

    fn user_by_id(&self, id: i64) -> Result<User> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM user WHERE id = ?1", USER_COLUMNS),
                [id],
                user_from_row,
            )
            .optional()
            .map_err(DatabaseError::Sqlite)?
            .ok_or(KeepsafeError::NoSuchId)
    }

    fn user_by_name(&self, name: &str) -> Result<User> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM user WHERE name = ?1", USER_COLUMNS),
                [name],
                user_from_row,
            )
            .optional()
            .map_err(DatabaseError::Sqlite)?
            .ok_or(KeepsafeError::NoSuchId)
    }

    fn users(&self, consumer: &mut dyn Consumer<User>) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM user ORDER BY name", USER_COLUMNS))
            .map_err(DatabaseError::Sqlite)?;
        let rows = stmt
            .query_map([], user_from_row)
            .map_err(DatabaseError::Sqlite)?;
        for row in rows {
            if !consumer.can_consume() {
                break;
            }
            consumer.consume(row.map_err(DatabaseError::Sqlite)?);
        }
        Ok(())
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE user SET owner = ?1, name = ?2, key = ?3, checksum = ?4 WHERE id = ?5",
                params![user.owner, user.name, user.key, user.checksum, user.id],
            )
            .map_err(DatabaseError::Sqlite)?;
        expect_changed(changed)?;
        debug!(user_id = user.id, "updated user");
        Ok(())
    }

    fn remove_user(&self, name: &str) -> Result<()> {
        let removed = self
            .conn
            .execute("DELETE FROM user WHERE name = ?1", [name])
            .map_err(DatabaseError::Sqlite)?;
        debug!(removed, "removed user");
        Ok(())
    }
}

impl CategoryStore for SqliteStore<'_> {
    fn add_category(&self, category: &Category) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO category (owner, name) VALUES (?1, ?2)",
                params![category.owner, category.name],
            )
            .map_err(DatabaseError::Sqlite)?;
        let id = self.conn.last_insert_rowid();
        debug!(category_id = id, owner = category.owner, "added category");
        Ok(id)
    }

    fn category_by_id(&self, id: i64) -> Result<Category> {
        self.conn
            .query_row(
                "SELECT id, owner, name FROM category WHERE id = ?1",
                [id],
                category_from_row,
            )
            .optional()
            .map_err(DatabaseError::Sqlite)?
            .ok_or(KeepsafeError::NoSuchId)
    }

    fn categories_by_owner(&self, owner: i64) -> Result<Vec<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, owner, name FROM category WHERE owner = ?1 ORDER BY name")
            .map_err(DatabaseError::Sqlite)?;
        let categories = stmt
            .query_map([owner], category_from_row)
            .map_err(DatabaseError::Sqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(DatabaseError::Sqlite)?;
        Ok(categories)
    }

    fn update_category(&self, category: &Category) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE category SET name = ?1 WHERE id = ?2 AND owner = ?3",
                params![category.name, category.id, category.owner],
            )
            .map_err(DatabaseError::Sqlite)?;
        debug!(category_id = category.id, changed, "updated category");
        Ok(())
    }

    fn remove_category(&self, id: i64, owner: i64) -> Result<()> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM category WHERE id = ?1 AND owner = ?2",
                params![id, owner],
            )
            .map_err(DatabaseError::Sqlite)?;
        debug!(category_id = id, removed, "removed category");
        Ok(())
    }
}

impl EntryStore for SqliteStore<'_> {
    fn add_entry(&self, entry: &Entry) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO entry (owner, url, title, \"desc\", uname, password, special, categories)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.owner,
                    entry.url.as_deref().unwrap_or(""),
                    entry.title,
                    entry.desc,
                    entry.uname,
                    entry.password,
                    entry.special,
                    entry.categories.to_string(),
                ],
            )
            .map_err(DatabaseError::Sqlite)?;
        let id = self.conn.last_insert_rowid();
        debug!(entry_id = id, owner = entry.owner, "added entry");
        Ok(id)
    }

    fn entry_by_id(&self, id: i64) -> Result<Entry> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM entry WHERE id = ?1", ENTRY_COLUMNS),
                [id],
                entry_from_row,
            )
            .optional()
            .map_err(DatabaseError::Sqlite)?
            .ok_or(KeepsafeError::NoSuchId)?
            .into_entry()
    }

    fn entries_by_owner(&self, owner: i64, consumer: &mut dyn Consumer<Entry>) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM entry WHERE owner = ?1 ORDER BY id",
                ENTRY_COLUMNS
            ))
            .map_err(DatabaseError::Sqlite)?;
        let rows = stmt
            .query_map([owner], entry_from_row)
            .map_err(DatabaseError::Sqlite)?;
        for row in rows {
            if !consumer.can_consume() {
                break;
            }
            consumer.consume(row.map_err(DatabaseError::Sqlite)?.into_entry()?);
        }
        Ok(())
    }

    fn update_entry(&self, entry: &Entry) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE entry SET owner = ?1, url = ?2, title = ?3, \"desc\" = ?4, uname = ?5,
                 password = ?6, special = ?7, categories = ?8 WHERE id = ?9",
                params![
                    entry.owner,
                    entry.url.as_deref().unwrap_or(""),
                    entry.title,
                    entry.desc,
                    entry.uname,
                    entry.password,
                    entry.special,
                    entry.categories.to_string(),
                    entry.id,
                ],
            )
            .map_err(DatabaseError::Sqlite)?;
        expect_changed(changed)?;
        debug!(entry_id = entry.id, owner = entry.owner, "updated entry");
        Ok(())
    }

    fn remove_entry(&self, id: i64, owner: i64) -> Result<()> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM entry WHERE id = ?1 AND owner = ?2",
                params![id, owner],
            )
            .map_err(DatabaseError::Sqlite)?;
        debug!(entry_id = id, removed, "removed entry");
        Ok(())
    }
}
