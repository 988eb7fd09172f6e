//! Bulk import of plaintext entries.
//!
//! Input is a JSON array of objects:
//!
//! ```json
//! [{"url": "https://example.com", "title": "Example", "desc": "",
//!   "uname": "me", "password": "secret", "special": ""}]
//! ```
//!
//! Every field is optional and defaults to the empty string. Capitalized
//! field names (`Url`, `UName`, ...) as written by older exports are accepted
//! too. A non-empty `url` must be a well-formed URI reference or the whole
//! import fails.

use crate::crypto::Key;
use crate::database::{Entry, EntryStore};
use crate::{vault, DatabaseError, KeepsafeError, Result};
use serde::Deserialize;
use std::io::Read;
use tracing::info;

/// One entry as it appears in an import file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImportEntry {
    #[serde(alias = "Url")]
    pub url: String,
    #[serde(alias = "Title")]
    pub title: String,
    #[serde(alias = "Desc")]
    pub desc: String,
    #[serde(alias = "UName", alias = "Uname")]
    pub uname: String,
    #[serde(alias = "Password")]
    pub password: String,
    #[serde(alias = "Special")]
    pub special: String,
}

/// Check that `raw` is a URI reference: absolute (`https://host/path`) or
/// relative (`example.com/login`).
///
/// Rejects control characters, malformed `%` escapes, an empty scheme and
/// whitespace in the host. Empty input is no url at all.
pub fn parse_url(raw: &str) -> Result<Option<String>> {
    let invalid =
        |reason: &str| KeepsafeError::InvalidInput(format!("invalid url {:?}: {}", raw, reason));

    if raw.is_empty() {
        return Ok(None);
    }
    if raw.chars().any(|c| c.is_ascii_control()) {
        return Err(invalid("control character"));
    }
    if raw.starts_with(':') {
        return Err(invalid("missing scheme"));
    }

    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                return Err(invalid("malformed escape"));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    if let Some((_, rest)) = raw.split_once("://") {
        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if host.chars().any(char::is_whitespace) {
            return Err(invalid("whitespace in host"));
        }
    }
    Ok(Some(raw.to_string()))
}

impl TryFrom<ImportEntry> for Entry {
    type Error = KeepsafeError;

    fn try_from(imported: ImportEntry) -> Result<Self> {
        Ok(Self {
            url: parse_url(&imported.url)?,
            title: imported.title,
            desc: imported.desc,
            uname: imported.uname,
            password: imported.password,
            special: imported.special,
            ..Entry::default()
        })
    }
}

/// Parse an import file.
pub fn parse_entries<R: Read>(reader: R) -> Result<Vec<ImportEntry>> {
    let entries = serde_json::from_reader(reader)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
    Ok(entries)
}

/// Encrypt every entry in `reader` under `key` and add it to `store`.
///
/// Returns the number of entries added. Run it inside
/// [`crate::Database::transact`] to make the import all-or-nothing.
pub fn import_entries<S, R>(store: &S, key: &Key, reader: R) -> Result<usize>
where
    S: EntryStore + ?Sized,
    R: Read,
{
    let entries = parse_entries(reader)?
        .into_iter()
        .map(Entry::try_from)
        .collect::<Result<Vec<_>>>()?;
    let count = entries.len();
    for entry in &entries {
        vault::add_entry(store, key, entry)?;
    }
    info!(count, owner = key.id(), "imported entries");
    Ok(count)
}
