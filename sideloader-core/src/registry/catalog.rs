//! Trusted catalog bookkeeping
//!
//! Each catalog is a sub-key named by a GUID holding `Id`, `Url` and
//! `Flags`. The URL is the lookup key, and at most one entry per URL is
//! expected; when several exist the first one found wins. UNC server and
//! share names are case-insensitive, so URLs are compared the same way.

use serde::Serialize;
use tracing::debug;

use super::{enumerate, RegistryHive, RegistryKey, RegistryRow, RegistryRows, RegistryValue};
use crate::error::{Result, SideloaderError};

/// `Flags` value that shows the catalog in the Office add-in menu
pub const FLAGS_VISIBLE: u32 = 0;

/// `Flags` value that hides the catalog from the Office add-in menu
pub const FLAGS_HIDDEN: u32 = 1;

const ATTR_ID: &str = "Id";
const ATTR_URL: &str = "Url";
const ATTR_FLAGS: &str = "Flags";

/// A registered trusted catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub id: String,
    pub url: String,
    pub flags: u32,
}

/// Whether two share URLs name the same share
pub fn same_url(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// The trusted catalogs key, opened once per operation
pub struct CatalogStore<K> {
    key: K,
    path: String,
}

impl<K: RegistryKey> CatalogStore<K> {
    /// Open the catalogs key; a missing key means Office is not installed
    pub fn open<H: RegistryHive<Key = K>>(hive: &H, path: &str) -> Result<Self> {
        let key = hive
            .open(path)
            .map_err(|e| SideloaderError::registry(path, e))?
            .ok_or_else(|| SideloaderError::HostNotInstalled {
                key: path.to_string(),
            })?;

        Ok(Self {
            key,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Every (sub-key, value) row under the catalogs key
    pub fn enumerate(&self) -> Result<RegistryRows<'_, K>> {
        enumerate(&self.key, &self.path)
    }

    /// Sub-key name of the first catalog whose `Url` equals `url`
    pub fn find_by_url(&self, url: &str) -> Result<Option<String>> {
        for row in self.enumerate()? {
            let row = row?;
            let matches = row.value.as_str().map(|v| same_url(v, url)).unwrap_or(false);
            if row.attribute == ATTR_URL && matches {
                return Ok(Some(row.key));
            }
        }
        debug!(url, "can not find catalog");
        Ok(None)
    }

    /// Register `url`, reusing the existing entry for it if there is one
    pub fn upsert(&self, url: &str, hide: bool) -> Result<String> {
        let id = match self.find_by_url(url)? {
            Some(id) => id,
            None => new_catalog_id(),
        };
        let flags = if hide { FLAGS_HIDDEN } else { FLAGS_VISIBLE };

        self.key
            .set_values(
                &id,
                &[
                    (ATTR_ID, RegistryValue::String(id.clone())),
                    (ATTR_URL, RegistryValue::String(url.to_string())),
                    (ATTR_FLAGS, RegistryValue::Dword(flags)),
                ],
            )
            .map_err(|e| SideloaderError::registry(format!(r"{}\{}", self.path, id), e))?;

        debug!(id = %id, url, hide, "add catalog");
        Ok(id)
    }

    /// Unregister `url`; returns the removed id, `None` if nothing matched
    pub fn remove_by_url(&self, url: &str) -> Result<Option<String>> {
        let Some(id) = self.find_by_url(url)? else {
            return Ok(None);
        };

        match self.key.delete_subkey(&id) {
            Ok(()) => {
                debug!(key = %id, url, "remove catalog");
                Ok(Some(id))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(key = %id, url, "catalog vanished before removal");
                Ok(None)
            }
            Err(e) => Err(SideloaderError::registry(
                format!(r"{}\{}", self.path, id),
                e,
            )),
        }
    }

    /// Registered catalogs, grouped from the raw rows
    pub fn entries(&self) -> Result<Vec<CatalogEntry>> {
        let mut entries: Vec<CatalogEntry> = Vec::new();
        for row in self.enumerate()? {
            let RegistryRow {
                key,
                attribute,
                value,
            } = row?;

            if entries.last().map(|e| e.id != key).unwrap_or(true) {
                entries.push(CatalogEntry {
                    id: key.clone(),
                    url: String::new(),
                    flags: FLAGS_VISIBLE,
                });
            }
            if let Some(entry) = entries.last_mut() {
                match attribute.as_str() {
                    ATTR_URL => entry.url = value.to_string(),
                    ATTR_FLAGS => entry.flags = value.as_dword().unwrap_or(FLAGS_VISIBLE),
                    _ => {}
                }
            }
        }
        Ok(entries)
    }
}

/// Fresh catalog id in the registry's `{GUID}` form
fn new_catalog_id() -> String {
    format!("{{{}}}", uuid::Uuid::new_v4()).to_uppercase()
}
