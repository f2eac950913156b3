//! Registry access for trusted catalogs and providers
//!
//! Both Office locations share the same layout: a root key whose sub-keys
//! each hold a handful of named values. [`RegistryRows`] flattens that into
//! one row per (sub-key, value) pair. There is no secondary index, so every
//! lookup is a scan over the rows.

mod catalog;
pub mod memory;
mod provider;
#[cfg(windows)]
pub mod windows;

pub use catalog::{same_url, CatalogEntry, CatalogStore, FLAGS_HIDDEN, FLAGS_VISIBLE};
pub use provider::{
    is_invalid_unique_id, provider_rows, scrub_providers, ANONYMOUS_UNIQUE_ID, STALE_AUTH_SUFFIX,
};

use serde::Serialize;
use std::fmt;
use std::io;

use crate::error::{Result, SideloaderError};

/// A registry value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RegistryValue {
    /// `REG_SZ` / `REG_EXPAND_SZ`
    String(String),
    /// `REG_DWORD`
    Dword(u32),
    /// Any other type, kept for display only
    Other { type_name: String, data: String },
}

impl RegistryValue {
    /// Registry type name, e.g. `REG_SZ`
    pub fn type_name(&self) -> &str {
        match self {
            RegistryValue::String(_) => "REG_SZ",
            RegistryValue::Dword(_) => "REG_DWORD",
            RegistryValue::Other { type_name, .. } => type_name,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RegistryValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_dword(&self) -> Option<u32> {
        match self {
            RegistryValue::Dword(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for RegistryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryValue::String(s) => f.write_str(s),
            RegistryValue::Dword(d) => write!(f, "{d}"),
            RegistryValue::Other { data, .. } => f.write_str(data),
        }
    }
}

/// One value of one sub-key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryRow {
    /// Sub-key name
    pub key: String,
    /// Value name
    pub attribute: String,
    /// Value data
    pub value: RegistryValue,
}

impl RegistryRow {
    pub fn value_type(&self) -> &str {
        self.value.type_name()
    }
}

/// An open registry key whose sub-keys can be listed, written and deleted
///
/// `values` reports `io::ErrorKind::NotFound` when the sub-key is gone.
pub trait RegistryKey {
    /// Names of the direct sub-keys
    fn subkey_names(&self) -> io::Result<Vec<String>>;

    /// Values of one sub-key, in enumeration order
    fn values(&self, subkey: &str) -> io::Result<Vec<(String, RegistryValue)>>;

    /// Create the sub-key if needed and write `values` into it
    fn set_values(&self, subkey: &str, values: &[(&str, RegistryValue)]) -> io::Result<()>;

    /// Delete a sub-key and everything below it
    fn delete_subkey(&self, subkey: &str) -> io::Result<()>;
}

/// The current user's registry hive
pub trait RegistryHive {
    type Key: RegistryKey;

    /// Open a key relative to `HKEY_CURRENT_USER`, `None` if it does not exist
    fn open(&self, path: &str) -> io::Result<Option<Self::Key>>;
}

/// Lazy walk over every value of every sub-key
///
/// Sub-key names are listed when the walk starts; values are read one
/// sub-key at a time as the iterator advances. A sub-key that disappears
/// before its turn is skipped.
pub struct RegistryRows<'a, K: ?Sized> {
    key: &'a K,
    path: &'a str,
    subkeys: std::vec::IntoIter<String>,
    current: std::vec::IntoIter<RegistryRow>,
}

impl<'a, K: RegistryKey + ?Sized> RegistryRows<'a, K> {
    pub fn new(key: &'a K, path: &'a str) -> Result<Self> {
        let subkeys = key
            .subkey_names()
            .map_err(|e| SideloaderError::registry(path, e))?;

        Ok(Self {
            key,
            path,
            subkeys: subkeys.into_iter(),
            current: Vec::new().into_iter(),
        })
    }
}

impl<K: RegistryKey + ?Sized> Iterator for RegistryRows<'_, K> {
    type Item = Result<RegistryRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.current.next() {
                return Some(Ok(row));
            }

            let subkey = self.subkeys.next()?;
            match self.key.values(&subkey) {
                Ok(values) => {
                    self.current = values
                        .into_iter()
                        .map(|(attribute, value)| RegistryRow {
                            key: subkey.clone(),
                            attribute,
                            value,
                        })
                        .collect::<Vec<_>>()
                        .into_iter();
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!(key = %subkey, "sub-key vanished during enumeration");
                }
                Err(e) => {
                    return Some(Err(SideloaderError::registry(
                        format!(r"{}\{}", self.path, subkey),
                        e,
                    )));
                }
            }
        }
    }
}

/// Walk every (sub-key, value) pair under an open key
pub fn enumerate<'a, K: RegistryKey + ?Sized>(
    key: &'a K,
    path: &'a str,
) -> Result<RegistryRows<'a, K>> {
    RegistryRows::new(key, path)
}
