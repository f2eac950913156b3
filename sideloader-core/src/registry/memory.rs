//! In-memory registry hive
//!
//! Holds keys two levels deep (root key, sub-key, values), which is all the
//! Office locations need. Clones share state, so a test can keep a handle
//! and inspect what an operation wrote.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::rc::Rc;

use super::{RegistryHive, RegistryKey, RegistryValue};

type Values = Vec<(String, RegistryValue)>;

/// A registry hive held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    keys: Rc<RefCell<BTreeMap<String, BTreeMap<String, Values>>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty root key
    pub fn create_key(&self, path: &str) {
        self.keys.borrow_mut().entry(path.to_string()).or_default();
    }

    /// Whether a root key exists
    pub fn has_key(&self, path: &str) -> bool {
        self.keys.borrow().contains_key(path)
    }

    /// Write a sub-key with its values, creating the root key if needed
    pub fn insert(&self, path: &str, subkey: &str, values: &[(&str, RegistryValue)]) {
        let mut keys = self.keys.borrow_mut();
        let entry = keys
            .entry(path.to_string())
            .or_default()
            .entry(subkey.to_string())
            .or_default();
        for (name, value) in values {
            match entry.iter_mut().find(|(n, _)| n == name) {
                Some((_, existing)) => *existing = value.clone(),
                None => entry.push((name.to_string(), value.clone())),
            }
        }
    }

    /// Remove a sub-key, returning whether it existed
    pub fn remove(&self, path: &str, subkey: &str) -> bool {
        self.keys
            .borrow_mut()
            .get_mut(path)
            .and_then(|subkeys| subkeys.remove(subkey))
            .is_some()
    }

    /// Sub-key names under a root key
    pub fn subkeys(&self, path: &str) -> Vec<String> {
        self.keys
            .borrow()
            .get(path)
            .map(|subkeys| subkeys.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Look up one value
    pub fn value(&self, path: &str, subkey: &str, name: &str) -> Option<RegistryValue> {
        self.keys
            .borrow()
            .get(path)?
            .get(subkey)?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }
}

/// Handle to a root key of a [`MemoryRegistry`]
#[derive(Debug, Clone)]
pub struct MemoryKey {
    registry: MemoryRegistry,
    path: String,
}

fn not_found(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{what} not found"))
}

impl RegistryKey for MemoryKey {
    fn subkey_names(&self) -> io::Result<Vec<String>> {
        if !self.registry.has_key(&self.path) {
            return Err(not_found(&self.path));
        }
        Ok(self.registry.subkeys(&self.path))
    }

    fn values(&self, subkey: &str) -> io::Result<Vec<(String, RegistryValue)>> {
        self.registry
            .keys
            .borrow()
            .get(&self.path)
            .and_then(|subkeys| subkeys.get(subkey))
            .cloned()
            .ok_or_else(|| not_found(subkey))
    }

    fn set_values(&self, subkey: &str, values: &[(&str, RegistryValue)]) -> io::Result<()> {
        if !self.registry.has_key(&self.path) {
            return Err(not_found(&self.path));
        }
        self.registry.insert(&self.path, subkey, values);
        Ok(())
    }

    fn delete_subkey(&self, subkey: &str) -> io::Result<()> {
        if self.registry.remove(&self.path, subkey) {
            Ok(())
        } else {
            Err(not_found(subkey))
        }
    }
}

impl RegistryHive for MemoryRegistry {
    type Key = MemoryKey;

    fn open(&self, path: &str) -> io::Result<Option<MemoryKey>> {
        if !self.has_key(path) {
            return Ok(None);
        }
        Ok(Some(MemoryKey {
            registry: self.clone(),
            path: path.to_string(),
        }))
    }
}
