//! Provider entries that keep add-ins from loading
//!
//! Office records an identity binding per catalog source under `WEF\Providers`.
//! Anonymous bindings and stale ADAL bindings make add-ins fail with
//! `APP ERROR`; deleting them lets Office rebuild the binding.
//! See <https://learn.microsoft.com/office/troubleshoot/installation/cannot-install-office-add-in>.

use tracing::debug;

use super::{enumerate, RegistryHive, RegistryKey, RegistryRow};
use crate::error::{Result, SideloaderError};

/// `UniqueId` recorded for anonymous providers
pub const ANONYMOUS_UNIQUE_ID: &str = "Anonymous";

/// `UniqueId` suffix of stale authentication-bound providers
pub const STALE_AUTH_SUFFIX: &str = "_ADAL";

const ATTR_UNIQUE_ID: &str = "UniqueId";

/// Whether a provider `UniqueId` blocks add-in loading
pub fn is_invalid_unique_id(value: &str) -> bool {
    value == ANONYMOUS_UNIQUE_ID || value.ends_with(STALE_AUTH_SUFFIX)
}

/// Delete every provider sub-key with an invalid `UniqueId`
///
/// A missing providers key is a no-op. Returns the rows that were removed.
pub fn scrub_providers<H: RegistryHive>(hive: &H, path: &str) -> Result<Vec<RegistryRow>> {
    let Some(key) = hive
        .open(path)
        .map_err(|e| SideloaderError::registry(path, e))?
    else {
        debug!(subkey = path, "subkey not found");
        return Ok(Vec::new());
    };

    let mut invalid = Vec::new();
    for row in enumerate(&key, path)? {
        let row = row?;
        let is_invalid = row.attribute == ATTR_UNIQUE_ID
            && row.value.as_str().map(is_invalid_unique_id).unwrap_or(false);
        if is_invalid {
            invalid.push(row);
        }
    }

    let mut removed = Vec::new();
    for row in invalid {
        let subkey = format!(r"{}\{}", path, row.key);
        debug!(subkey = %subkey, attribute = %row.attribute, value = %row.value, "delete invalid key");
        match key.delete_subkey(&row.key) {
            Ok(()) => removed.push(row),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(subkey = %subkey, "provider vanished before removal");
            }
            Err(e) => return Err(SideloaderError::registry(subkey, e)),
        }
    }

    Ok(removed)
}

/// The `UniqueId` rows of every provider, for display
pub fn provider_rows<K: RegistryKey>(key: &K, path: &str) -> Result<Vec<RegistryRow>> {
    enumerate(key, path)?
        .filter(|row| {
            row.as_ref()
                .map(|r| r.attribute == ATTR_UNIQUE_ID)
                .unwrap_or(true)
        })
        .collect()
}
