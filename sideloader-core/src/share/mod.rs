//! Network share management
//!
//! Exposes a local directory as a read-only disk share and derives the
//! `\\server\netname` URL Office uses to reach it. The OS share table is
//! the only source of truth: every call goes straight to the backend.

pub mod memory;
#[cfg(windows)]
pub mod windows;

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, SideloaderError};

/// Disk drive share type (`STYPE_DISKTREE`)
pub const STYPE_DISKTREE: u32 = 0;

/// Read permission (`ACCESS_READ`)
pub const ACCESS_READ: u32 = 0x01;

/// Unlimited concurrent connections (`SHI_USES_UNLIMITED`)
pub const SHI_USES_UNLIMITED: u32 = u32::MAX;

/// `NERR_DuplicateShare`: the share name is already in use
pub const NERR_DUPLICATE_SHARE: u32 = 2118;

/// `NERR_NetNameNotFound`: the share does not exist
pub const NERR_NET_NAME_NOT_FOUND: u32 = 2310;

/// A share table record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Share {
    /// Share name, the identity of the record
    pub name: String,
    /// Absolute directory path
    pub path: PathBuf,
    /// Share type bits
    pub share_type: u32,
    /// Permission bits
    pub permissions: u32,
    /// Connection limit
    pub max_uses: u32,
    /// Open connections (OS-managed)
    pub current_uses: u32,
    /// Free-form comment
    pub remark: String,
}

impl Share {
    /// A read-only disk-tree share with unlimited connections
    pub fn disk_tree(name: &str, path: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            path,
            share_type: STYPE_DISKTREE,
            permissions: ACCESS_READ,
            max_uses: SHI_USES_UNLIMITED,
            current_uses: 0,
            remark: String::new(),
        }
    }
}

/// Error code returned by a share table call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetApiError {
    pub operation: &'static str,
    pub code: u32,
}

impl NetApiError {
    pub fn is_duplicate_share(&self) -> bool {
        self.code == NERR_DUPLICATE_SHARE
    }

    pub fn is_not_found(&self) -> bool {
        self.code == NERR_NET_NAME_NOT_FOUND
    }
}

impl From<NetApiError> for SideloaderError {
    fn from(e: NetApiError) -> Self {
        SideloaderError::NetApi {
            operation: e.operation,
            code: e.code,
        }
    }
}

/// The OS share table of the local machine
pub trait ShareTable {
    /// Name of the local server
    fn server_name(&self) -> Result<String, NetApiError>;

    /// Every share, of any type
    fn enumerate(&self) -> Result<Vec<Share>, NetApiError>;

    /// Look up a share by name
    fn get(&self, name: &str) -> Result<Share, NetApiError>;

    /// Register a new share
    fn add(&self, share: &Share) -> Result<(), NetApiError>;

    /// Remove a share by name
    fn delete(&self, name: &str) -> Result<(), NetApiError>;
}

/// Share operations on top of a [`ShareTable`]
pub struct ShareManager<T> {
    table: T,
}

impl<T: ShareTable> ShareManager<T> {
    pub fn new(table: T) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// List shares, optionally keeping only one share type
    pub fn list_shares(&self, share_type: Option<u32>) -> Result<Vec<Share>> {
        let mut shares = self.table.enumerate()?;
        if let Some(share_type) = share_type {
            shares.retain(|s| s.share_type == share_type);
        }
        Ok(shares)
    }

    /// `\\<server>\<netname>` with the server name lower-cased
    pub fn share_url(&self, netname: &str) -> Result<String> {
        let server = self.table.server_name()?;
        Ok(format!(r"\\{}\{}", server.to_lowercase(), netname))
    }

    /// Share `path` as `netname`, creating the directory if needed
    ///
    /// An existing share with the same name counts as success.
    pub fn create_share(&self, netname: &str, path: &Path) -> Result<String> {
        let path = std::path::absolute(path).map_err(|e| SideloaderError::io(path, e))?;
        if !path.exists() {
            std::fs::create_dir_all(&path).map_err(|e| SideloaderError::io(&path, e))?;
        }

        let url = self.share_url(netname)?;
        match self.table.add(&Share::disk_tree(netname, path.clone())) {
            Ok(()) => {
                debug!(netname, url = %url, path = %path.display(), "add net share");
            }
            Err(e) if e.is_duplicate_share() => {
                debug!(netname, url = %url, path = %path.display(), "net share already exists");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(url)
    }

    /// Remove the share; a missing share is a no-op
    pub fn delete_share(&self, netname: &str) -> Result<bool> {
        match self.table.delete(netname) {
            Ok(()) => {
                debug!(netname, "remove net share");
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                debug!(netname, "net share does not exist");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a share by name
    pub fn get_share_by_name(&self, netname: &str) -> Result<Option<Share>> {
        match self.table.get(netname) {
            Ok(share) => Ok(Some(share)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
