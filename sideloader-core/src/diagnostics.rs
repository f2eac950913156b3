//! Read-only snapshot of shares, catalogs, providers and installed add-ins

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, SideloaderError};
use crate::lifecycle::Sideloader;
use crate::manifest::{list_manifests, ListedManifest};
use crate::registry::{provider_rows, same_url, RegistryHive, RegistryRow};
use crate::share::{Share, ShareTable, STYPE_DISKTREE};

/// Host machine details
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub os: String,
    pub family: String,
    pub arch: String,
    pub server_name: String,
    pub version: String,
}

/// Manifests found in one catalog directory
#[derive(Debug, Clone, Serialize)]
pub struct AddinDirectory {
    pub path: PathBuf,
    pub manifests: Vec<ListedManifest>,
}

/// Everything `info` shows
#[derive(Debug, Clone, Serialize)]
pub struct InfoReport {
    pub system: SystemInfo,
    pub shares: Vec<Share>,
    pub providers: Vec<RegistryRow>,
    pub catalogs: Vec<RegistryRow>,
    pub addins: Vec<AddinDirectory>,
}

impl<R: RegistryHive, S: ShareTable> Sideloader<R, S> {
    /// Collect the current state without changing anything
    ///
    /// Add-ins are listed for `path` (the configured directory when `None`)
    /// and for every disk share whose URL is registered as a catalog.
    pub fn info(&self, path: Option<&Path>) -> Result<InfoReport> {
        let store = self.catalogs()?;
        let catalogs: Vec<RegistryRow> = store.enumerate()?.collect::<Result<_>>()?;
        let entries = store.entries()?;

        let provider_key = self.config().provider_key();
        let providers = match self
            .registry()
            .open(&provider_key)
            .map_err(|e| SideloaderError::registry(&provider_key, e))?
        {
            Some(key) => provider_rows(&key, &provider_key)?,
            None => Vec::new(),
        };

        let shares = self.shares().list_shares(Some(STYPE_DISKTREE))?;

        let mut dirs = vec![path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config().path.clone())];
        for share in &shares {
            let url = self.shares().share_url(&share.name)?;
            let registered = entries.iter().any(|entry| same_url(&entry.url, &url));
            if registered && !dirs.contains(&share.path) {
                dirs.push(share.path.clone());
            }
        }

        let addins = dirs
            .into_iter()
            .map(|dir| {
                Ok(AddinDirectory {
                    manifests: list_manifests(&dir)?,
                    path: dir,
                })
            })
            .collect::<Result<_>>()?;

        Ok(InfoReport {
            system: self.system_info()?,
            shares,
            providers,
            catalogs,
            addins,
        })
    }

    pub fn system_info(&self) -> Result<SystemInfo> {
        Ok(SystemInfo {
            os: std::env::consts::OS.to_string(),
            family: std::env::consts::FAMILY.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            server_name: self.shares().table().server_name()?,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}
