//! Catalog lifecycle: add, remove and repair
//!
//! Each operation is one synchronous pass over live OS state. The share
//! table and the trusted catalogs key are kept consistent by always
//! touching them in the same order:
//!
//! - `add`: share, then catalog entry, then manifests
//! - `remove`: manifests, then catalog entry, then share
//!
//! Manifest batches are best-effort. A failing manifest stops the rest of
//! the batch, but what was already written or deleted stays that way.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::config::SideloaderConfig;
use crate::error::{Result, SideloaderError};
use crate::manifest::{self, LoadedManifest};
use crate::registry::{scrub_providers, CatalogStore, RegistryHive, RegistryRow};
use crate::share::{Share, ShareManager, ShareTable};

/// Arguments of [`Sideloader::add`]
#[derive(Debug, Clone)]
pub struct AddOptions {
    pub netname: String,
    pub path: PathBuf,
    /// Hide the catalog from the Office add-in menu
    pub hide: bool,
    /// Manifest URLs or local paths, installed in order
    pub manifests: Vec<String>,
}

/// Arguments of [`Sideloader::remove`]
#[derive(Debug, Clone)]
pub struct RemoveOptions {
    pub netname: String,
    /// Remove every `*.xml` in the share directory instead of `manifests`
    pub all: bool,
    /// Also unregister the catalog and delete the share
    pub catalog: bool,
    pub manifests: Vec<String>,
}

/// One manifest handled by a batch
#[derive(Debug, Clone, Serialize)]
pub struct ManifestOutcome {
    pub source: String,
    pub id: String,
    pub file: PathBuf,
    /// The file was there before: overwritten by add, deleted by remove
    pub existed: bool,
}

/// The manifest that stopped a batch
#[derive(Debug)]
pub struct BatchFailure {
    pub source: String,
    pub error: SideloaderError,
}

/// Per-item results of a manifest batch
#[derive(Debug, Default)]
pub struct ManifestBatch {
    pub completed: Vec<ManifestOutcome>,
    pub failure: Option<BatchFailure>,
    /// Sources never attempted because of `failure`
    pub skipped: Vec<String>,
}

impl ManifestBatch {
    /// Run `step` over `sources` in order, stopping at the first error
    fn run<F>(sources: Vec<String>, mut step: F) -> Self
    where
        F: FnMut(&str) -> Result<ManifestOutcome>,
    {
        let mut batch = ManifestBatch::default();
        let mut sources = sources.into_iter();

        for source in sources.by_ref() {
            match step(&source) {
                Ok(outcome) => batch.completed.push(outcome),
                Err(error) => {
                    warn!(
                        src = %source,
                        class = ?error.class(),
                        error = %error,
                        "manifest batch aborted"
                    );
                    batch.failure = Some(BatchFailure { source, error });
                    break;
                }
            }
        }

        batch.skipped = sources.collect();
        batch
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// The completed outcomes, or the error that stopped the batch
    pub fn ensure_complete(self) -> Result<Vec<ManifestOutcome>> {
        match self.failure {
            Some(failure) => Err(failure.error),
            None => Ok(self.completed),
        }
    }
}

/// What `add` did
#[derive(Debug)]
pub struct AddReport {
    pub url: String,
    pub catalog_id: String,
    /// Absolute catalog directory
    pub path: PathBuf,
    pub manifests: ManifestBatch,
}

/// What `remove` did
#[derive(Debug, Default)]
pub struct RemoveReport {
    /// The share as found before anything was removed, `None` if absent
    pub share: Option<Share>,
    pub manifests: ManifestBatch,
    /// Id of the unregistered catalog entry
    pub catalog_removed: Option<String>,
    pub share_removed: bool,
}

/// A cache directory that could not be cleared
#[derive(Debug, Clone, Serialize)]
pub struct CacheWarning {
    pub path: PathBuf,
    pub message: String,
}

/// What cache clearing did, per directory
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheReport {
    pub cleared: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
    pub warnings: Vec<CacheWarning>,
}

/// What `repair` did
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairReport {
    pub removed_providers: Vec<RegistryRow>,
    pub cache: CacheReport,
}

/// Entry point for every catalog operation
pub struct Sideloader<R, S> {
    registry: R,
    shares: ShareManager<S>,
    config: SideloaderConfig,
}

#[cfg(windows)]
impl Sideloader<crate::registry::windows::WindowsRegistry, crate::share::windows::NetApiShareTable> {
    /// Sideloader bound to the current user's registry and the local share table
    pub fn native(config: SideloaderConfig) -> Self {
        Self::new(
            crate::registry::windows::WindowsRegistry::new(),
            crate::share::windows::NetApiShareTable::new(),
            config,
        )
    }
}

impl<R: RegistryHive, S: ShareTable> Sideloader<R, S> {
    pub fn new(registry: R, shares: S, config: SideloaderConfig) -> Self {
        Self {
            registry,
            shares: ShareManager::new(shares),
            config,
        }
    }

    pub fn config(&self) -> &SideloaderConfig {
        &self.config
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn shares(&self) -> &ShareManager<S> {
        &self.shares
    }

    /// Open the trusted catalogs key, failing if Office is not installed
    pub fn catalogs(&self) -> Result<CatalogStore<R::Key>> {
        CatalogStore::open(&self.registry, &self.config.catalog_key())
    }

    /// Share a directory, register it as a trusted catalog and install manifests
    ///
    /// Safe to repeat: the share and the catalog entry are reused, and
    /// manifests with the same `<Id>` overwrite each other.
    #[instrument(
        skip(self, options),
        fields(netname = %options.netname, path = %options.path.display(), hide = options.hide)
    )]
    pub fn add(&self, options: &AddOptions) -> Result<AddReport> {
        // Nothing is touched unless Office is there
        let catalogs = self.catalogs()?;

        let path = std::path::absolute(&options.path)
            .map_err(|e| SideloaderError::io(&options.path, e))?;
        let url = self.shares.create_share(&options.netname, &path)?;
        let catalog_id = catalogs.upsert(&url, options.hide)?;
        info!(url = %url, id = %catalog_id, "catalog registered");

        let manifests = ManifestBatch::run(options.manifests.clone(), |source| {
            install_manifest(source, &path)
        });

        Ok(AddReport {
            url,
            catalog_id,
            path,
            manifests,
        })
    }

    /// Uninstall manifests from a share, optionally tearing the catalog down
    ///
    /// A share that does not exist is reported and nothing is changed.
    #[instrument(
        skip(self, options),
        fields(netname = %options.netname, all = options.all, catalog = options.catalog)
    )]
    pub fn remove(&self, options: &RemoveOptions) -> Result<RemoveReport> {
        let Some(share) = self.shares.get_share_by_name(&options.netname)? else {
            info!(netname = %options.netname, "net share does not exist, nothing to remove");
            return Ok(RemoveReport::default());
        };

        let catalogs = if options.catalog {
            Some(self.catalogs()?)
        } else {
            None
        };

        let sources = if options.all {
            manifest::manifest_files(&share.path)?
                .into_iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect()
        } else {
            options.manifests.clone()
        };
        let manifests =
            ManifestBatch::run(sources, |source| uninstall_manifest(source, &share.path));

        let mut report = RemoveReport {
            share: None,
            manifests,
            catalog_removed: None,
            share_removed: false,
        };

        if let Some(catalogs) = catalogs {
            if report.manifests.is_complete() {
                // The name the share was created under, not the spelling asked for
                let url = self.shares.share_url(&share.name)?;
                report.catalog_removed = catalogs.remove_by_url(&url)?;
                report.share_removed = self.shares.delete_share(&share.name)?;
                info!(url = %url, "catalog removed");
            } else {
                warn!(netname = %options.netname, "manifest removal failed, catalog and share kept");
            }
        }

        report.share = Some(share);
        Ok(report)
    }

    /// Delete provider entries that block add-ins and clear the web-view caches
    #[instrument(skip(self))]
    pub fn repair(&self) -> Result<RepairReport> {
        let removed_providers = scrub_providers(&self.registry, &self.config.provider_key())?;
        info!(count = removed_providers.len(), "invalid providers removed");

        Ok(RepairReport {
            removed_providers,
            cache: self.clear_cache(),
        })
    }

    /// Delete the configured web-view cache directories
    ///
    /// Never fails; a directory that cannot be removed becomes a warning.
    pub fn clear_cache(&self) -> CacheReport {
        clear_cache_dirs(&self.config.cache_dirs)
    }
}

fn install_manifest(source: &str, dir: &Path) -> Result<ManifestOutcome> {
    let LoadedManifest { descriptor, raw } = manifest::load(source)?;
    let file = dir.join(descriptor.file_name());
    let existed = file.exists();

    std::fs::write(&file, &raw).map_err(|e| SideloaderError::ManifestWrite {
        path: file.clone(),
        source: e,
    })?;
    info!(src = %source, dst = %file.display(), id = %descriptor.id, "add manifest");

    Ok(ManifestOutcome {
        source: source.to_string(),
        id: descriptor.id,
        file,
        existed,
    })
}

fn uninstall_manifest(source: &str, dir: &Path) -> Result<ManifestOutcome> {
    let descriptor = manifest::load(source)?.descriptor;
    let file = dir.join(descriptor.file_name());

    let existed = match std::fs::remove_file(&file) {
        Ok(()) => {
            info!(src = %source, dst = %file.display(), id = %descriptor.id, "remove manifest");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(dst = %file.display(), "manifest file not found");
            false
        }
        Err(e) => return Err(SideloaderError::io(&file, e)),
    };

    Ok(ManifestOutcome {
        source: source.to_string(),
        id: descriptor.id,
        file,
        existed,
    })
}

/// Remove each directory tree; missing ones count as cleared already
pub fn clear_cache_dirs(dirs: &[PathBuf]) -> CacheReport {
    let mut report = CacheReport::default();

    for dir in dirs {
        match std::fs::remove_dir_all(dir) {
            Ok(()) => {
                debug!(path = %dir.display(), "cache cleared");
                report.cleared.push(dir.clone());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %dir.display(), "cache directory does not exist");
                report.missing.push(dir.clone());
            }
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to clear cache");
                report.warnings.push(CacheWarning {
                    path: dir.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    report
}
