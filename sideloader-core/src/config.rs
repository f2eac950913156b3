//! Sideloader configuration and path discovery
//!
//! Values come from `config.yaml` in the platform config directory. Every
//! field is optional in the file; anything missing falls back to the
//! defaults that match an Office 16 installation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, SideloaderError};

/// Application name used for config and data directories
pub const APP_NAME: &str = "office-addin-sideloader";

/// Default share name for the catalog directory
pub const DEFAULT_NETNAME: &str = "office-addins";

/// Office 16 registry root under HKEY_CURRENT_USER
pub const DEFAULT_OFFICE_KEY: &str = r"Software\Microsoft\Office\16.0";

/// Trusted catalog sub-key, relative to the Office key
pub const DEFAULT_CATALOG_SUBKEY: &str = r"WEF\TrustedCatalogs";

/// Provider sub-key, relative to the Office key
pub const DEFAULT_PROVIDER_SUBKEY: &str = r"WEF\Providers";

const CONFIG_FILE: &str = "config.yaml";
const LOG_FILE: &str = "main.log";

/// Sideloader configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SideloaderConfig {
    /// Share name used when `--netname` is not given
    pub netname: String,

    /// Catalog directory used when `--path` is not given
    pub path: PathBuf,

    /// Office registry root under HKEY_CURRENT_USER
    pub office_key: String,

    /// Trusted catalogs location, relative to `office_key`
    pub catalog_subkey: String,

    /// Providers location, relative to `office_key`
    pub provider_subkey: String,

    /// Web-view cache directories cleared after every mutation
    pub cache_dirs: Vec<PathBuf>,
}

impl Default for SideloaderConfig {
    fn default() -> Self {
        Self {
            netname: DEFAULT_NETNAME.to_string(),
            path: data_dir().join("addins"),
            office_key: DEFAULT_OFFICE_KEY.to_string(),
            catalog_subkey: DEFAULT_CATALOG_SUBKEY.to_string(),
            provider_subkey: DEFAULT_PROVIDER_SUBKEY.to_string(),
            cache_dirs: default_cache_dirs(),
        }
    }
}

impl SideloaderConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from_path(&config_dir().join(CONFIG_FILE))
    }

    /// Load configuration from a specific file, or defaults if it is missing
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| SideloaderError::io(path, e))?;
        let config = serde_yaml_ng::from_str(&content).map_err(|source| {
            SideloaderError::ConfigParse {
                path: path.to_path_buf(),
                source,
            }
        })?;

        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Full registry path of the trusted catalogs key
    pub fn catalog_key(&self) -> String {
        format!(r"{}\{}", self.office_key, self.catalog_subkey)
    }

    /// Full registry path of the providers key
    pub fn provider_key(&self) -> String {
        format!(r"{}\{}", self.office_key, self.provider_subkey)
    }
}

/// Platform config directory for the sideloader
pub fn config_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .or_else(|| dirs::config_dir().map(|d| d.join(APP_NAME)))
        .unwrap_or_else(|| PathBuf::from(APP_NAME))
}

/// Platform data directory for the sideloader
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .or_else(|| dirs::data_dir().map(|d| d.join(APP_NAME)))
        .unwrap_or_else(|| PathBuf::from(APP_NAME))
}

/// Debug log file written on every invocation
pub fn log_file() -> PathBuf {
    config_dir().join(LOG_FILE)
}

/// The Office web-view caches
///
/// See <https://learn.microsoft.com/office/dev/add-ins/testing/clear-cache>.
pub fn default_cache_dirs() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(local) = dirs::data_local_dir() {
        paths.push(
            local
                .join("Microsoft")
                .join("Office")
                .join("16.0")
                .join("Wef"),
        );
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(
            home.join("AppData")
                .join("Local")
                .join("Packages")
                .join("Microsoft.Win32WebViewHost_cw5n1h2txyewy")
                .join("AC")
                .join("#!123")
                .join("INetCache"),
        );
    }

    paths
}
