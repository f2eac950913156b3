//! Sideloader error types with clear, actionable messages

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the core crate
pub type Result<T, E = SideloaderError> = std::result::Result<T, E>;

/// How an error is handled at the invocation boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The host application is missing; nothing was mutated
    Precondition,
    /// A manifest source could not be read or understood
    MalformedInput,
    /// Any other OS failure, passed through unmodified
    Os,
}

/// Errors surfaced by share, registry, manifest and lifecycle operations
#[derive(Error, Debug)]
pub enum SideloaderError {
    /// The Office registry location does not exist
    #[error("Can't find registry key HKEY_CURRENT_USER\\{key}.\n\nDo you have a valid Microsoft Office installation?")]
    HostNotInstalled { key: String },

    /// The manifest has no <Id> element
    #[error("Malformed manifest {source_name}: missing mandatory <Id> element")]
    ManifestMissingId { source_name: String },

    /// The document root is not <OfficeApp>
    #[error("Malformed manifest {source_name}: root element is <{root}>, expected <OfficeApp>")]
    ManifestNotOfficeApp { source_name: String, root: String },

    /// The manifest is not well-formed XML
    #[error("Malformed manifest {source_name}: {message}")]
    ManifestParse {
        source_name: String,
        message: String,
    },

    /// The manifest is not valid UTF-8
    #[error("Malformed manifest {source_name}: content is not valid UTF-8")]
    ManifestEncoding {
        source_name: String,
        #[source]
        source: std::str::Utf8Error,
    },

    /// A local manifest could not be read
    #[error("Failed to read manifest from {path}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A remote manifest could not be fetched
    #[error("Failed to fetch manifest from {url}")]
    ManifestFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A remote manifest answered with a non-success status
    #[error("Failed to fetch manifest: HTTP {status} from {url}")]
    ManifestHttpStatus { url: String, status: u16 },

    /// A manifest could not be written into the catalog directory
    #[error("Failed to write manifest to {path}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A network share API call failed
    #[error("{operation} failed with error code {code}")]
    NetApi { operation: &'static str, code: u32 },

    /// A registry call failed
    #[error("Registry operation on {key} failed")]
    Registry {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// A filesystem call failed
    #[error("Filesystem operation on {path} failed")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for this tool
    #[error("Failed to parse config file {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// Native backends are only available on Windows
    #[error("Network shares and the Office registry are only available on Windows")]
    UnsupportedPlatform,
}

impl SideloaderError {
    /// Classify the error for reporting at the invocation boundary
    pub fn class(&self) -> ErrorClass {
        match self {
            SideloaderError::HostNotInstalled { .. } => ErrorClass::Precondition,
            SideloaderError::ManifestMissingId { .. }
            | SideloaderError::ManifestNotOfficeApp { .. }
            | SideloaderError::ManifestParse { .. }
            | SideloaderError::ManifestEncoding { .. }
            | SideloaderError::ManifestRead { .. }
            | SideloaderError::ManifestFetch { .. }
            | SideloaderError::ManifestHttpStatus { .. }
            | SideloaderError::ConfigParse { .. } => ErrorClass::MalformedInput,
            SideloaderError::ManifestWrite { .. }
            | SideloaderError::NetApi { .. }
            | SideloaderError::Registry { .. }
            | SideloaderError::Io { .. }
            | SideloaderError::UnsupportedPlatform => ErrorClass::Os,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SideloaderError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn registry(key: impl Into<String>, source: std::io::Error) -> Self {
        SideloaderError::Registry {
            key: key.into(),
            source,
        }
    }
}
