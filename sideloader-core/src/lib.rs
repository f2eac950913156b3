//! Sideloader Core - Office add-in catalog management
//!
//! Shares a local directory on the network, registers the share as a
//! trusted catalog for Office, and installs add-in manifests into it.
//! All state lives in the OS: the share table, the current user's
//! registry hive and the catalog directory itself.
//!
//! The OS surfaces sit behind [`share::ShareTable`] and
//! [`registry::RegistryHive`]. Native implementations are compiled on
//! Windows; the `memory` implementations work everywhere.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod lifecycle;
pub mod manifest;
pub mod registry;
pub mod share;

pub use config::SideloaderConfig;
pub use error::{ErrorClass, Result, SideloaderError};
pub use lifecycle::{AddOptions, RemoveOptions, Sideloader};
