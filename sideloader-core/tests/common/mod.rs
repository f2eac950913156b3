//! Shared helpers for the sideloader integration tests
//!
//! Every test runs against the in-memory share table and registry, with a
//! temporary directory standing in for the catalog directory and the
//! manifest sources.

#![allow(dead_code)]

use anyhow::Result;
use sideloader_core::registry::memory::MemoryRegistry;
use sideloader_core::share::memory::MemoryShareTable;
use sideloader_core::{Sideloader, SideloaderConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

pub const SERVER: &str = "WORKSTATION-7";

/// Manifest document with the given `<Id>`
pub fn manifest_xml(id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OfficeApp xmlns="http://schemas.microsoft.com/office/appforoffice/1.1" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:type="TaskPaneApp">
  <Id>{id}</Id>
  <Version>1.0.0.0</Version>
  <ProviderName>Contoso</ProviderName>
  <DefaultLocale>en-US</DefaultLocale>
  <DisplayName DefaultValue="Add-in {id}" />
  <Description DefaultValue="Test add-in"/>
</OfficeApp>
"#
    )
}

/// Write a manifest for `id` as `dir/file_name` and return its path
pub fn write_manifest(dir: &Path, file_name: &str, id: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    fs::write(&path, manifest_xml(id))?;
    Ok(path)
}

/// A sideloader over in-memory backends with handles for inspection
pub struct Fixture {
    pub temp_dir: TempDir,
    pub registry: MemoryRegistry,
    pub shares: MemoryShareTable,
    pub sideloader: Sideloader<MemoryRegistry, MemoryShareTable>,
}

impl Fixture {
    /// Office installed: the trusted catalogs key exists
    pub fn new() -> Result<Self> {
        let fixture = Self::without_office()?;
        fixture
            .registry
            .create_key(&fixture.sideloader.config().catalog_key());
        Ok(fixture)
    }

    /// No Office registry keys at all
    pub fn without_office() -> Result<Self> {
        init_test_logging();

        let temp_dir = TempDir::new()?;
        let config = SideloaderConfig {
            path: temp_dir.path().join("addins"),
            cache_dirs: vec![
                temp_dir.path().join("cache").join("Wef"),
                temp_dir.path().join("cache").join("INetCache"),
            ],
            ..SideloaderConfig::default()
        };

        let registry = MemoryRegistry::new();
        let shares = MemoryShareTable::new(SERVER);
        let sideloader = Sideloader::new(registry.clone(), shares.clone(), config);

        Ok(Self {
            temp_dir,
            registry,
            shares,
            sideloader,
        })
    }

    pub fn catalog_key(&self) -> String {
        self.sideloader.config().catalog_key()
    }

    pub fn provider_key(&self) -> String {
        self.sideloader.config().provider_key()
    }

    /// Directory holding manifest sources, outside the catalog directory
    pub fn sources(&self) -> PathBuf {
        self.temp_dir.path().join("sources")
    }

    /// Catalog directory
    pub fn addins(&self) -> PathBuf {
        self.temp_dir.path().join("addins")
    }
}
