//! Add, remove and repair against in-memory OS state

mod common;

use anyhow::Result;
use common::{write_manifest, Fixture};
use pretty_assertions::assert_eq;
use sideloader_core::manifest;
use sideloader_core::registry::{RegistryValue, FLAGS_HIDDEN, FLAGS_VISIBLE};
use sideloader_core::share::ShareTable;
use sideloader_core::{AddOptions, ErrorClass, RemoveOptions, SideloaderError};
use std::fs;

fn add_options(fixture: &Fixture, manifests: Vec<String>) -> AddOptions {
    AddOptions {
        netname: "shareA".to_string(),
        path: fixture.addins(),
        hide: false,
        manifests,
    }
}

fn remove_all(netname: &str) -> RemoveOptions {
    RemoveOptions {
        netname: netname.to_string(),
        all: true,
        catalog: true,
        manifests: Vec::new(),
    }
}

fn source(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn test_add_creates_share_catalog_and_manifest() -> Result<()> {
    let fixture = Fixture::new()?;
    let m1 = write_manifest(&fixture.sources(), "m1.xml", "ABC")?;

    let report = fixture
        .sideloader
        .add(&add_options(&fixture, vec![source(&m1)]))?;
    let outcomes = report.manifests.ensure_complete()?;

    // Share rooted at the catalog directory
    let share = fixture.shares.get("shareA").expect("share exists");
    assert_eq!(share.path, fixture.addins());
    assert!(fixture.addins().is_dir());

    // Catalog entry pointing at the share
    let url = fixture.sideloader.shares().share_url("shareA")?;
    assert_eq!(url, r"\\workstation-7\shareA");
    assert_eq!(report.url, url);
    assert_eq!(
        fixture.registry.value(&fixture.catalog_key(), &report.catalog_id, "Url"),
        Some(RegistryValue::String(url))
    );
    assert_eq!(
        fixture.registry.value(&fixture.catalog_key(), &report.catalog_id, "Flags"),
        Some(RegistryValue::Dword(FLAGS_VISIBLE))
    );

    // Manifest copied byte for byte under its id
    let installed = fixture.addins().join("ABC.xml");
    assert_eq!(fs::read(&installed)?, fs::read(&m1)?);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].file, installed);
    assert!(!outcomes[0].existed);
    Ok(())
}

#[test]
fn test_installed_manifest_loads_with_its_file_id() -> Result<()> {
    let fixture = Fixture::new()?;
    let m1 = write_manifest(&fixture.sources(), "m1.xml", "ABC")?;
    fixture
        .sideloader
        .add(&add_options(&fixture, vec![source(&m1)]))?;

    let installed = fixture.addins().join("ABC.xml");
    let loaded = manifest::load(&source(&installed))?;
    assert_eq!(loaded.descriptor.id, "ABC");
    assert_eq!(loaded.descriptor.file_name(), "ABC.xml");
    Ok(())
}

#[test]
fn test_add_is_idempotent() -> Result<()> {
    let fixture = Fixture::new()?;
    let m1 = write_manifest(&fixture.sources(), "m1.xml", "ABC")?;
    let options = add_options(&fixture, vec![source(&m1)]);

    let first = fixture.sideloader.add(&options)?;
    let second = fixture.sideloader.add(&options)?;

    assert_eq!(first.url, second.url);
    assert_eq!(first.catalog_id, second.catalog_id);
    assert_eq!(fixture.shares.enumerate().unwrap().len(), 1);
    assert_eq!(fixture.registry.subkeys(&fixture.catalog_key()).len(), 1);
    assert_eq!(manifest::manifest_files(&fixture.addins())?.len(), 1);

    let outcomes = second.manifests.ensure_complete()?;
    assert!(outcomes[0].existed);
    Ok(())
}

#[test]
fn test_same_id_from_other_source_overwrites() -> Result<()> {
    let fixture = Fixture::new()?;
    let m1 = write_manifest(&fixture.sources(), "m1.xml", "ABC")?;
    let m2 = fixture.sources().join("m2.xml");
    fs::write(&m2, "<OfficeApp><Id>ABC</Id><Version>2.0</Version></OfficeApp>")?;

    fixture
        .sideloader
        .add(&add_options(&fixture, vec![source(&m1), source(&m2)]))?
        .manifests
        .ensure_complete()?;

    assert_eq!(manifest::manifest_files(&fixture.addins())?.len(), 1);
    assert_eq!(fs::read(fixture.addins().join("ABC.xml"))?, fs::read(&m2)?);
    Ok(())
}

#[test]
fn test_hide_flag_mapping() -> Result<()> {
    let fixture = Fixture::new()?;

    let shown = fixture.sideloader.add(&add_options(&fixture, Vec::new()))?;
    let flags = fixture
        .registry
        .value(&fixture.catalog_key(), &shown.catalog_id, "Flags");
    assert_eq!(flags, Some(RegistryValue::Dword(0)));

    let hidden = fixture.sideloader.add(&AddOptions {
        hide: true,
        ..add_options(&fixture, Vec::new())
    })?;
    assert_eq!(hidden.catalog_id, shown.catalog_id);
    let flags = fixture
        .registry
        .value(&fixture.catalog_key(), &hidden.catalog_id, "Flags")
        .and_then(|v| v.as_dword());
    assert_eq!(flags, Some(FLAGS_HIDDEN));
    assert_ne!(flags, Some(0));
    Ok(())
}

#[test]
fn test_add_without_office_mutates_nothing() -> Result<()> {
    let fixture = Fixture::without_office()?;
    let m1 = write_manifest(&fixture.sources(), "m1.xml", "ABC")?;

    let err = fixture
        .sideloader
        .add(&add_options(&fixture, vec![source(&m1)]))
        .unwrap_err();

    assert!(matches!(err, SideloaderError::HostNotInstalled { .. }));
    assert_eq!(err.class(), ErrorClass::Precondition);
    assert!(fixture.shares.enumerate().unwrap().is_empty());
    assert!(!fixture.registry.has_key(&fixture.catalog_key()));
    assert!(!fixture.addins().exists());
    Ok(())
}

#[test]
fn test_share_failure_leaves_registry_untouched() -> Result<()> {
    let fixture = Fixture::new()?;
    fixture.shares.fail_on("NetShareAdd", 5);

    let err = fixture
        .sideloader
        .add(&add_options(&fixture, Vec::new()))
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Os);
    assert!(fixture.registry.subkeys(&fixture.catalog_key()).is_empty());
    Ok(())
}

#[test]
fn test_failing_manifest_stops_the_batch() -> Result<()> {
    let fixture = Fixture::new()?;
    let good = write_manifest(&fixture.sources(), "good.xml", "GOOD")?;
    let bad = fixture.sources().join("bad.xml");
    fs::write(&bad, "<OfficeApp><Version>1.0</Version></OfficeApp>")?;
    let later = write_manifest(&fixture.sources(), "later.xml", "LATER")?;

    let report = fixture.sideloader.add(&add_options(
        &fixture,
        vec![source(&good), source(&bad), source(&later)],
    ))?;

    // Share and catalog are in place; the first manifest stays installed
    assert!(fixture.shares.get("shareA").is_ok());
    assert_eq!(fixture.registry.subkeys(&fixture.catalog_key()).len(), 1);
    assert!(fixture.addins().join("GOOD.xml").exists());
    assert!(!fixture.addins().join("LATER.xml").exists());

    assert_eq!(report.manifests.completed.len(), 1);
    assert_eq!(report.manifests.skipped, vec![source(&later)]);
    let err = report.manifests.ensure_complete().unwrap_err();
    assert!(matches!(err, SideloaderError::ManifestMissingId { .. }));
    assert_eq!(err.class(), ErrorClass::MalformedInput);
    Ok(())
}

#[test]
fn test_remove_all_with_catalog_leaves_no_remnants() -> Result<()> {
    let fixture = Fixture::new()?;
    let m1 = write_manifest(&fixture.sources(), "m1.xml", "ABC")?;
    fixture
        .sideloader
        .add(&add_options(&fixture, vec![source(&m1)]))?;

    let report = fixture.sideloader.remove(&remove_all("shareA"))?;

    assert!(report.share.is_some());
    assert!(report.catalog_removed.is_some());
    assert!(report.share_removed);
    assert!(!fixture.addins().join("ABC.xml").exists());
    assert!(fixture.shares.get("shareA").is_err());
    assert!(fixture.registry.subkeys(&fixture.catalog_key()).is_empty());

    let info = fixture.sideloader.info(None)?;
    assert!(info.shares.is_empty());
    assert!(info.catalogs.is_empty());
    assert_eq!(info.addins.len(), 1);
    assert!(info.addins[0].manifests.is_empty());
    Ok(())
}

#[test]
fn test_remove_missing_share_is_a_noop() -> Result<()> {
    let fixture = Fixture::new()?;
    let m1 = write_manifest(&fixture.sources(), "m1.xml", "ABC")?;
    fixture
        .sideloader
        .add(&add_options(&fixture, vec![source(&m1)]))?;

    let shares_before = fixture.shares.enumerate().unwrap();
    let catalogs_before = fixture.registry.subkeys(&fixture.catalog_key());

    let report = fixture.sideloader.remove(&remove_all("not-a-share"))?;

    assert!(report.share.is_none());
    assert!(report.manifests.completed.is_empty());
    assert_eq!(fixture.shares.enumerate().unwrap(), shares_before);
    assert_eq!(
        fixture.registry.subkeys(&fixture.catalog_key()),
        catalogs_before
    );
    assert!(fixture.addins().join("ABC.xml").exists());
    Ok(())
}

#[test]
fn test_remove_named_manifest_keeps_catalog() -> Result<()> {
    let fixture = Fixture::new()?;
    let m1 = write_manifest(&fixture.sources(), "m1.xml", "ABC")?;
    let m2 = write_manifest(&fixture.sources(), "m2.xml", "DEF")?;
    fixture
        .sideloader
        .add(&add_options(&fixture, vec![source(&m1), source(&m2)]))?;

    let report = fixture.sideloader.remove(&RemoveOptions {
        netname: "shareA".to_string(),
        all: false,
        catalog: false,
        manifests: vec![source(&m1)],
    })?;

    let outcomes = report.manifests.ensure_complete()?;
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].existed);
    assert!(!fixture.addins().join("ABC.xml").exists());
    assert!(fixture.addins().join("DEF.xml").exists());
    assert!(fixture.shares.get("shareA").is_ok());
    assert_eq!(fixture.registry.subkeys(&fixture.catalog_key()).len(), 1);
    Ok(())
}

#[test]
fn test_remove_absent_manifest_file_is_silent() -> Result<()> {
    let fixture = Fixture::new()?;
    fixture.sideloader.add(&add_options(&fixture, Vec::new()))?;
    let m1 = write_manifest(&fixture.sources(), "m1.xml", "ABC")?;

    let report = fixture.sideloader.remove(&RemoveOptions {
        netname: "shareA".to_string(),
        all: false,
        catalog: false,
        manifests: vec![source(&m1)],
    })?;

    let outcomes = report.manifests.ensure_complete()?;
    assert!(!outcomes[0].existed);
    Ok(())
}

#[test]
fn test_failed_removal_keeps_catalog_and_share() -> Result<()> {
    let fixture = Fixture::new()?;
    fixture.sideloader.add(&add_options(&fixture, Vec::new()))?;
    let missing = fixture.sources().join("missing.xml");

    let report = fixture.sideloader.remove(&RemoveOptions {
        netname: "shareA".to_string(),
        all: false,
        catalog: true,
        manifests: vec![source(&missing)],
    })?;

    assert!(!report.manifests.is_complete());
    assert!(report.catalog_removed.is_none());
    assert!(!report.share_removed);
    assert!(fixture.shares.get("shareA").is_ok());
    assert_eq!(fixture.registry.subkeys(&fixture.catalog_key()).len(), 1);
    Ok(())
}

#[test]
fn test_repair_scrubs_invalid_providers_and_clears_cache() -> Result<()> {
    let fixture = Fixture::new()?;
    let providers = fixture.provider_key();
    for (subkey, unique_id) in [
        ("p1", "Anonymous"),
        ("p2", "user@x_ADAL"),
        ("p3", "user@x"),
    ] {
        fixture.registry.insert(
            &providers,
            subkey,
            &[("UniqueId", RegistryValue::String(unique_id.to_string()))],
        );
    }
    let cache = fixture.sideloader.config().cache_dirs[0].clone();
    fs::create_dir_all(&cache)?;
    fs::write(cache.join("state.dat"), b"stale")?;

    let report = fixture.sideloader.repair()?;

    let removed: Vec<&str> = report
        .removed_providers
        .iter()
        .map(|row| row.key.as_str())
        .collect();
    assert_eq!(removed, vec!["p1", "p2"]);
    assert_eq!(fixture.registry.subkeys(&providers), vec!["p3".to_string()]);

    assert_eq!(report.cache.cleared, vec![cache.clone()]);
    assert_eq!(report.cache.missing.len(), 1);
    assert!(report.cache.warnings.is_empty());
    assert!(!cache.exists());
    Ok(())
}

#[test]
fn test_repair_without_providers_key() -> Result<()> {
    let fixture = Fixture::without_office()?;

    let report = fixture.sideloader.repair()?;

    assert!(report.removed_providers.is_empty());
    assert!(!fixture.registry.has_key(&fixture.provider_key()));
    Ok(())
}

#[test]
fn test_info_lists_addins_of_registered_shares() -> Result<()> {
    let fixture = Fixture::new()?;
    let m1 = write_manifest(&fixture.sources(), "m1.xml", "ABC")?;
    let other_dir = fixture.temp_dir.path().join("team");
    fixture.sideloader.add(&AddOptions {
        netname: "team".to_string(),
        path: other_dir.clone(),
        hide: true,
        manifests: vec![source(&m1)],
    })?;
    fixture.registry.insert(
        &fixture.provider_key(),
        "p1",
        &[("UniqueId", RegistryValue::String("user@x".to_string()))],
    );

    let info = fixture.sideloader.info(None)?;

    assert_eq!(info.shares.len(), 1);
    assert_eq!(info.providers.len(), 1);
    assert_eq!(info.catalogs.len(), 3);
    let paths: Vec<_> = info.addins.iter().map(|d| d.path.clone()).collect();
    assert_eq!(paths, vec![fixture.addins(), other_dir]);
    let listed = &info.addins[1].manifests;
    assert_eq!(listed.len(), 1);
    assert_eq!(
        listed[0].descriptor.as_ref().map(|d| d.id.as_str()),
        Some("ABC")
    );
    Ok(())
}

#[test]
fn test_share_names_ignore_case() -> Result<()> {
    let fixture = Fixture::new()?;
    fixture.sideloader.add(&AddOptions {
        netname: "ShareA".to_string(),
        ..add_options(&fixture, Vec::new())
    })?;

    // Same share under another spelling keeps a single catalog entry
    let again = fixture.sideloader.add(&AddOptions {
        netname: "sharea".to_string(),
        ..add_options(&fixture, Vec::new())
    })?;
    assert_eq!(fixture.shares.enumerate().unwrap().len(), 1);
    assert_eq!(fixture.registry.subkeys(&fixture.catalog_key()).len(), 1);

    let report = fixture.sideloader.remove(&RemoveOptions {
        netname: "SHAREA".to_string(),
        all: true,
        catalog: true,
        manifests: Vec::new(),
    })?;

    assert_eq!(report.catalog_removed, Some(again.catalog_id));
    assert!(report.share_removed);
    assert!(fixture.shares.enumerate().unwrap().is_empty());
    assert!(fixture.registry.subkeys(&fixture.catalog_key()).is_empty());
    Ok(())
}
