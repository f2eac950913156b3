//! Office add-in manifest loading
//!
//! A manifest source is either an HTTP(S) URL or a local path. Only a few
//! fields of the `<OfficeApp>` document matter here; `<Id>` is the one that
//! must be present, since `<Id>.xml` is the name the manifest is stored
//! under inside a catalog directory.

use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, SideloaderError};

/// Root element of an Office add-in manifest
pub const MANIFEST_ROOT: &str = "OfficeApp";

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https?://(www.)?[-a-zA-Z0-9@:%._+~#=]{1,256}.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()!@:%_+.~#?&/=]*)",
    )
    .expect("URL pattern is valid")
});

/// Where a manifest comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    Url(String),
    Path(PathBuf),
}

impl ManifestSource {
    /// Classify by syntax alone; nothing is checked for existence
    pub fn classify(source: &str) -> Self {
        if is_url(source) {
            ManifestSource::Url(source.to_string())
        } else {
            ManifestSource::Path(PathBuf::from(source))
        }
    }
}

/// Whether `s` starts with an HTTP(S) URL
pub fn is_url(s: &str) -> bool {
    URL_PATTERN.is_match(s)
}

/// The fields of a manifest this tool cares about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestDescriptor {
    pub id: String,
    pub version: Option<String>,
    pub provider_name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OfficeApp {
    #[serde(rename = "Id")]
    id: Option<String>,
    #[serde(rename = "Version")]
    version: Option<String>,
    #[serde(rename = "ProviderName")]
    provider_name: Option<String>,
    #[serde(rename = "DisplayName")]
    display_name: Option<DefaultValue>,
    #[serde(rename = "Description")]
    description: Option<DefaultValue>,
}

#[derive(Debug, Deserialize)]
struct DefaultValue {
    #[serde(rename = "@DefaultValue")]
    default_value: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ManifestDescriptor {
    /// Parse the `<OfficeApp>` document in `xml`
    pub fn from_xml(source_name: &str, xml: &str) -> Result<Self> {
        let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);

        let root = root_element(xml).map_err(|message| SideloaderError::ManifestParse {
            source_name: source_name.to_string(),
            message,
        })?;
        if root != MANIFEST_ROOT {
            return Err(SideloaderError::ManifestNotOfficeApp {
                source_name: source_name.to_string(),
                root,
            });
        }

        let app: OfficeApp =
            quick_xml::de::from_str(xml).map_err(|e| SideloaderError::ManifestParse {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;

        let id = non_empty(app.id).ok_or_else(|| SideloaderError::ManifestMissingId {
            source_name: source_name.to_string(),
        })?;
        if id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(SideloaderError::ManifestParse {
                source_name: source_name.to_string(),
                message: format!("<Id> '{id}' cannot be used as a file name"),
            });
        }

        Ok(Self {
            id,
            version: non_empty(app.version),
            provider_name: non_empty(app.provider_name),
            display_name: non_empty(app.display_name.and_then(|d| d.default_value)),
            description: non_empty(app.description.and_then(|d| d.default_value)),
        })
    }

    /// File name the manifest is stored under in a catalog directory
    pub fn file_name(&self) -> String {
        format!("{}.xml", self.id)
    }
}

/// Local name of the document element
fn root_element(xml: &str) -> std::result::Result<String, String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) => return Err("document has no root element".to_string()),
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }
}

/// A parsed manifest together with the bytes it was parsed from
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub descriptor: ManifestDescriptor,
    /// Persisted as-is, never re-serialized
    pub raw: Vec<u8>,
}

/// Load a manifest from a URL or a local path
pub fn load(source: &str) -> Result<LoadedManifest> {
    let raw = match ManifestSource::classify(source) {
        ManifestSource::Url(url) => {
            debug!(url = %url, "load manifest from url");
            fetch(&url)?
        }
        ManifestSource::Path(path) => read(&path)?,
    };

    let text = std::str::from_utf8(&raw).map_err(|e| SideloaderError::ManifestEncoding {
        source_name: source.to_string(),
        source: e,
    })?;
    let descriptor = ManifestDescriptor::from_xml(source, text)?;

    Ok(LoadedManifest { descriptor, raw })
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| SideloaderError::ManifestRead {
        path: path.to_path_buf(),
        source: e,
    })
}

fn fetch(url: &str) -> Result<Vec<u8>> {
    let fetch_err = |e| SideloaderError::ManifestFetch {
        url: url.to_string(),
        source: e,
    };

    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("sideloader/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(fetch_err)?;

    let response = client.get(url).send().map_err(fetch_err)?;
    if !response.status().is_success() {
        return Err(SideloaderError::ManifestHttpStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    Ok(response.bytes().map_err(fetch_err)?.to_vec())
}

/// A manifest file found in a catalog directory
#[derive(Debug, Clone, Serialize)]
pub struct ListedManifest {
    pub file: PathBuf,
    pub descriptor: Option<ManifestDescriptor>,
    pub error: Option<String>,
}

/// `*.xml` files directly inside `dir`, sorted by path
pub fn manifest_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| SideloaderError::io(dir, e))? {
        let entry = entry.map_err(|e| SideloaderError::io(dir, e))?;
        let path = entry.path();
        let is_xml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("xml"))
            .unwrap_or(false);
        if is_xml && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Parse every manifest in `dir`, reporting failures per file
pub fn list_manifests(dir: &Path) -> Result<Vec<ListedManifest>> {
    Ok(manifest_files(dir)?
        .into_iter()
        .map(|file| match load(&file.to_string_lossy()) {
            Ok(loaded) => ListedManifest {
                file,
                descriptor: Some(loaded.descriptor),
                error: None,
            },
            Err(e) => ListedManifest {
                file,
                descriptor: None,
                error: Some(e.to_string()),
            },
        })
        .collect())
}
