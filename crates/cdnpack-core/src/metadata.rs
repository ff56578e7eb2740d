//! Installed package metadata.
//!
//! The engine needs two facts about a package as seen from the requesting
//! module's directory: its installed version and its declared peer
//! dependencies. [`NodeModulesProvider`] finds them by walking
//! `node_modules` directories upward, the same way Node resolves bare
//! specifiers.

use rustc_hash::FxHashMap as HashMap;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::UNIX_EPOCH;

use crate::error::CdnError;

/// Version and peer dependencies of an installed package.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
    /// Peer dependency name → range, sorted by name.
    pub peer_dependencies: BTreeMap<String, String>,
}

impl PackageMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            peer_dependencies: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_peer(mut self, name: impl Into<String>, range: impl Into<String>) -> Self {
        self.peer_dependencies.insert(name.into(), range.into());
        self
    }
}

/// Reads installed package metadata.
///
/// A package that cannot be located is a fatal [`CdnError::MetadataNotFound`],
/// never a reason to quietly bundle.
pub trait PackageMetadataProvider: Send + Sync {
    fn read(&self, name: &str, context: &Path) -> Result<Arc<PackageMetadata>, CdnError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPackageJson {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    peer_dependencies: Option<BTreeMap<String, Value>>,
}

/// Parse the fields the engine needs out of a `package.json`.
pub fn parse_package_json(
    path: &Path,
    content: &str,
    fallback_name: &str,
) -> Result<PackageMetadata, CdnError> {
    let raw: RawPackageJson = serde_json::from_str(content)
        .map_err(|e| CdnError::metadata_invalid(path, format!("Invalid JSON: {e}")))?;

    let version = raw
        .version
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CdnError::metadata_invalid(path, "missing 'version'"))?;

    // Non-string ranges are ignored; only the names matter for resolution.
    let peer_dependencies = raw
        .peer_dependencies
        .unwrap_or_default()
        .into_iter()
        .map(|(name, range)| {
            let range = range.as_str().unwrap_or("*").to_string();
            (name, range)
        })
        .collect();

    Ok(PackageMetadata {
        name: raw.name.unwrap_or_else(|| fallback_name.to_string()),
        version,
        peer_dependencies,
    })
}

/// Modification stamp used to invalidate cached reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct FileStamp {
    mtime_ms: Option<u128>,
    size: Option<u64>,
}

impl FileStamp {
    fn of(path: &Path) -> Self {
        let Ok(meta) = path.metadata() else {
            return Self::default();
        };
        let mtime_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis());
        Self {
            mtime_ms,
            size: Some(meta.len()),
        }
    }
}

#[derive(Debug)]
struct CachedMetadata {
    stamp: FileStamp,
    metadata: Arc<PackageMetadata>,
}

/// Filesystem provider: `<dir>/node_modules/<name>/package.json`, walking up
/// from the context directory to the filesystem root.
#[derive(Debug, Default)]
pub struct NodeModulesProvider {
    cache: Mutex<HashMap<PathBuf, CachedMetadata>>,
}

impl NodeModulesProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locate the `package.json` of `name` as seen from `context`.
    #[must_use]
    pub fn locate(name: &str, context: &Path) -> Option<PathBuf> {
        context
            .ancestors()
            .map(|dir| dir.join("node_modules").join(name).join("package.json"))
            .find(|candidate| candidate.is_file())
    }

    fn read_uncached(path: &Path, name: &str) -> Result<PackageMetadata, CdnError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CdnError::metadata_invalid(path, format!("Failed to read: {e}")))?;
        parse_package_json(path, &content, name)
    }
}

impl PackageMetadataProvider for NodeModulesProvider {
    fn read(&self, name: &str, context: &Path) -> Result<Arc<PackageMetadata>, CdnError> {
        let path = Self::locate(name, context)
            .ok_or_else(|| CdnError::metadata_not_found(name, context))?;
        let key = dunce::canonicalize(&path).unwrap_or_else(|_| path.clone());
        let stamp = FileStamp::of(&key);

        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = cache.get(&key) {
                if cached.stamp == stamp {
                    return Ok(Arc::clone(&cached.metadata));
                }
            }
        }

        let metadata = Arc::new(Self::read_uncached(&key, name)?);
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key,
                CachedMetadata {
                    stamp,
                    metadata: Arc::clone(&metadata),
                },
            );
        Ok(metadata)
    }
}
