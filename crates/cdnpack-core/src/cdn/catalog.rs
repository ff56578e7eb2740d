//! Name → versioned URL template catalogue.
//!
//! Each entry lists semver ranges in priority order; the first range that
//! matches the installed version picks the URL templates. `[version]` in a
//! template is replaced by the installed version.

use rustc_hash::FxHashMap as HashMap;
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use url::Url;

use super::{CdnDescriptor, CdnResolver, ResolveOptions, ResolverOutput};
use crate::config::Environment;
use crate::error::CdnError;

/// Host used by the built-in catalogue.
pub const UNPKG_HOST: &str = "https://unpkg.com/";

const VERSION_PLACEHOLDER: &str = "[version]";

const BUILTIN_CATALOG: &str = include_str!("modules.json");

/// URL templates for one version range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTemplate {
    /// Semver range, e.g. `>=15.0.0, <16.0.0`.
    pub range: String,
    pub development: String,
    pub production: String,
}

impl VersionTemplate {
    #[must_use]
    pub fn template(&self, environment: Environment) -> &str {
        match environment {
            Environment::Development => &self.development,
            Environment::Production => &self.production,
        }
    }
}

/// One package known to the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(rename = "var")]
    pub var: Option<String>,
    pub versions: Vec<VersionTemplate>,
}

#[derive(Deserialize)]
struct CatalogFile {
    modules: Vec<CatalogEntry>,
}

/// A loaded, validated catalogue.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    /// Parsed ranges, aligned with `entries[i].versions`.
    ranges: Vec<Vec<VersionReq>>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// The catalogue shipped with this crate.
    pub fn builtin() -> Result<Self, CdnError> {
        static BUILTIN: OnceLock<Result<Catalog, CdnError>> = OnceLock::new();
        BUILTIN
            .get_or_init(|| Self::from_json(BUILTIN_CATALOG))
            .clone()
    }

    /// Load a catalogue from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, CdnError> {
        let content = std::fs::read_to_string(path).map_err(|e| CdnError::ConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(&content).map_err(|e| CdnError::ConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Parse and validate a catalogue.
    ///
    /// # Errors
    /// Returns a config error for invalid JSON, invalid ranges, duplicate
    /// names, or templates that do not form a valid URL.
    pub fn from_json(json: &str) -> Result<Self, CdnError> {
        let file: CatalogFile = serde_json::from_str(json)
            .map_err(|e| CdnError::config(format!("Invalid catalogue: {e}")))?;
        Self::from_entries(file.modules)
    }

    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, CdnError> {
        let mut index = HashMap::default();
        let mut ranges = Vec::with_capacity(entries.len());

        for (i, entry) in entries.iter().enumerate() {
            if index.insert(entry.name.clone(), i).is_some() {
                return Err(CdnError::config(format!(
                    "Duplicate catalogue entry '{}'",
                    entry.name
                )));
            }

            let mut reqs = Vec::with_capacity(entry.versions.len());
            for template in &entry.versions {
                let req = VersionReq::parse(&template.range).map_err(|e| {
                    CdnError::config(format!(
                        "Invalid range '{}' for '{}': {e}",
                        template.range, entry.name
                    ))
                })?;
                for url in [&template.development, &template.production] {
                    let sample = url.replace(VERSION_PLACEHOLDER, "0.0.0");
                    Url::parse(&sample).map_err(|e| {
                        CdnError::config(format!(
                            "Invalid URL template '{url}' for '{}': {e}",
                            entry.name
                        ))
                    })?;
                }
                reqs.push(req);
            }
            ranges.push(reqs);
        }

        Ok(Self {
            entries,
            ranges,
            index,
        })
    }

    /// Rewrite every template starting with `from` to start with `to`.
    #[must_use]
    pub fn with_host(mut self, from: &str, to: &str) -> Self {
        for entry in &mut self.entries {
            for template in &mut entry.versions {
                for url in [&mut template.development, &mut template.production] {
                    if let Some(rest) = url.strip_prefix(from) {
                        *url = format!("{to}{rest}");
                    }
                }
            }
        }
        self
    }

    /// Look up the CDN build of `name` at `version`.
    ///
    /// Returns `None` for unknown packages, non-semver versions, and
    /// versions outside every listed range.
    #[must_use]
    pub fn lookup(
        &self,
        name: &str,
        version: &str,
        environment: Environment,
    ) -> Option<CdnDescriptor> {
        let &i = self.index.get(name)?;
        let entry = &self.entries[i];
        let parsed = Version::parse(version).ok()?;

        let template = entry
            .versions
            .iter()
            .zip(&self.ranges[i])
            .find(|(_, req)| req.matches(&parsed))
            .map(|(template, _)| template)?;

        let url = template
            .template(environment)
            .replace(VERSION_PLACEHOLDER, version);
        Url::parse(&url).ok()?;

        Some(CdnDescriptor {
            name: entry.name.clone(),
            var: entry.var.clone(),
            url,
            version: version.to_string(),
        })
    }

    /// Entries in catalogue order.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Strategy answering from a [`Catalog`].
#[derive(Debug, Clone)]
pub struct CatalogResolver {
    catalog: Catalog,
}

impl CatalogResolver {
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

impl CdnResolver for CatalogResolver {
    fn resolve(&self, name: &str, version: &str, options: &ResolveOptions) -> ResolverOutput {
        ResolverOutput::Ready(self.catalog.lookup(name, version, options.environment))
    }
}
