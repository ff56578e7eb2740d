//! Modules decided to be served from the CDN during one build pass.

use rustc_hash::FxHashMap as HashMap;
use std::sync::Arc;

use crate::cdn::CdnDescriptor;

/// A committed CDN substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionEntry {
    pub specifier: String,
    pub descriptor: Arc<CdnDescriptor>,
    /// Installed version the decision was made for.
    pub source_version: String,
}

impl ResolutionEntry {
    pub fn new(
        specifier: impl Into<String>,
        descriptor: Arc<CdnDescriptor>,
        source_version: impl Into<String>,
    ) -> Self {
        Self {
            specifier: specifier.into(),
            descriptor,
            source_version: source_version.into(),
        }
    }

    /// Global binding the bundle should reference, if any.
    #[must_use]
    pub fn binding(&self) -> Option<&str> {
        self.descriptor.var.as_deref()
    }
}

/// The same specifier was already committed at another version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConflict {
    pub specifier: String,
    pub existing_version: String,
    pub requested_version: String,
}

impl std::fmt::Display for VersionConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}' is served from the CDN at version {}, so version {} will be bundled",
            self.specifier, self.existing_version, self.requested_version
        )
    }
}

/// Append-only table of committed entries, keyed by bare specifier.
///
/// At most one entry exists per specifier. Committing the same specifier
/// again at the same version returns the existing entry; at another version
/// it is a [`VersionConflict`].
#[derive(Debug, Default)]
pub struct ResolutionRegistry {
    entries: Vec<ResolutionEntry>,
    index: HashMap<String, usize>,
}

impl ResolutionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn try_get(&self, specifier: &str) -> Option<&ResolutionEntry> {
        self.index.get(specifier).map(|&i| &self.entries[i])
    }

    /// Commit an entry.
    ///
    /// # Errors
    /// Returns a conflict if the specifier is committed at another version.
    pub fn commit(&mut self, entry: ResolutionEntry) -> Result<&ResolutionEntry, VersionConflict> {
        if let Some(&i) = self.index.get(&entry.specifier) {
            let existing = &self.entries[i];
            if existing.source_version == entry.source_version {
                return Ok(existing);
            }
            return Err(VersionConflict {
                specifier: entry.specifier,
                existing_version: existing.source_version.clone(),
                requested_version: entry.source_version,
            });
        }

        let i = self.entries.len();
        self.index.insert(entry.specifier.clone(), i);
        self.entries.push(entry);
        Ok(&self.entries[i])
    }

    /// Entries in commit order.
    pub fn entries(&self) -> impl Iterator<Item = &ResolutionEntry> {
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

    #[must_use]
    pub fn into_entries(self) -> Vec<ResolutionEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(specifier: &str, version: &str) -> ResolutionEntry {
        let descriptor = CdnDescriptor::new(
            specifier,
            Some("Lib"),
            format!("https://cdn.example/{specifier}@{version}/index.js"),
            version,
        );
        ResolutionEntry::new(specifier, Arc::new(descriptor), version)
    }

    #[test]
    fn test_commit_and_get() {
        let mut registry = ResolutionRegistry::new();
        registry.commit(entry("left-pad", "1.0.0")).unwrap();

        let found = registry.try_get("left-pad").unwrap();
        assert_eq!(found.source_version, "1.0.0");
        assert_eq!(found.binding(), Some("Lib"));
        assert!(registry.try_get("react").is_none());
    }

    #[test]
    fn test_same_version_is_idempotent() {
        let mut registry = ResolutionRegistry::new();
        registry.commit(entry("react", "15.6.1")).unwrap();
        registry.commit(entry("react", "15.6.1")).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_other_version_conflicts() {
        let mut registry = ResolutionRegistry::new();
        registry.commit(entry("react", "15.6.1")).unwrap();

        let conflict = registry.commit(entry("react", "0.14.9")).unwrap_err();
        assert_eq!(conflict.existing_version, "15.6.1");
        assert_eq!(conflict.requested_version, "0.14.9");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.try_get("react").unwrap().source_version, "15.6.1");
    }

    #[test]
    fn test_insertion_order() {
        let mut registry = ResolutionRegistry::new();
        for name in ["zone.js", "rxjs", "@angular/core"] {
            registry.commit(entry(name, "1.0.0")).unwrap();
        }

        let order: Vec<_> = registry.entries().map(|e| e.specifier.as_str()).collect();
        assert_eq!(order, vec!["zone.js", "rxjs", "@angular/core"]);
    }
}
