//! Build integration: hands the committed CDN entries to the host's output.
//!
//! Three outputs are provided:
//! - [`ChunkEmitter`] adds one named chunk per package whose only file is
//!   the CDN URL
//! - [`HtmlScriptAssets`] appends URLs to the injected script list of an
//!   HTML page
//! - [`AssetManifest`] maps `<name>.js` to the URL

use serde::Serialize;
use std::collections::BTreeMap;

use crate::registry::ResolutionEntry;

/// Where the CDN assets of a pass end up.
pub trait BuildOutput {
    /// Add a chunk named `name` whose single file is `file`.
    fn emit_chunk(&mut self, name: &str, file: &str);

    fn add_warning(&mut self, text: &str);

    /// Script list of an HTML page, when the output renders one.
    ///
    /// When present, URLs are appended here instead of emitted as chunks.
    fn html_scripts(&mut self) -> Option<&mut Vec<String>> {
        None
    }
}

/// Write `entries` (in commit order) and `warnings` to `out`.
pub fn emit_entries(out: &mut dyn BuildOutput, entries: &[ResolutionEntry], warnings: &[String]) {
    if let Some(scripts) = out.html_scripts() {
        for entry in entries {
            scripts.push(entry.descriptor.url.clone());
        }
    } else {
        for entry in entries {
            out.emit_chunk(&entry.descriptor.name, &entry.descriptor.url);
        }
    }

    for warning in warnings {
        out.add_warning(warning);
    }
}

/// A chunk added by [`ChunkEmitter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmittedChunk {
    pub name: String,
    pub files: Vec<String>,
}

/// Collects chunks and warnings.
#[derive(Debug, Default)]
pub struct ChunkEmitter {
    pub chunks: Vec<EmittedChunk>,
    pub warnings: Vec<String>,
}

impl ChunkEmitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BuildOutput for ChunkEmitter {
    fn emit_chunk(&mut self, name: &str, file: &str) {
        self.chunks.push(EmittedChunk {
            name: name.to_string(),
            files: vec![file.to_string()],
        });
    }

    fn add_warning(&mut self, text: &str) {
        self.warnings.push(text.to_string());
    }
}

/// Script assets injected into an HTML page.
#[derive(Debug, Default)]
pub struct HtmlScriptAssets {
    /// Script URLs, CDN URLs first when the page already had entries.
    pub scripts: Vec<String>,
    pub warnings: Vec<String>,
}

impl HtmlScriptAssets {
    /// Start from the page's existing script list.
    #[must_use]
    pub fn new(scripts: Vec<String>) -> Self {
        Self {
            scripts,
            warnings: Vec::new(),
        }
    }

    /// Render one `<script>` tag per asset.
    #[must_use]
    pub fn script_tags(&self) -> String {
        self.scripts
            .iter()
            .map(|src| format!("<script type=\"text/javascript\" src=\"{src}\"></script>"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl BuildOutput for HtmlScriptAssets {
    fn emit_chunk(&mut self, _name: &str, file: &str) {
        self.scripts.push(file.to_string());
    }

    fn add_warning(&mut self, text: &str) {
        self.warnings.push(text.to_string());
    }

    fn html_scripts(&mut self) -> Option<&mut Vec<String>> {
        Some(&mut self.scripts)
    }
}

/// `<name>.js` → URL manifest.
#[derive(Debug, Default, Serialize)]
pub struct AssetManifest {
    #[serde(flatten)]
    pub assets: BTreeMap<String, String>,
    #[serde(skip)]
    pub warnings: Vec<String>,
}

impl AssetManifest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.assets.get(name).map(String::as_str)
    }

    /// Pretty-printed JSON of the asset map.
    ///
    /// # Errors
    /// Propagates serialization errors.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl BuildOutput for AssetManifest {
    fn emit_chunk(&mut self, name: &str, file: &str) {
        self.assets.insert(format!("{name}.js"), file.to_string());
    }

    fn add_warning(&mut self, text: &str) {
        self.warnings.push(text.to_string());
    }
}
