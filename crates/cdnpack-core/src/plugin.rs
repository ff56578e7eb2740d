//! The per-build plugin facade a host bundler drives.
//!
//! ## Example
//!
//! ```ignore
//! use cdnpack_core::{CdnOptions, CdnPlugin, ChunkEmitter, ModuleReplacement};
//!
//! let plugin = CdnPlugin::new(CdnOptions::new().with_verbose(true), &root)?;
//!
//! match plugin.resolve_module(&context, "react").await? {
//!     ModuleReplacement::External(var) => { /* reference the global */ }
//!     ModuleReplacement::Skip => { /* drop the module */ }
//!     ModuleReplacement::UseDefault => { /* bundle normally */ }
//! }
//!
//! let mut out = ChunkEmitter::new();
//! let report = plugin.finalize(&mut out);
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapter::{emit_entries, BuildOutput};
use crate::config::{CdnOptions, Environment, PolicyConfig};
use crate::engine::{
    DependencyResolutionEngine, Diagnostic, ExternalizationResult, PassReport, ResolutionPass,
};
use crate::error::CdnError;
use crate::metadata::{NodeModulesProvider, PackageMetadataProvider};

/// Name reported in hook errors.
pub const PLUGIN_NAME: &str = "cdnpack";

/// Result type for plugin hooks.
pub type HookResult<T> = Result<T, PluginError>;

/// Error from a plugin hook.
#[derive(Debug)]
pub struct PluginError {
    /// Plugin name that caused the error.
    pub plugin: String,
    /// Hook that failed.
    pub hook: &'static str,
    /// Stable error code.
    pub code: &'static str,
    pub message: String,
}

impl PluginError {
    fn from_cdn(hook: &'static str, err: &CdnError) -> Self {
        Self {
            plugin: PLUGIN_NAME.to_string(),
            hook,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for PluginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.plugin, self.hook, self.message)
    }
}

impl std::error::Error for PluginError {}

/// What the host does with a module request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleReplacement {
    /// Let the host resolve and bundle the module.
    UseDefault,
    /// Replace the module with a reference to a global binding.
    External(String),
    /// Drop the module; its CDN script is loaded for side effects only.
    Skip,
}

impl ModuleReplacement {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UseDefault => "bundle",
            Self::External(_) => "external",
            Self::Skip => "defer",
        }
    }
}

impl From<ExternalizationResult> for ModuleReplacement {
    fn from(result: ExternalizationResult) -> Self {
        match result {
            ExternalizationResult::Bundle => Self::UseDefault,
            ExternalizationResult::External(var) => Self::External(var),
            ExternalizationResult::Defer => Self::Skip,
        }
    }
}

/// One plugin instance, valid for one build.
pub struct CdnPlugin {
    engine: DependencyResolutionEngine,
    pass: ResolutionPass,
    disabled: bool,
    root: PathBuf,
}

impl CdnPlugin {
    /// Build a plugin reading installed packages from `node_modules`.
    ///
    /// # Errors
    /// Returns a config error for conflicting `exclude`/`only` lists or an
    /// unusable resolver.
    pub fn new(options: CdnOptions, root: impl Into<PathBuf>) -> Result<Self, CdnError> {
        Self::with_metadata(options, root, Arc::new(NodeModulesProvider::new()))
    }

    /// Build a plugin with a custom metadata source.
    ///
    /// # Errors
    /// Same as [`CdnPlugin::new`].
    pub fn with_metadata(
        options: CdnOptions,
        root: impl Into<PathBuf>,
        metadata: Arc<dyn PackageMetadataProvider>,
    ) -> Result<Self, CdnError> {
        let root = root.into();
        let policy = PolicyConfig::from_options(&options)?;
        let resolver = options.resolver.into_strategy(&root)?;

        Ok(Self {
            engine: DependencyResolutionEngine::new(policy, resolver, metadata),
            pass: ResolutionPass::new(),
            disabled: options.disable,
            root,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        PLUGIN_NAME
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.engine.policy().environment()
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Decide how the host handles `specifier` requested from `context`.
    ///
    /// # Errors
    /// Fails when package metadata cannot be read; the host should stop the
    /// build.
    pub async fn resolve_module(
        &self,
        context: &Path,
        specifier: &str,
    ) -> HookResult<ModuleReplacement> {
        if self.disabled {
            return Ok(ModuleReplacement::UseDefault);
        }

        self.engine
            .resolve(&self.pass, context, specifier, self.environment())
            .await
            .map(ModuleReplacement::from)
            .map_err(|e| PluginError::from_cdn("resolve_module", &e))
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.pass.warnings()
    }

    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.pass.diagnostics()
    }

    /// End the pass: hand every committed entry and warning to `out`.
    pub fn finalize(self, out: &mut dyn BuildOutput) -> PassReport {
        let report = self.pass.finish();
        if !self.disabled {
            emit_entries(out, &report.entries, &report.warnings);
        }
        report
    }
}
