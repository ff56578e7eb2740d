#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Decides which module imports of a build are served from a CDN.
//!
//! A host bundler creates one [`CdnPlugin`] per build, asks it about every
//! module request through [`CdnPlugin::resolve_module`], and finally hands
//! the committed CDN assets to a [`BuildOutput`] with [`CdnPlugin::finalize`].

pub mod adapter;
pub mod cdn;
pub mod config;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod plugin;
pub mod registry;
pub mod specifier;
pub mod version;

pub use adapter::{emit_entries, AssetManifest, BuildOutput, ChunkEmitter, EmittedChunk, HtmlScriptAssets};
pub use cdn::{
    AsyncFnResolver, Catalog, CatalogResolver, CdnDescriptor, CdnResolver, FnResolver,
    ResolveOptions, ResolverKind, ResolverOutput,
};
pub use config::{BuildMode, CdnOptions, Environment, OutputTarget, PolicyConfig};
pub use engine::{
    DependencyResolutionEngine, Diagnostic, DiagnosticKind, ExternalizationResult, PassReport,
    ResolutionPass,
};
pub use error::{codes, CdnError};
pub use metadata::{NodeModulesProvider, PackageMetadata, PackageMetadataProvider};
pub use plugin::{CdnPlugin, HookResult, ModuleReplacement, PluginError};
pub use registry::{ResolutionEntry, ResolutionRegistry, VersionConflict};
pub use specifier::{eligible_package_name, PackageRequest};
pub use version::{version_string, SCHEMA_VERSION, VERSION};
