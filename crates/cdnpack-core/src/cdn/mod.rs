//! CDN lookup strategies.
//!
//! A [`CdnResolver`] maps `(package name, version, environment)` to a
//! [`CdnDescriptor`]. Strategies may answer immediately or hand back a
//! future; [`ResolverOutput::into_future`] normalizes both so the engine
//! only ever awaits.
//!
//! Strategies are chosen through [`ResolverKind`]:
//! - `Builtin` uses the catalogue shipped with this crate
//! - `Custom` wraps any user strategy (see [`FnResolver`], [`AsyncFnResolver`])
//! - `Named` picks an alternate catalogue by name or JSON file path

mod catalog;

pub use catalog::{Catalog, CatalogEntry, CatalogResolver, VersionTemplate, UNPKG_HOST};

use futures::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use crate::config::Environment;
use crate::error::CdnError;

/// Outcome of a successful CDN lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnDescriptor {
    /// Package name the asset is emitted under.
    pub name: String,
    /// Global the script exposes; `None` for side-effect-only scripts.
    #[serde(rename = "var")]
    pub var: Option<String>,
    /// Hosted script URL.
    pub url: String,
    /// Version the URL points at.
    pub version: String,
}

impl CdnDescriptor {
    pub fn new(
        name: impl Into<String>,
        var: Option<&str>,
        url: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            var: var.map(String::from),
            url: url.into(),
            version: version.into(),
        }
    }
}

/// Options passed to every lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveOptions {
    pub environment: Environment,
}

/// What a strategy returns: an answer now, or one later.
pub enum ResolverOutput {
    Ready(Option<CdnDescriptor>),
    Pending(BoxFuture<'static, Option<CdnDescriptor>>),
}

impl ResolverOutput {
    /// Wrap a future answer.
    pub fn pending<F>(fut: F) -> Self
    where
        F: Future<Output = Option<CdnDescriptor>> + Send + 'static,
    {
        Self::Pending(fut.boxed())
    }

    /// Always a future, whichever way the strategy answered.
    pub fn into_future(self) -> BoxFuture<'static, Option<CdnDescriptor>> {
        match self {
            Self::Ready(descriptor) => future::ready(descriptor).boxed(),
            Self::Pending(fut) => fut,
        }
    }
}

impl From<Option<CdnDescriptor>> for ResolverOutput {
    fn from(descriptor: Option<CdnDescriptor>) -> Self {
        Self::Ready(descriptor)
    }
}

impl fmt::Debug for ResolverOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(descriptor) => f.debug_tuple("Ready").field(descriptor).finish(),
            Self::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// A CDN lookup strategy.
pub trait CdnResolver: Send + Sync {
    fn resolve(&self, name: &str, version: &str, options: &ResolveOptions) -> ResolverOutput;
}

/// Strategy backed by a synchronous closure.
pub struct FnResolver<F>(pub F);

impl<F> CdnResolver for FnResolver<F>
where
    F: Fn(&str, &str, &ResolveOptions) -> Option<CdnDescriptor> + Send + Sync,
{
    fn resolve(&self, name: &str, version: &str, options: &ResolveOptions) -> ResolverOutput {
        ResolverOutput::Ready((self.0)(name, version, options))
    }
}

/// Strategy backed by a closure returning a future.
pub struct AsyncFnResolver<F>(pub F);

impl<F, Fut> CdnResolver for AsyncFnResolver<F>
where
    F: Fn(String, String, ResolveOptions) -> Fut + Send + Sync,
    Fut: Future<Output = Option<CdnDescriptor>> + Send + 'static,
{
    fn resolve(&self, name: &str, version: &str, options: &ResolveOptions) -> ResolverOutput {
        ResolverOutput::pending((self.0)(name.to_string(), version.to_string(), *options))
    }
}

/// Names accepted for the built-in catalogue.
const BUILTIN_NAMES: &[&str] = &["builtin", "module-to-cdn"];

/// Name of the built-in catalogue served from jsDelivr.
pub const JSDELIVR: &str = "jsdelivr";

const JSDELIVR_HOST: &str = "https://cdn.jsdelivr.net/npm/";

/// Which strategy a plugin instance uses.
#[derive(Clone, Default)]
pub enum ResolverKind {
    #[default]
    Builtin,
    Custom(Arc<dyn CdnResolver>),
    /// `module-to-cdn`, `jsdelivr`, or a path to a JSON catalogue.
    Named(String),
}

impl ResolverKind {
    pub fn custom(resolver: impl CdnResolver + 'static) -> Self {
        Self::Custom(Arc::new(resolver))
    }

    /// Custom strategy from a synchronous closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str, &str, &ResolveOptions) -> Option<CdnDescriptor> + Send + Sync + 'static,
    {
        Self::custom(FnResolver(f))
    }

    /// Custom strategy from a closure returning a future.
    pub fn from_async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(String, String, ResolveOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<CdnDescriptor>> + Send + 'static,
    {
        Self::custom(AsyncFnResolver(f))
    }

    /// Turn the configured kind into a strategy object.
    ///
    /// Catalogue file paths are resolved against `root`.
    ///
    /// # Errors
    /// Returns a config error for unknown names or unreadable catalogues.
    pub fn into_strategy(self, root: &Path) -> Result<Arc<dyn CdnResolver>, CdnError> {
        match self {
            Self::Builtin => Ok(Arc::new(CatalogResolver::new(Catalog::builtin()?))),
            Self::Custom(resolver) => Ok(resolver),
            Self::Named(name) => {
                if BUILTIN_NAMES.contains(&name.as_str()) {
                    return Self::Builtin.into_strategy(root);
                }
                if name == JSDELIVR {
                    let catalog = Catalog::builtin()?.with_host(UNPKG_HOST, JSDELIVR_HOST);
                    return Ok(Arc::new(CatalogResolver::new(catalog)));
                }
                if name.ends_with(".json") {
                    let catalog = Catalog::from_file(&root.join(&name))?;
                    return Ok(Arc::new(CatalogResolver::new(catalog)));
                }
                Err(CdnError::config(format!(
                    "Unknown resolver '{name}'. Use: module-to-cdn, {JSDELIVR}, or a path to a .json catalogue"
                )))
            }
        }
    }
}

impl fmt::Debug for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => f.write_str("Builtin"),
            Self::Custom(_) => f.write_str("Custom"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

impl<'de> Deserialize<'de> for ResolverKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name: Option<String> = Option::deserialize(deserializer)?;
        Ok(name.map_or(Self::Builtin, Self::Named))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> CdnDescriptor {
        CdnDescriptor::new(
            "react",
            Some("CustomReact"),
            "https://my-cdn.com/react.js",
            "15.0.0",
        )
    }

    #[tokio::test]
    async fn test_sync_output_becomes_future() {
        let resolver = FnResolver(|_: &str, _: &str, _: &ResolveOptions| Some(descriptor()));
        let output = resolver.resolve("react", "15.6.1", &ResolveOptions::default());
        assert!(matches!(output, ResolverOutput::Ready(Some(_))));
        assert_eq!(output.into_future().await, Some(descriptor()));
    }

    #[tokio::test]
    async fn test_async_output() {
        let resolver = AsyncFnResolver(|_name: String, _version: String, _opts: ResolveOptions| async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Some(descriptor())
        });
        let output = resolver.resolve("react", "15.6.1", &ResolveOptions::default());
        assert!(matches!(output, ResolverOutput::Pending(_)));
        assert_eq!(output.into_future().await, Some(descriptor()));
    }

    #[test]
    fn test_unknown_named_resolver() {
        let err = ResolverKind::Named("@acme/cdn-map".to_string())
            .into_strategy(Path::new("."))
            .err()
            .unwrap();
        assert!(err.to_string().contains("Unknown resolver '@acme/cdn-map'"));
    }

    #[tokio::test]
    async fn test_named_jsdelivr_rewrites_host() {
        let strategy = ResolverKind::Named(JSDELIVR.to_string())
            .into_strategy(Path::new("."))
            .unwrap();
        let found = strategy
            .resolve("react", "15.6.1", &ResolveOptions::default())
            .into_future()
            .await
            .unwrap();
        assert_eq!(found.url, "https://cdn.jsdelivr.net/npm/react@15.6.1/dist/react.js");
    }

    #[test]
    fn test_module_to_cdn_alias_is_builtin() {
        assert!(ResolverKind::Named("module-to-cdn".to_string())
            .into_strategy(Path::new("."))
            .is_ok());
    }

    #[test]
    fn test_deserialize_kind() {
        let kind: ResolverKind = serde_json::from_str("null").unwrap();
        assert!(matches!(kind, ResolverKind::Builtin));

        let kind: ResolverKind = serde_json::from_str(r#""cdn-map.json""#).unwrap();
        assert!(matches!(kind, ResolverKind::Named(ref n) if n == "cdn-map.json"));
    }
}
