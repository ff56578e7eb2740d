//! Dependency-substitution resolution.
//!
//! For every module request the engine decides whether the module is served
//! from the CDN ([`ExternalizationResult::External`]), loaded from the CDN
//! without a binding ([`ExternalizationResult::Defer`]), or bundled as usual
//! ([`ExternalizationResult::Bundle`]).
//!
//! ## Algorithm
//!
//! 1. Only bare or scoped package names without a sub-path are eligible.
//! 2. `exclude` / `only` policy.
//! 3. Installed version at the request's context; a package that cannot be
//!    found is fatal.
//! 4. Registry hit at the same version reuses the entry; another version is
//!    a conflict and the request is bundled.
//! 5. CDN lookup, at most once per package/version/environment per pass.
//! 6. Every peer dependency must itself be served from the CDN, otherwise
//!    the package is bundled. Peer edges back into the current resolution
//!    chain are skipped; packages on such a cycle commit only together with
//!    the outermost package of the cycle, and are dropped if it is bundled.
//! 7. Commit to the registry.
//!
//! All state of one build pass lives in a [`ResolutionPass`] that is passed
//! into every call. Concurrent requests for the same specifier share one
//! resolution. Locks are never held across an await.

use futures::future::{BoxFuture, FutureExt, Shared};
use rustc_hash::FxHashMap as HashMap;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cdn::{CdnDescriptor, CdnResolver, ResolveOptions};
use crate::config::{Environment, PolicyConfig};
use crate::error::CdnError;
use crate::metadata::PackageMetadataProvider;
use crate::registry::{ResolutionEntry, ResolutionRegistry, VersionConflict};
use crate::specifier::eligible_package_name;

/// Where users are pointed when the built-in catalogue misses a package.
pub const CATALOG_HINT_URL: &str =
    "https://github.com/mastilver/module-to-cdn/blob/master/modules.json";

/// Decision for one module request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalizationResult {
    /// Bundle the module normally.
    Bundle,
    /// Replace the module with a reference to this global binding.
    External(String),
    /// Emit nothing for the module; its CDN script has no binding.
    Defer,
}

impl ExternalizationResult {
    fn from_binding(var: Option<String>) -> Self {
        var.map_or(Self::Defer, Self::External)
    }

    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }

    #[must_use]
    pub fn binding(&self) -> Option<&str> {
        match self {
            Self::External(var) => Some(var),
            Self::Bundle | Self::Defer => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bundle => "bundle",
            Self::External(_) => "external",
            Self::Defer => "defer",
        }
    }
}

/// Kind of a verbose diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Served,
    Missing,
    Conflict,
    PeerFailure,
    Cycle,
}

/// One verbose outcome line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub specifier: String,
    pub message: String,
}

type SharedLookup = Shared<BoxFuture<'static, Option<Arc<CdnDescriptor>>>>;

type SharedRequest = Shared<BoxFuture<'static, Result<ExternalizationResult, CdnError>>>;

type LookupKey = (String, String, Environment);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State of one build pass.
///
/// Cloning yields another handle to the same pass.
#[derive(Clone, Default)]
pub struct ResolutionPass {
    state: Arc<PassState>,
}

#[derive(Default)]
struct PassState {
    registry: Mutex<ResolutionRegistry>,
    lookups: Mutex<HashMap<LookupKey, SharedLookup>>,
    /// Top-level requests still being resolved, by specifier.
    requests: Mutex<HashMap<String, SharedRequest>>,
    warnings: Mutex<Vec<String>>,
    diagnostics: Mutex<Vec<Diagnostic>>,
}

/// Everything a finished pass produced.
#[derive(Debug, Default)]
pub struct PassReport {
    /// Committed entries in commit order.
    pub entries: Vec<ResolutionEntry>,
    pub warnings: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolutionPass {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a committed entry.
    #[must_use]
    pub fn entry(&self, specifier: &str) -> Option<ResolutionEntry> {
        lock(&self.state.registry).try_get(specifier).cloned()
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        lock(&self.state.registry).len()
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        lock(&self.state.warnings).clone()
    }

    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        lock(&self.state.diagnostics).clone()
    }

    /// Close the pass.
    #[must_use]
    pub fn finish(self) -> PassReport {
        let state = &self.state;
        PassReport {
            entries: std::mem::take(&mut *lock(&state.registry)).into_entries(),
            warnings: std::mem::take(&mut *lock(&state.warnings)),
            diagnostics: std::mem::take(&mut *lock(&state.diagnostics)),
        }
    }

    fn warn(&self, message: String) {
        let mut warnings = lock(&self.state.warnings);
        if !warnings.contains(&message) {
            warnings.push(message);
        }
    }

    fn diagnose(&self, kind: DiagnosticKind, specifier: &str, message: String) {
        lock(&self.state.diagnostics).push(Diagnostic {
            kind,
            specifier: specifier.to_string(),
            message,
        });
    }
}

/// Result of one step of the recursive resolution.
enum Step {
    Done {
        result: ExternalizationResult,
        /// Shallowest in-flight ancestor this outcome depends on through a
        /// peer cycle. Such an outcome is tentative until that ancestor
        /// commits.
        reach: Option<usize>,
    },
    /// The specifier is already on the resolution chain at this depth.
    Cycle(usize),
}

impl Step {
    fn done(result: ExternalizationResult) -> Self {
        Self::Done {
            result,
            reach: None,
        }
    }
}

/// Chain state of one top-level request.
#[derive(Default)]
struct Walk {
    /// Specifiers whose peers are being resolved, outermost first.
    in_flight: Vec<String>,
    /// Entries waiting for an ancestor on `in_flight` to commit.
    pending: Vec<ResolutionEntry>,
}

fn shallowest(reach: Option<usize>, at: usize) -> Option<usize> {
    Some(reach.map_or(at, |r| r.min(at)))
}

/// Decides, per module request, whether to serve it from the CDN.
#[derive(Clone)]
pub struct DependencyResolutionEngine {
    policy: Arc<PolicyConfig>,
    resolver: Arc<dyn CdnResolver>,
    metadata: Arc<dyn PackageMetadataProvider>,
}

impl DependencyResolutionEngine {
    pub fn new(
        policy: PolicyConfig,
        resolver: Arc<dyn CdnResolver>,
        metadata: Arc<dyn PackageMetadataProvider>,
    ) -> Self {
        Self {
            policy: Arc::new(policy),
            resolver,
            metadata,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Resolve one module request.
    ///
    /// A request for a specifier that is already being resolved in this pass
    /// waits for that resolution and shares its outcome.
    ///
    /// # Errors
    /// Fails only when package metadata cannot be read; every other
    /// condition degrades to [`ExternalizationResult::Bundle`].
    pub async fn resolve(
        &self,
        pass: &ResolutionPass,
        context: &Path,
        specifier: &str,
        env: Environment,
    ) -> Result<ExternalizationResult, CdnError> {
        let (request, owner) = {
            let mut requests = lock(&pass.state.requests);
            if let Some(running) = requests.get(specifier) {
                (running.clone(), false)
            } else {
                let engine = self.clone();
                let shared_pass = pass.clone();
                let context = context.to_path_buf();
                let owned = specifier.to_string();
                let request = async move {
                    engine
                        .resolve_request(&shared_pass, &context, &owned, env)
                        .await
                }
                .boxed()
                .shared();
                requests.insert(specifier.to_string(), request.clone());
                (request, true)
            }
        };

        let outcome = request.await;
        if owner {
            lock(&pass.state.requests).remove(specifier);
        }
        outcome
    }

    async fn resolve_request(
        &self,
        pass: &ResolutionPass,
        context: &Path,
        specifier: &str,
        env: Environment,
    ) -> Result<ExternalizationResult, CdnError> {
        let mut walk = Walk::default();
        match self
            .resolve_in(pass, context, specifier, env, &mut walk)
            .await?
        {
            Step::Done { result, .. } => Ok(result),
            Step::Cycle(_) => Ok(ExternalizationResult::Bundle),
        }
    }

    fn resolve_in<'a>(
        &'a self,
        pass: &'a ResolutionPass,
        context: &'a Path,
        specifier: &'a str,
        env: Environment,
        walk: &'a mut Walk,
    ) -> BoxFuture<'a, Result<Step, CdnError>> {
        async move {
            let Some(name) = eligible_package_name(specifier) else {
                return Ok(Step::done(ExternalizationResult::Bundle));
            };

            if !self.policy.allows(name) {
                return Ok(Step::done(ExternalizationResult::Bundle));
            }

            if let Some(depth) = walk.in_flight.iter().position(|s| s == specifier) {
                if self.policy.verbose() {
                    pass.diagnose(
                        DiagnosticKind::Cycle,
                        specifier,
                        format!("'{specifier}' is a cyclic peer dependency, skipping the edge"),
                    );
                }
                return Ok(Step::Cycle(depth));
            }

            let metadata = self.metadata.read(name, context)?;
            let version = metadata.version.as_str();

            let committed = lock(&pass.state.registry)
                .try_get(specifier)
                .map(|e| (e.source_version.clone(), e.descriptor.var.clone()));
            if let Some((existing_version, var)) = committed {
                if existing_version == version {
                    return Ok(Step::done(ExternalizationResult::from_binding(var)));
                }
                let conflict = VersionConflict {
                    specifier: specifier.to_string(),
                    existing_version,
                    requested_version: version.to_string(),
                };
                self.warn(pass, DiagnosticKind::Conflict, specifier, conflict.to_string());
                return Ok(Step::done(ExternalizationResult::Bundle));
            }

            let Some(descriptor) = self.lookup(pass, name, version, env).await else {
                if self.policy.verbose() {
                    pass.diagnose(
                        DiagnosticKind::Missing,
                        specifier,
                        format!("❌ '{name}' couldn't be found, please add it to {CATALOG_HINT_URL}"),
                    );
                }
                return Ok(Step::done(ExternalizationResult::Bundle));
            };

            let depth = walk.in_flight.len();
            let mark = walk.pending.len();
            let mut reach = None;

            if !metadata.peer_dependencies.is_empty() {
                walk.in_flight.push(specifier.to_string());
                let mut unsatisfied = Vec::new();
                let mut outcome = Ok(());
                for peer in metadata.peer_dependencies.keys() {
                    match self.resolve_in(pass, context, peer, env, walk).await {
                        Ok(Step::Cycle(at)) => reach = shallowest(reach, at),
                        Ok(Step::Done {
                            result: ExternalizationResult::External(_),
                            reach: peer_reach,
                        }) => {
                            if let Some(at) = peer_reach {
                                reach = shallowest(reach, at);
                            }
                        }
                        Ok(Step::Done { .. }) => unsatisfied.push(format!("'{peer}'")),
                        Err(err) => {
                            outcome = Err(err);
                            break;
                        }
                    }
                }
                walk.in_flight.pop();
                outcome?;

                if !unsatisfied.is_empty() {
                    // Tentative entries below this package depend on it.
                    walk.pending.truncate(mark);
                    let message = format!(
                        "'{specifier}' will be bundled because its peer dependencies could not be served from the CDN: {}",
                        unsatisfied.join(", ")
                    );
                    self.warn(pass, DiagnosticKind::PeerFailure, specifier, message);
                    return Ok(Step::done(ExternalizationResult::Bundle));
                }
            }

            let entry = ResolutionEntry::new(specifier, descriptor, version);

            if let Some(at) = reach.filter(|&at| at < depth) {
                let result =
                    ExternalizationResult::from_binding(entry.binding().map(String::from));
                walk.pending.push(entry);
                return Ok(Step::Done {
                    result,
                    reach: Some(at),
                });
            }

            for deferred in walk.pending.split_off(mark) {
                self.commit(pass, deferred);
            }
            let result = self
                .commit(pass, entry)
                .unwrap_or(ExternalizationResult::Bundle);
            Ok(Step::done(result))
        }
        .boxed()
    }

    /// Commit `entry` and record its served line.
    ///
    /// Returns `None` when another version is already committed.
    fn commit(
        &self,
        pass: &ResolutionPass,
        entry: ResolutionEntry,
    ) -> Option<ExternalizationResult> {
        let specifier = entry.specifier.clone();
        let url = entry.descriptor.url.clone();
        let committed = {
            let mut registry = lock(&pass.state.registry);
            let fresh = registry.try_get(&specifier).is_none();
            registry
                .commit(entry)
                .map(|e| (fresh, e.descriptor.var.clone()))
        };

        match committed {
            Ok((fresh, var)) => {
                if fresh && self.policy.verbose() {
                    pass.diagnose(
                        DiagnosticKind::Served,
                        &specifier,
                        format!("✔️ '{specifier}' will be served by {url}"),
                    );
                }
                Some(ExternalizationResult::from_binding(var))
            }
            Err(conflict) => {
                self.warn(pass, DiagnosticKind::Conflict, &specifier, conflict.to_string());
                None
            }
        }
    }

    /// Record a warning, mirrored as a diagnostic in verbose mode.
    fn warn(&self, pass: &ResolutionPass, kind: DiagnosticKind, specifier: &str, message: String) {
        if self.policy.verbose() {
            pass.diagnose(kind, specifier, message.clone());
        }
        pass.warn(message);
    }

    /// Shared CDN lookup; the strategy runs at most once per key and pass.
    fn lookup(
        &self,
        pass: &ResolutionPass,
        name: &str,
        version: &str,
        env: Environment,
    ) -> SharedLookup {
        let key = (name.to_string(), version.to_string(), env);
        lock(&pass.state.lookups)
            .entry(key)
            .or_insert_with(|| {
                let options = ResolveOptions { environment: env };
                self.resolver
                    .resolve(name, version, &options)
                    .into_future()
                    .map(|found| found.map(Arc::new))
                    .boxed()
                    .shared()
            })
            .clone()
    }
}
